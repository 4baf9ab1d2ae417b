//! Command implementations

pub mod bump;

use std::io::IsTerminal;

use camino::Utf8Path;
use verbump_core::ConfirmPolicy;
use verbump_core::confirm::{AutoConfirm, Confirm, ConfirmError, ConfirmResult};

/// Release-notes confirmation as chosen by `--yes` and settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseNotesConfirm {
    /// Ask on the terminal.
    Prompt,
    /// Answer without asking.
    Fixed(AutoConfirm),
}

impl ReleaseNotesConfirm {
    /// `--yes` wins over the configured policy.
    pub const fn from_settings(yes: bool, policy: ConfirmPolicy) -> Self {
        if yes {
            return Self::Fixed(AutoConfirm::approve());
        }
        match policy {
            ConfirmPolicy::Prompt => Self::Prompt,
            ConfirmPolicy::Yes => Self::Fixed(AutoConfirm::approve()),
            ConfirmPolicy::No => Self::Fixed(AutoConfirm::reject()),
        }
    }
}

impl Confirm for ReleaseNotesConfirm {
    fn confirm_release_notes(&mut self, path: &Utf8Path) -> ConfirmResult<bool> {
        match self {
            Self::Fixed(auto) => auto.confirm_release_notes(path),
            Self::Prompt => {
                if !std::io::stdin().is_terminal() {
                    return Err(ConfirmError::Unavailable {
                        path: path.to_path_buf(),
                        reason: "stdin is not a terminal; pass --yes or set release_notes.confirm"
                            .into(),
                    });
                }
                inquire::Confirm::new(&format!("Have you updated the release notes in {path}?"))
                    .with_default(false)
                    .prompt()
                    .map_err(|e| ConfirmError::Prompt(e.to_string()))
            }
        }
    }
}
