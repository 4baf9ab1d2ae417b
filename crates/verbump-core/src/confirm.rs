//! Release-notes acknowledgment.
//!
//! Before a version-changing bump writes anything, the caller is asked
//! whether the configured release-notes file has been updated. The question
//! is answered by whatever [`Confirm`] implementation the caller injects:
//! the CLI prompts on a terminal, tests and scripts use [`AutoConfirm`].

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Errors from asking for confirmation.
#[derive(Error, Debug)]
pub enum ConfirmError {
    /// Nobody can answer (e.g., stdin is not a terminal).
    #[error("cannot ask about release notes {path}: {reason}")]
    Unavailable {
        /// The release-notes file in question.
        path: Utf8PathBuf,
        /// Why the question cannot be asked.
        reason: String,
    },

    /// The prompt itself failed or was cancelled.
    #[error("release-notes prompt failed: {0}")]
    Prompt(String),
}

/// Result alias for confirmation.
pub type ConfirmResult<T> = Result<T, ConfirmError>;

/// Answers "have you updated the release notes?".
pub trait Confirm {
    /// Return `true` if the release notes at `path` are up to date.
    fn confirm_release_notes(&mut self, path: &Utf8Path) -> ConfirmResult<bool>;
}

/// A [`Confirm`] with a fixed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoConfirm {
    answer: bool,
}

impl AutoConfirm {
    /// Always confirm.
    pub const fn approve() -> Self {
        Self { answer: true }
    }

    /// Always refuse.
    pub const fn reject() -> Self {
        Self { answer: false }
    }
}

impl Confirm for AutoConfirm {
    fn confirm_release_notes(&mut self, path: &Utf8Path) -> ConfirmResult<bool> {
        tracing::debug!(%path, answer = self.answer, "release notes answered automatically");
        Ok(self.answer)
    }
}
