//! Bump command: a thin CLI layer over `verbump_core::bump`.

use anyhow::Context;
use camino::Utf8Path;
use owo_colors::OwoColorize;
use owo_colors::{Stream::Stdout, Style};
use tracing::{debug, instrument};

use verbump_core::BumpPart;
use verbump_core::bump::{BumpEvent, BumpOptions, BumpOutcome, Orchestrator, PhaseOutcome};
use verbump_core::config::Config;
use verbump_core::git::SystemGit;

use super::ReleaseNotesConfirm;
use crate::Cli;

impl Cli {
    /// The orchestrator options carried by these arguments.
    pub fn bump_options(&self) -> BumpOptions {
        BumpOptions {
            part: self.part,
            ci_version: self.ci_version.clone(),
            commit: self.commit,
            replace_with: self.replace_with.unwrap_or(false),
            msg: self.msg.clone(),
        }
    }
}

/// Execute a bump (or `push_tag`) in `cwd`.
#[instrument(name = "cmd_bump", skip_all, fields(part = %cli.part))]
pub fn cmd_bump(cli: &Cli, config: &Config, cwd: &Utf8Path) -> anyhow::Result<()> {
    debug!(json_output = cli.json, store_file = %config.store_file, "executing bump command");

    let git = SystemGit::new(cwd);
    let mut confirm = ReleaseNotesConfirm::from_settings(cli.yes, config.release_notes.confirm);
    let mut orchestrator =
        Orchestrator::new(cwd, &git, &mut confirm).with_store_file(&config.store_file);

    if cli.part == BumpPart::PushTag {
        let now = chrono::Local::now().naive_local();
        let outcome = orchestrator.push_tag(now).context("push_tag failed")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else {
            println!(
                "{} Tagged {} on {}",
                "✓".if_supports_color(Stdout, |t| t.style(success())),
                outcome.tag.if_supports_color(Stdout, |t| t.style(success())),
                outcome.branch.if_supports_color(Stdout, |t| t.cyan()),
            );
        }
        return Ok(());
    }

    let options = cli.bump_options();
    let json = cli.json;
    if !json {
        println!(
            "{}: {} ({})",
            "Bump".if_supports_color(Stdout, |t| t.bold()),
            orchestrator
                .store_path()
                .if_supports_color(Stdout, |t| t.dimmed()),
            options.part,
        );
    }

    let outcome = orchestrator
        .bump(&options, |event| {
            if !json {
                handle_event(event, cwd);
            }
        })
        .context("bump failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }

    Ok(())
}

/// Bold green, for completed work.
const fn success() -> Style {
    Style::new().green().bold()
}

/// Handle a bump event for terminal progress display.
fn handle_event(event: BumpEvent, cwd: &Utf8Path) {
    match event {
        BumpEvent::PhaseStarted(phase) => debug!(%phase, "phase started"),
        BumpEvent::PhaseCompleted(phase, outcome) => match outcome {
            PhaseOutcome::Success { message } => {
                println!(
                    "  {} {} {}",
                    "✓".if_supports_color(Stdout, |t| t.green()),
                    phase.if_supports_color(Stdout, |t| t.bold()),
                    message.if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
            PhaseOutcome::Skipped { reason } => {
                let reason = format!("skipped: {reason}");
                println!(
                    "  {} {} {}",
                    "–".if_supports_color(Stdout, |t| t.yellow()),
                    phase.if_supports_color(Stdout, |t| t.bold()),
                    reason.if_supports_color(Stdout, |t| t.dimmed()),
                );
            }
        },
        BumpEvent::FileEdited { path, changes } => {
            let shown = path.strip_prefix(cwd).unwrap_or(&path);
            for change in changes {
                println!(
                    "    {}:{} {} {} {}",
                    shown.if_supports_color(Stdout, |t| t.cyan()),
                    change.line,
                    change.before.trim().if_supports_color(Stdout, |t| t.dimmed()),
                    "→".if_supports_color(Stdout, |t| t.dimmed()),
                    change.after.trim(),
                );
            }
        }
    }
}

fn print_summary(outcome: &BumpOutcome) {
    println!();
    let check = "✓".if_supports_color(Stdout, |t| t.style(success()));
    if outcome.previous_version == outcome.new_version {
        println!(
            "{check} Version unchanged at {}",
            outcome.new_version.if_supports_color(Stdout, |t| t.bold())
        );
    } else {
        println!(
            "{check} Version {} → {}",
            outcome
                .previous_version
                .if_supports_color(Stdout, |t| t.dimmed()),
            outcome
                .new_version
                .if_supports_color(Stdout, |t| t.style(success()))
        );
    }
    let arrow = "→".if_supports_color(Stdout, |t| t.dimmed());
    if let Some(message) = &outcome.commit_message {
        println!("  {arrow} committed: {message}");
    }
    if let Some(tag) = &outcome.tag {
        println!(
            "  {arrow} tagged {}",
            tag.if_supports_color(Stdout, |t| t.cyan())
        );
    }
}
