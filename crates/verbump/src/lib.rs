//! Library interface for the `verbump` CLI.
//!
//! This crate exposes the CLI's argument parser as a library, primarily for
//! testing. The actual entry point is in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`commands`] - Command implementations

pub mod commands;

use clap::{CommandFactory, Parser};
use std::io::IsTerminal;
use std::path::PathBuf;
use verbump_core::BumpPart;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }

    /// Whether diagnostics written to stderr should carry ANSI colors.
    pub fn stderr_ansi(self) -> bool {
        match self {
            Self::Auto => std::io::stderr().is_terminal(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Parse `true`/`false`, case-insensitively.
///
/// Stricter than clap's `BoolishValueParser`, which also takes `yes`, `1`, etc.
pub fn parse_bool_option(value: &str) -> Result<bool, String> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(format!("expected `true` or `false`, got {value:?}"))
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG                Log filter (e.g., debug, verbump=trace)
    VERBUMP_LOG_PATH        Explicit log file path
    VERBUMP_LOG_DIR         Log directory
";

/// Command-line interface definition for verbump.
#[derive(Parser, Debug)]
#[command(name = "verbump")]
#[command(about = "Bump a semantic version across tracked files, then commit and tag", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// Which part of the version to bump (`push_tag` tags the current version)
    #[arg(value_enum)]
    pub part: BumpPart,

    /// CI build identifier, available to the replacement template as {ci_version}
    #[arg(long = "ci_version", visible_alias = "ci-version", value_name = "STRING")]
    pub ci_version: Option<String>,

    /// Commit the bump (overrides the version store)
    #[arg(long, value_name = "true|false", value_parser = parse_bool_option)]
    pub commit: Option<bool>,

    /// Apply the secondary substitution from the [mazoea] section
    #[arg(
        long = "replace_with",
        visible_alias = "replace-with",
        value_name = "true|false",
        value_parser = parse_bool_option
    )]
    pub replace_with: Option<bool>,

    /// Text appended to the commit message
    #[arg(long, value_name = "STRING")]
    pub msg: Option<String>,

    /// Treat release notes as updated without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long)]
    pub json: bool,
}

/// Returns the clap command, e.g. for help rendering tests.
pub fn command() -> clap::Command {
    Cli::command()
}
