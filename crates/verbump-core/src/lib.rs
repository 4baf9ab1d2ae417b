//! Core library for verbump.
//!
//! This crate provides the version-bump engine used by the `verbump` CLI
//! and any downstream consumers.
//!
//! # Modules
//!
//! - [`bump`] - Orchestrator sequencing a bump from config load to tag
//! - [`config`] - Settings loading and management
//! - [`confirm`] - Release-notes confirmation capability
//! - [`error`] - Settings error types and result aliases
//! - [`git`] - Version-control operations
//! - [`mutate`] - Verified rewriting of tracked files
//! - [`store`] - Lossless editor for the `.bumpversion.cfg` version store
//! - [`version`] - Version arithmetic and tag formatting
//!
//! # Quick Start
//!
//! ```no_run
//! use camino::Utf8Path;
//! use verbump_core::bump::{BumpOptions, Orchestrator};
//! use verbump_core::confirm::AutoConfirm;
//! use verbump_core::git::SystemGit;
//! use verbump_core::version::BumpPart;
//!
//! let root = Utf8Path::new(".");
//! let git = SystemGit::new(root);
//! let mut confirm = AutoConfirm::approve();
//! let outcome = Orchestrator::new(root, &git, &mut confirm)
//!     .bump(&BumpOptions::new(BumpPart::Patch), |_| {})
//!     .expect("bump failed");
//!
//! println!("{} -> {}", outcome.previous_version, outcome.new_version);
//! ```
#![deny(unsafe_code)]

pub mod bump;

pub mod config;

pub mod confirm;

pub mod error;

mod fsutil;

pub mod git;

pub mod mutate;

pub mod store;

pub mod version;

pub use config::{Config, ConfigLoader, ConfirmPolicy, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use version::{BumpPart, VersionSpec};
