//! Bump orchestrator.
//!
//! One invocation runs a strict sequence of [`BumpPhase`]s, none revisited:
//!
//! 1. **Load config** from the version store and caller options.
//! 2. **Validate files**: every tracked file must exist.
//! 3. **Mutate and verify** every tracked file in memory.
//! 4. **Confirm release notes** (only for version-changing bumps).
//! 5. **Write files** atomically.
//! 6. **Persist config**: store the new version.
//! 7. **Commit** and 8. **Tag** (both optional).
//!
//! Any failure before phase 5 leaves the disk untouched. Progress is
//! reported through an event callback so the CLI can render it.
//!
//! [`Orchestrator::push_tag`] is a separate entry point that only tags the
//! current version with branch and timestamp.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::DEFAULT_STORE_FILE;
use crate::confirm::{Confirm, ConfirmError};
use crate::git::{GitError, Vcs};
use crate::mutate::{self, LineChange, MutateError, SecondaryPattern, TemplateVars};
use crate::store::{ConfigStore, StoreError};
use crate::version::{self, BumpPart, VersionError, VersionSpec};

const MAIN_SECTION: &str = "bumpversion";
const FILE_SECTION_PREFIX: &str = "bumpversion:file:";
const NOTES_SECTION_PREFIX: &str = "bumpversion:releasenotes:";
const SECONDARY_SECTION: &str = "mazoea";

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from a bump or push-tag run. All of them are fatal.
#[derive(Error, Debug)]
pub enum BumpError {
    /// The version store does not exist.
    #[error("version store {0} not found")]
    ConfigNotFound(Utf8PathBuf),

    /// A tracked file is absent or not a regular file.
    #[error("tracked file {0} does not exist")]
    TrackedFileMissing(Utf8PathBuf),

    /// The store is malformed or lacks required keys.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The stored version is not `major.minor.patch`, or cannot be bumped.
    #[error(transparent)]
    Format(#[from] VersionError),

    /// Planning or writing a tracked file failed, including verification.
    #[error(transparent)]
    Mutate(#[from] MutateError),

    /// A git operation failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Asking about release notes failed.
    #[error(transparent)]
    Confirm(#[from] ConfirmError),

    /// The release-notes file would be staged but does not exist.
    #[error("release notes {0} do not exist but are part of the commit")]
    ReleaseNotesMissing(Utf8PathBuf),

    /// The release notes were not confirmed as updated.
    #[error("release notes {0} not confirmed as updated; nothing was changed")]
    ReleaseNotesNotConfirmed(Utf8PathBuf),
}

impl BumpError {
    /// Whether a substitution failed to change a tracked file.
    pub const fn is_verification(&self) -> bool {
        matches!(self, Self::Mutate(e) if e.is_verification())
    }
}

/// Result alias for bump operations.
pub type BumpResult<T> = Result<T, BumpError>;

// ──────────────────────────────────────────────
// Options and config
// ──────────────────────────────────────────────

/// Caller options for one invocation, built once from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpOptions {
    /// Which part to bump.
    pub part: BumpPart,
    /// External CI build identifier, exposed to templates as `{ci_version}`.
    pub ci_version: Option<String>,
    /// Overrides every stored `commit` setting when present.
    pub commit: Option<bool>,
    /// Enable the secondary substitution from the `[mazoea]` section.
    pub replace_with: bool,
    /// Appended to the commit message.
    pub msg: Option<String>,
}

impl BumpOptions {
    /// Options for `part` with everything else unset.
    pub const fn new(part: BumpPart) -> Self {
        Self {
            part,
            ci_version: None,
            commit: None,
            replace_with: false,
            msg: None,
        }
    }
}

/// The release-notes file registered in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNotes {
    /// Absolute path of the notes file.
    pub path: Utf8PathBuf,
    /// Whether the notes file is staged in the bump commit.
    pub commit: bool,
}

/// The secondary substitution, before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryConfig {
    /// Regex source (`mazoea.parse`).
    pub pattern: String,
    /// Replacement template (`mazoea.replace_with`).
    pub template: String,
}

/// Everything one bump needs, merged from the store and [`BumpOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpConfig {
    /// Directory the store and tracked paths are relative to.
    pub start_dir: Utf8PathBuf,
    /// Version currently in the store.
    pub current_version: VersionSpec,
    /// Version after the bump; equal to `current_version` until computed.
    pub new_version: VersionSpec,
    /// Whether to commit.
    pub commit: bool,
    /// Whether to tag a changed version.
    pub tag: bool,
    /// Tracked files in store order, absolute.
    pub tracked_files: Vec<Utf8PathBuf>,
    /// The first registered release-notes file, if any.
    pub release_notes: Option<ReleaseNotes>,
    /// Active secondary substitution.
    pub secondary: Option<SecondaryConfig>,
}

impl BumpConfig {
    /// Merge store contents with caller options.
    ///
    /// The secondary substitution is active only when `options.replace_with`
    /// is set and the store has `mazoea.parse`; `mazoea.replace_with` is then
    /// required. Commit precedence: `options.commit`, then `mazoea.commit`
    /// (only while the secondary substitution is active), then
    /// `bumpversion.commit`.
    #[instrument(skip_all, fields(store = %store.path()))]
    pub fn from_store(
        store: &ConfigStore,
        start_dir: &Utf8Path,
        options: &BumpOptions,
    ) -> BumpResult<Self> {
        let current_version = VersionSpec::parse(store.require(MAIN_SECTION, "current_version")?)?;
        let stored_commit = store.require_bool(MAIN_SECTION, "commit")?;
        let tag = store.require_bool(MAIN_SECTION, "tag")?;

        let secondary = match store.get(SECONDARY_SECTION, "parse") {
            Some(pattern) if options.replace_with => Some(SecondaryConfig {
                pattern: pattern.to_string(),
                template: store.require(SECONDARY_SECTION, "replace_with")?.to_string(),
            }),
            _ => None,
        };
        let secondary_commit = if secondary.is_some() {
            store.get_bool(SECONDARY_SECTION, "commit")?
        } else {
            None
        };
        let commit = options
            .commit
            .or(secondary_commit)
            .unwrap_or(stored_commit);

        let tracked_files = store
            .sections_with_prefix(FILE_SECTION_PREFIX)
            .map(|rel| start_dir.join(rel))
            .collect();

        let release_notes = match store.sections_with_prefix(NOTES_SECTION_PREFIX).next() {
            Some(rel) => {
                let section = format!("{NOTES_SECTION_PREFIX}{rel}");
                Some(ReleaseNotes {
                    path: start_dir.join(rel),
                    commit: store.get_bool(&section, "commit")?.unwrap_or(true),
                })
            }
            None => None,
        };

        debug!(
            %current_version,
            commit,
            tag,
            secondary = secondary.is_some(),
            release_notes = release_notes.is_some(),
            "bump config loaded"
        );

        Ok(Self {
            start_dir: start_dir.to_path_buf(),
            current_version,
            new_version: current_version,
            commit,
            tag,
            tracked_files,
            release_notes,
            secondary,
        })
    }

    /// The release-notes file when a `part` bump will commit it.
    pub fn staged_release_notes(&self, part: BumpPart) -> Option<&Utf8Path> {
        match &self.release_notes {
            Some(notes) if self.commit && notes.commit && part != BumpPart::None => {
                Some(&notes.path)
            }
            _ => None,
        }
    }

    /// Whether the bump changes the version.
    pub fn version_changed(&self) -> bool {
        self.current_version != self.new_version
    }
}

// ──────────────────────────────────────────────
// Phases and events
// ──────────────────────────────────────────────

/// Phases of a bump, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BumpPhase {
    /// Read the store and merge options.
    LoadConfig,
    /// Check that every tracked file exists.
    ValidateFiles,
    /// Compute and verify every rewrite in memory.
    MutateAndVerify,
    /// Ask whether the release notes were updated.
    ConfirmReleaseNotes,
    /// Write the rewritten files.
    WriteFiles,
    /// Store the new version.
    PersistConfig,
    /// Commit the changed files.
    Commit,
    /// Tag the new version.
    Tag,
}

impl std::fmt::Display for BumpPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadConfig => write!(f, "load config"),
            Self::ValidateFiles => write!(f, "validate files"),
            Self::MutateAndVerify => write!(f, "mutate and verify"),
            Self::ConfirmReleaseNotes => write!(f, "confirm release notes"),
            Self::WriteFiles => write!(f, "write files"),
            Self::PersistConfig => write!(f, "persist config"),
            Self::Commit => write!(f, "commit"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

/// Events emitted during a bump for progress reporting.
#[derive(Debug, Clone)]
pub enum BumpEvent {
    /// A phase has started.
    PhaseStarted(BumpPhase),
    /// A phase has completed.
    PhaseCompleted(BumpPhase, PhaseOutcome),
    /// A tracked file passed verification with these line changes.
    FileEdited {
        /// Tracked file.
        path: Utf8PathBuf,
        /// Changed lines.
        changes: Vec<LineChange>,
    },
}

/// Outcome of a single phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PhaseOutcome {
    /// Phase completed successfully.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Phase was skipped.
    Skipped {
        /// Why the phase was skipped.
        reason: String,
    },
}

/// Outcome of a completed bump.
#[derive(Debug, Clone, Serialize)]
pub struct BumpOutcome {
    /// The part that was bumped.
    pub part: BumpPart,
    /// Version before the bump.
    pub previous_version: VersionSpec,
    /// Version after the bump.
    pub new_version: VersionSpec,
    /// Tracked files whose content changed on disk.
    pub files_written: Vec<Utf8PathBuf>,
    /// Whether the store file was rewritten.
    pub store_written: bool,
    /// The commit message, when a commit was made.
    pub commit_message: Option<String>,
    /// The tag, when one was created.
    pub tag: Option<String>,
    /// Results of each phase.
    pub phases: Vec<(BumpPhase, PhaseOutcome)>,
}

/// Outcome of [`Orchestrator::push_tag`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushTagOutcome {
    /// Branch the tag was composed from.
    pub branch: String,
    /// The stored (unchanged) version.
    pub version: VersionSpec,
    /// The created tag.
    pub tag: String,
}

/// Records phase outcomes and forwards events.
struct PhaseLog<F: FnMut(BumpEvent)> {
    phases: Vec<(BumpPhase, PhaseOutcome)>,
    on_event: F,
}

impl<F: FnMut(BumpEvent)> PhaseLog<F> {
    const fn new(on_event: F) -> Self {
        Self {
            phases: Vec::new(),
            on_event,
        }
    }

    fn start(&mut self, phase: BumpPhase) {
        debug!(%phase, "phase started");
        (self.on_event)(BumpEvent::PhaseStarted(phase));
    }

    fn emit(&mut self, event: BumpEvent) {
        (self.on_event)(event);
    }

    fn complete(&mut self, phase: BumpPhase, outcome: PhaseOutcome) {
        (self.on_event)(BumpEvent::PhaseCompleted(phase, outcome.clone()));
        self.phases.push((phase, outcome));
    }

    fn success(&mut self, phase: BumpPhase, message: impl Into<String>) {
        self.complete(
            phase,
            PhaseOutcome::Success {
                message: message.into(),
            },
        );
    }

    fn skip(&mut self, phase: BumpPhase, reason: impl Into<String>) {
        self.start(phase);
        self.complete(
            phase,
            PhaseOutcome::Skipped {
                reason: reason.into(),
            },
        );
    }
}

// ──────────────────────────────────────────────
// Orchestrator
// ──────────────────────────────────────────────

/// Runs bumps against one start directory with injected capabilities.
pub struct Orchestrator<'a> {
    start_dir: Utf8PathBuf,
    store_file: Utf8PathBuf,
    vcs: &'a dyn Vcs,
    confirm: &'a mut dyn Confirm,
}

impl<'a> Orchestrator<'a> {
    /// An orchestrator for `start_dir` using the default store file name.
    pub fn new(start_dir: &Utf8Path, vcs: &'a dyn Vcs, confirm: &'a mut dyn Confirm) -> Self {
        Self {
            start_dir: start_dir.to_path_buf(),
            store_file: Utf8PathBuf::from(DEFAULT_STORE_FILE),
            vcs,
            confirm,
        }
    }

    /// Use a different store file, relative to the start directory.
    pub fn with_store_file<P: AsRef<Utf8Path>>(mut self, store_file: P) -> Self {
        self.store_file = store_file.as_ref().to_path_buf();
        self
    }

    /// Absolute location of the version store.
    pub fn store_path(&self) -> Utf8PathBuf {
        self.start_dir.join(&self.store_file)
    }

    fn open_store(&self) -> BumpResult<ConfigStore> {
        ConfigStore::open(&self.store_path()).map_err(|e| match e {
            StoreError::NotFound(path) => BumpError::ConfigNotFound(path),
            other => BumpError::Store(other),
        })
    }

    /// Load the store and build the [`BumpConfig`] for `options`.
    pub fn load_config(&self, options: &BumpOptions) -> BumpResult<(ConfigStore, BumpConfig)> {
        let store = self.open_store()?;
        let config = BumpConfig::from_store(&store, &self.start_dir, options)?;
        Ok((store, config))
    }

    /// Run a version bump.
    ///
    /// Calls `on_event` at phase boundaries and once per edited file.
    #[instrument(skip(self, on_event), fields(start_dir = %self.start_dir, part = %options.part))]
    pub fn bump(
        &mut self,
        options: &BumpOptions,
        on_event: impl FnMut(BumpEvent),
    ) -> BumpResult<BumpOutcome> {
        let mut log = PhaseLog::new(on_event);

        // ── Load config ──
        log.start(BumpPhase::LoadConfig);
        let (mut store, mut config) = self.load_config(options)?;
        config.new_version = version::bump(config.current_version, options.part)?;
        let (old, new) = (config.current_version, config.new_version);
        info!(
            from = %old,
            to = %new,
            msg = options.msg.as_deref().unwrap_or(""),
            "changing version"
        );
        log.success(BumpPhase::LoadConfig, format!("{old} -> {new}"));

        // ── Validate files ──
        log.start(BumpPhase::ValidateFiles);
        for path in &config.tracked_files {
            if !path.is_file() {
                warn!(%path, "tracked file does not exist");
                return Err(BumpError::TrackedFileMissing(path.clone()));
            }
        }
        if let Some(notes) = config.staged_release_notes(options.part)
            && !notes.is_file()
        {
            warn!(path = %notes, "release notes to commit do not exist");
            return Err(BumpError::ReleaseNotesMissing(notes.to_path_buf()));
        }
        log.success(
            BumpPhase::ValidateFiles,
            format!("{} tracked file(s)", config.tracked_files.len()),
        );

        // ── Mutate and verify ──
        log.start(BumpPhase::MutateAndVerify);
        let secondary = config
            .secondary
            .as_ref()
            .map(|secondary| self.compile_secondary(secondary, &config, options))
            .transpose()?;
        let edits = mutate::plan_edits(&config.tracked_files, old, new, secondary.as_ref())?;
        for edit in edits.iter().filter(|edit| !edit.changes.is_empty()) {
            log.emit(BumpEvent::FileEdited {
                path: edit.path.clone(),
                changes: edit.changes.clone(),
            });
        }
        log.success(
            BumpPhase::MutateAndVerify,
            format!("{} file(s) verified", edits.len()),
        );

        // ── Confirm release notes ──
        match &config.release_notes {
            Some(notes) if options.part != BumpPart::None => {
                log.start(BumpPhase::ConfirmReleaseNotes);
                if !self.confirm.confirm_release_notes(&notes.path)? {
                    warn!(path = %notes.path, "release notes not confirmed");
                    return Err(BumpError::ReleaseNotesNotConfirmed(notes.path.clone()));
                }
                log.success(
                    BumpPhase::ConfirmReleaseNotes,
                    format!("{} confirmed", notes.path),
                );
            }
            Some(_) => log.skip(BumpPhase::ConfirmReleaseNotes, "part is none"),
            None => log.skip(
                BumpPhase::ConfirmReleaseNotes,
                "no release notes configured",
            ),
        }

        // ── Write files ──
        log.start(BumpPhase::WriteFiles);
        let files_written = mutate::apply_edits(&edits)?;
        log.success(
            BumpPhase::WriteFiles,
            format!("{} file(s) written", files_written.len()),
        );

        // ── Persist config ──
        log.start(BumpPhase::PersistConfig);
        store.set(MAIN_SECTION, "current_version", &new.to_string())?;
        let store_written = store.save()?;
        if store_written {
            log.success(
                BumpPhase::PersistConfig,
                format!("current_version = {new}"),
            );
        } else {
            log.success(BumpPhase::PersistConfig, "version store unchanged");
        }

        // ── Commit ──
        let changed_on_disk = store_written || !files_written.is_empty();
        let committed = if config.commit && changed_on_disk {
            log.start(BumpPhase::Commit);
            let message = commit_message(old, new, options.msg.as_deref());
            let files = self.commit_files(&config, options);
            info!(files = files.len(), %message, "committing");
            self.vcs.commit(&files, &message)?;
            log.success(BumpPhase::Commit, message.clone());
            Some(message)
        } else if config.commit {
            log.skip(BumpPhase::Commit, "nothing changed");
            None
        } else {
            log.skip(BumpPhase::Commit, "commit disabled");
            None
        };

        // ── Tag ──
        let tag = if config.tag && config.version_changed() {
            log.start(BumpPhase::Tag);
            let name = version::release_tag(new);
            if !config.commit {
                warn!(tag = %name, "tagging without a commit; the tag points at the previous commit");
            }
            self.vcs.tag(&name)?;
            info!(tag = %name, "tagged");
            log.success(BumpPhase::Tag, name.clone());
            Some(name)
        } else if config.tag {
            log.skip(BumpPhase::Tag, "version unchanged");
            None
        } else {
            log.skip(BumpPhase::Tag, "tagging disabled");
            None
        };

        Ok(BumpOutcome {
            part: options.part,
            previous_version: old,
            new_version: new,
            files_written,
            store_written,
            commit_message: committed,
            tag,
            phases: log.phases,
        })
    }

    /// Tag the stored version as `<branch>-<version>-<YYYY-MM-DD@HH.MM>`.
    ///
    /// Touches neither tracked files nor the store.
    #[instrument(skip(self), fields(start_dir = %self.start_dir))]
    pub fn push_tag(&self, now: NaiveDateTime) -> BumpResult<PushTagOutcome> {
        let store = self.open_store()?;
        let version = VersionSpec::parse(store.require(MAIN_SECTION, "current_version")?)?;
        let branch = self.vcs.current_branch()?;
        let tag = version::compose_tag(&branch, version, now);
        self.vcs.tag(&tag)?;
        info!(%tag, "tagged");
        Ok(PushTagOutcome {
            branch,
            version,
            tag,
        })
    }

    fn compile_secondary(
        &self,
        secondary: &SecondaryConfig,
        config: &BumpConfig,
        options: &BumpOptions,
    ) -> BumpResult<SecondaryPattern> {
        let vars = TemplateVars {
            git_version: self.vcs.commit_descriptor()?,
            ci_version: options.ci_version.clone(),
            current_version: config.current_version.to_string(),
            new_version: config.new_version.to_string(),
        };
        Ok(SecondaryPattern::compile(
            &secondary.pattern,
            &secondary.template,
            &vars,
        )?)
    }

    /// Store file, tracked files, then release notes when they belong in the commit.
    fn commit_files(&self, config: &BumpConfig, options: &BumpOptions) -> Vec<Utf8PathBuf> {
        let mut files = vec![self.store_path()];
        files.extend(config.tracked_files.iter().cloned());
        if let Some(notes) = config.staged_release_notes(options.part) {
            files.push(notes.to_path_buf());
        }
        files
    }
}

/// `"bump version: {old} -> {new}"`, with `" {msg}"` appended when given.
pub fn commit_message(old: VersionSpec, new: VersionSpec, msg: Option<&str>) -> String {
    let mut message = format!("bump version: {old} -> {new}");
    if let Some(msg) = msg {
        message.push(' ');
        message.push_str(msg);
    }
    message
}
