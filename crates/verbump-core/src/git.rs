//! Version-control operations needed by a bump.
//!
//! The orchestrator talks to a [`Vcs`] so tests can swap in a
//! [`RecordingVcs`]. [`SystemGit`] shells out to `git` for all operations,
//! which inherits the user's hooks, signing setup and identity.

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {output}")]
    Command {
        /// The git subcommand that failed (e.g., "commit").
        command: String,
        /// Captured stderr, or stdout when git wrote nothing to stderr.
        output: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,

    /// HEAD does not point at a branch.
    #[error("HEAD is detached; check out a branch first")]
    DetachedHead,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// The version-control capabilities a bump needs.
pub trait Vcs {
    /// Stage `files` and commit them with `message`.
    fn commit(&self, files: &[Utf8PathBuf], message: &str) -> GitResult<()>;

    /// Create a lightweight tag at HEAD.
    fn tag(&self, name: &str) -> GitResult<()>;

    /// Name of the checked-out branch.
    fn current_branch(&self) -> GitResult<String>;

    /// Describe HEAD as `"<short-hash> <iso-date> by <author>"`.
    fn commit_descriptor(&self) -> GitResult<String>;
}

/// [`Vcs`] backed by the system `git` binary, run inside `root`.
#[derive(Debug, Clone)]
pub struct SystemGit {
    root: Utf8PathBuf,
    program: PathBuf,
}

impl SystemGit {
    /// Bind to the repository at `root`, using the `git` found on `PATH`.
    ///
    /// A missing `git` is only reported once an operation runs, so bumps
    /// that never commit or tag work without it.
    pub fn new(root: &Utf8Path) -> Self {
        let program = which::which("git").unwrap_or_else(|e| {
            debug!(error = %e, "git not found on PATH");
            PathBuf::from("git")
        });
        debug!(program = %program.display(), %root, "using system git");
        Self {
            root: root.to_path_buf(),
            program,
        }
    }

    /// Run a git command in the repository root and return its stdout.
    fn git(&self, args: &[&str]) -> GitResult<String> {
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(self.root.as_std_path())
            .output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

            if stderr.contains("not a git repository") {
                return Err(GitError::NotARepo);
            }

            // `git commit` reports "nothing to commit" on stdout.
            let message = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            Err(GitError::Command {
                command: args.first().unwrap_or(&"").to_string(),
                output: message,
            })
        }
    }
}

impl Vcs for SystemGit {
    #[instrument(skip(self), fields(files = files.len()))]
    fn commit(&self, files: &[Utf8PathBuf], message: &str) -> GitResult<()> {
        let mut add = vec!["add", "--"];
        add.extend(files.iter().map(|f| f.as_str()));
        self.git(&add)?;
        self.git(&["commit", "-m", message])?;
        debug!("committed");
        Ok(())
    }

    #[instrument(skip(self))]
    fn tag(&self, name: &str) -> GitResult<()> {
        self.git(&["tag", name])?;
        debug!(%name, "tag created");
        Ok(())
    }

    #[instrument(skip(self))]
    fn current_branch(&self) -> GitResult<String> {
        let output = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = output.trim().to_string();
        if branch == "HEAD" {
            debug!("detached HEAD");
            return Err(GitError::DetachedHead);
        }
        debug!(%branch, "current branch");
        Ok(branch)
    }

    #[instrument(skip(self))]
    fn commit_descriptor(&self) -> GitResult<String> {
        let output = self.git(&["log", "-1", "--date=iso", "--pretty=format:%h %ad by %an"])?;
        Ok(output.trim().to_string())
    }
}

/// A call made against a [`RecordingVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    /// `commit(files, message)`.
    Commit {
        /// Staged files.
        files: Vec<Utf8PathBuf>,
        /// Commit message.
        message: String,
    },
    /// `tag(name)`.
    Tag(String),
}

/// In-memory [`Vcs`] that records mutating calls instead of touching a repository.
#[derive(Debug, Default)]
pub struct RecordingVcs {
    /// Returned by [`Vcs::current_branch`]; `None` behaves like a detached HEAD.
    pub branch: Option<String>,
    /// Returned by [`Vcs::commit_descriptor`].
    pub descriptor: String,
    calls: RefCell<Vec<VcsCall>>,
}

impl RecordingVcs {
    /// A double positioned on `branch`.
    pub fn on_branch(branch: &str) -> Self {
        Self {
            branch: Some(branch.to_string()),
            descriptor: "0000000 1970-01-01 00:00:00 +0000 by nobody".to_string(),
            calls: RefCell::default(),
        }
    }

    /// Every commit/tag call so far, in order.
    pub fn calls(&self) -> Vec<VcsCall> {
        self.calls.borrow().clone()
    }
}

impl Vcs for RecordingVcs {
    fn commit(&self, files: &[Utf8PathBuf], message: &str) -> GitResult<()> {
        self.calls.borrow_mut().push(VcsCall::Commit {
            files: files.to_vec(),
            message: message.to_string(),
        });
        Ok(())
    }

    fn tag(&self, name: &str) -> GitResult<()> {
        self.calls.borrow_mut().push(VcsCall::Tag(name.to_string()));
        Ok(())
    }

    fn current_branch(&self) -> GitResult<String> {
        self.branch.clone().ok_or(GitError::DetachedHead)
    }

    fn commit_descriptor(&self) -> GitResult<String> {
        Ok(self.descriptor.clone())
    }
}
