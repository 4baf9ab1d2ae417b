//! Version arithmetic and tag formatting.
//!
//! Versions are strictly three non-negative integers. Anything else stored
//! in the version store is rejected with [`VersionError::Format`] rather
//! than coerced.

pub mod tag;

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

pub use tag::{compose_tag, release_tag};

/// Errors from version operations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersionError {
    /// The version string is not `major.minor.patch`.
    #[error("invalid version {input:?}: {reason}")]
    Format {
        /// The offending input.
        input: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A component would overflow when incremented.
    #[error("cannot bump {part} of {version}: component overflow")]
    Overflow {
        /// The part being bumped.
        part: BumpPart,
        /// The version being bumped.
        version: VersionSpec,
    },

    /// `push_tag` does not compute a new version.
    #[error("{0} is not a version bump")]
    NotAVersionBump(BumpPart),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// A three-component `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionSpec {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

impl VersionSpec {
    /// Create a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `"major.minor.patch"`, trimming surrounding whitespace.
    pub fn parse(input: &str) -> VersionResult<Self> {
        let trimmed = input.trim();
        let format_err = |reason: &str| VersionError::Format {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() != 3 {
            return Err(format_err(&format!(
                "expected 3 dot-separated components, found {}",
                parts.len()
            )));
        }

        let mut components = [0u64; 3];
        for (slot, part) in components.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format_err(&format!(
                    "component {part:?} is not a non-negative integer"
                )));
            }
            // Display would drop the zero, so the stored text could not be found again.
            if part.len() > 1 && part.starts_with('0') {
                return Err(format_err(&format!("component {part:?} has a leading zero")));
            }
            *slot = part
                .parse()
                .map_err(|_| format_err(&format!("component {part:?} is out of range")))?;
        }

        let [major, minor, patch] = components;
        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for VersionSpec {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which part of the version to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BumpPart {
    /// Keep the version; still run the secondary substitution.
    None,
    /// `X.0.0`.
    Major,
    /// `x.Y.0`.
    Minor,
    /// `x.y.Z`.
    Patch,
    /// Tag the current version with branch and timestamp.
    #[value(name = "push_tag")]
    PushTag,
}

impl fmt::Display for BumpPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
            Self::PushTag => write!(f, "push_tag"),
        }
    }
}

/// Compute the version that results from bumping `part` of `current`.
pub fn bump(current: VersionSpec, part: BumpPart) -> VersionResult<VersionSpec> {
    let overflow = || VersionError::Overflow {
        part,
        version: current,
    };
    match part {
        BumpPart::None => Ok(current),
        BumpPart::Patch => {
            let patch = current.patch.checked_add(1).ok_or_else(overflow)?;
            Ok(VersionSpec::new(current.major, current.minor, patch))
        }
        BumpPart::Minor => {
            let minor = current.minor.checked_add(1).ok_or_else(overflow)?;
            Ok(VersionSpec::new(current.major, minor, 0))
        }
        BumpPart::Major => {
            let major = current.major.checked_add(1).ok_or_else(overflow)?;
            Ok(VersionSpec::new(major, 0, 0))
        }
        BumpPart::PushTag => Err(VersionError::NotAVersionBump(part)),
    }
}
