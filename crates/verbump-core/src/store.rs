//! Sectioned key/value store holding the current version.
//!
//! The store is an INI-style file (`.bumpversion.cfg` by default):
//!
//! ```ini
//! [bumpversion]
//! current_version = 1.2.3
//! commit = True
//! tag = False
//!
//! [bumpversion:file:src/version.h]
//! ```
//!
//! Edits are lossless. Setting a value rewrites only the bytes of that
//! value; comments, ordering, spacing and line endings survive untouched.

use std::ops::Range;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::fsutil;

/// Errors from reading or writing the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store file does not exist.
    #[error("version store {0} does not exist")]
    NotFound(Utf8PathBuf),

    /// A line could not be parsed.
    #[error("{path}:{line}: {reason}")]
    Malformed {
        /// Store file.
        path: Utf8PathBuf,
        /// 1-based line number.
        line: usize,
        /// What is wrong with the line.
        reason: String,
    },

    /// A required section is absent.
    #[error("{path}: missing section [{section}]")]
    MissingSection {
        /// Store file.
        path: Utf8PathBuf,
        /// Section name.
        section: String,
    },

    /// A required key is absent.
    #[error("{path}: missing key {key:?} in section [{section}]")]
    MissingKey {
        /// Store file.
        path: Utf8PathBuf,
        /// Section name.
        section: String,
        /// Key name.
        key: String,
    },

    /// A value that should be boolean is not.
    #[error("{path}: [{section}] {key} = {value:?} is not a boolean")]
    InvalidBool {
        /// Store file.
        path: Utf8PathBuf,
        /// Section name.
        section: String,
        /// Key name.
        key: String,
        /// The raw value.
        value: String,
    },

    /// Reading or writing the file failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Store file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    /// Blank line or full-line comment.
    Trivia,
    /// `[name]`; the payload is the index into `sections`.
    Header(usize),
    /// `key = value` inside section `section`.
    Entry {
        section: usize,
        key: String,
        value: Range<usize>,
    },
}

#[derive(Debug, Clone)]
struct Line {
    text: String,
    eol: &'static str,
    kind: LineKind,
}

/// A parsed store file that can be queried, edited and saved.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: Utf8PathBuf,
    sections: Vec<String>,
    lines: Vec<Line>,
    original: String,
}

impl ConfigStore {
    /// Read and parse the store at `path`.
    #[instrument(fields(%path))]
    pub fn open(path: &Utf8Path) -> StoreResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let store = Self::parse(path, &text)?;
        debug!(sections = store.sections.len(), "version store loaded");
        Ok(store)
    }

    /// Parse store text. `path` is only used for diagnostics and [`save`](Self::save).
    pub fn parse(path: &Utf8Path, text: &str) -> StoreResult<Self> {
        let mut sections: Vec<String> = Vec::new();
        let mut lines = Vec::new();
        let mut current: Option<usize> = None;

        for (idx, raw) in text.split_inclusive('\n').enumerate() {
            let malformed = |reason: String| StoreError::Malformed {
                path: path.to_path_buf(),
                line: idx + 1,
                reason,
            };

            let (body, eol) = if let Some(body) = raw.strip_suffix("\r\n") {
                (body, "\r\n")
            } else if let Some(body) = raw.strip_suffix('\n') {
                (body, "\n")
            } else {
                (raw, "")
            };

            let trimmed = body.trim();
            let kind = if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';')
            {
                LineKind::Trivia
            } else if let Some(inner) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                let name = inner.trim();
                if sections.iter().any(|s| s == name) {
                    return Err(malformed(format!("duplicate section [{name}]")));
                }
                sections.push(name.to_string());
                let index = sections.len() - 1;
                current = Some(index);
                LineKind::Header(index)
            } else {
                let Some(section) = current else {
                    return Err(malformed("key/value line before any [section]".into()));
                };
                let Some(sep) = body.find(['=', ':']) else {
                    return Err(malformed(format!("expected `key = value`, found {trimmed:?}")));
                };
                let key = body[..sep].trim();
                if key.is_empty() {
                    return Err(malformed("empty key".into()));
                }
                let after = &body[sep + 1..];
                let start = sep + 1 + (after.len() - after.trim_start().len());
                let end = body.trim_end().len().max(start);
                let duplicate = lines.iter().any(|l: &Line| {
                    matches!(&l.kind, LineKind::Entry { section: s, key: k, .. } if *s == section && k == key)
                });
                if duplicate {
                    return Err(malformed(format!(
                        "duplicate key {key:?} in section [{}]",
                        sections[section]
                    )));
                }
                LineKind::Entry {
                    section,
                    key: key.to_string(),
                    value: start..end,
                }
            };

            lines.push(Line {
                text: body.to_string(),
                eol,
                kind,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            sections,
            lines,
            original: text.to_string(),
        })
    }

    /// Location of the store file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Section names in file order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(String::as_str)
    }

    /// Whether a section with this exact name exists.
    pub fn has_section(&self, section: &str) -> bool {
        self.section_index(section).is_some()
    }

    /// Suffixes of every section named `<prefix><suffix>`, in file order.
    pub fn sections_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.sections()
            .filter_map(move |name| name.strip_prefix(prefix))
    }

    /// Look up a value.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let index = self.section_index(section)?;
        self.entry(index, key).map(|line| match &line.kind {
            LineKind::Entry { value, .. } => &line.text[value.clone()],
            _ => "",
        })
    }

    /// Look up a value that must be present.
    pub fn require(&self, section: &str, key: &str) -> StoreResult<&str> {
        if !self.has_section(section) {
            return Err(StoreError::MissingSection {
                path: self.path.clone(),
                section: section.to_string(),
            });
        }
        self.get(section, key).ok_or_else(|| StoreError::MissingKey {
            path: self.path.clone(),
            section: section.to_string(),
            key: key.to_string(),
        })
    }

    /// Look up an optional boolean value.
    pub fn get_bool(&self, section: &str, key: &str) -> StoreResult<Option<bool>> {
        self.get(section, key)
            .map(|raw| self.parse_bool(section, key, raw))
            .transpose()
    }

    /// Look up a boolean value that must be present.
    pub fn require_bool(&self, section: &str, key: &str) -> StoreResult<bool> {
        let raw = self.require(section, key)?;
        self.parse_bool(section, key, raw)
    }

    /// Set a value, adding the key to the end of its section if needed.
    ///
    /// The section must already exist.
    pub fn set(&mut self, section: &str, key: &str, new_value: &str) -> StoreResult<()> {
        let index = self
            .section_index(section)
            .ok_or_else(|| StoreError::MissingSection {
                path: self.path.clone(),
                section: section.to_string(),
            })?;

        if let Some(pos) = self.entry_position(index, key) {
            let line = &mut self.lines[pos];
            if let LineKind::Entry { value, .. } = &mut line.kind {
                let needs_space = value.start == value.end
                    && !line.text[..value.start]
                        .ends_with(|c: char| c.is_whitespace());
                let replacement = if needs_space {
                    format!(" {new_value}")
                } else {
                    new_value.to_string()
                };
                line.text.replace_range(value.clone(), &replacement);
                let start = value.start + usize::from(needs_space);
                *value = start..start + new_value.len();
            }
            return Ok(());
        }

        // Insert after the last non-trivia line of the section.
        let Some(anchor) = self.lines.iter().rposition(|l| match &l.kind {
            LineKind::Header(s) => *s == index,
            LineKind::Entry { section, .. } => *section == index,
            LineKind::Trivia => false,
        }) else {
            return Err(StoreError::MissingSection {
                path: self.path.clone(),
                section: section.to_string(),
            });
        };

        let anchor_eol = self.lines[anchor].eol;
        let eol = if anchor_eol.is_empty() { "\n" } else { anchor_eol };
        let is_last = anchor + 1 == self.lines.len();
        self.lines[anchor].eol = eol;

        let start = key.len() + 3;
        self.lines.insert(
            anchor + 1,
            Line {
                text: format!("{key} = {new_value}"),
                eol: if is_last { anchor_eol } else { eol },
                kind: LineKind::Entry {
                    section: index,
                    key: key.to_string(),
                    value: start..start + new_value.len(),
                },
            },
        );
        Ok(())
    }

    /// Render the store back to text.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.original.len() + 16);
        for line in &self.lines {
            out.push_str(&line.text);
            out.push_str(line.eol);
        }
        out
    }

    /// Whether edits have changed the rendered text.
    pub fn is_modified(&self) -> bool {
        self.render() != self.original
    }

    /// Write the store back to disk atomically if it changed.
    ///
    /// Returns `true` when the file was written.
    #[instrument(skip(self), fields(path = %self.path))]
    pub fn save(&mut self) -> StoreResult<bool> {
        let rendered = self.render();
        if rendered == self.original {
            debug!("version store unchanged, not writing");
            return Ok(false);
        }
        fsutil::write_atomic(&self.path, rendered.as_bytes()).map_err(|source| {
            StoreError::Io {
                path: self.path.clone(),
                source,
            }
        })?;
        self.original = rendered;
        debug!("version store written");
        Ok(true)
    }

    fn section_index(&self, section: &str) -> Option<usize> {
        self.sections.iter().position(|s| s == section)
    }

    fn entry_position(&self, section: usize, key: &str) -> Option<usize> {
        self.lines.iter().position(|l| {
            matches!(&l.kind, LineKind::Entry { section: s, key: k, .. } if *s == section && k == key)
        })
    }

    fn entry(&self, section: usize, key: &str) -> Option<&Line> {
        self.entry_position(section, key).map(|pos| &self.lines[pos])
    }

    fn parse_bool(&self, section: &str, key: &str, raw: &str) -> StoreResult<bool> {
        parse_bool(raw).ok_or_else(|| StoreError::InvalidBool {
            path: self.path.clone(),
            section: section.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
        })
    }
}

/// Boolean spellings accepted in the store.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}
