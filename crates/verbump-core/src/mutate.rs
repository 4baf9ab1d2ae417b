//! Verified rewriting of tracked files.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_edits`]) reads every tracked file and computes its
//!    rewritten content in memory. Each file must pass verification: a
//!    changed version has to be found, and a configured secondary pattern
//!    has to match at least one line.
//! 2. **Apply** ([`apply_edits`]) writes the edits, each one atomically.
//!
//! Nothing is written unless every file passed the plan phase.

use std::borrow::Cow;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::fsutil;
use crate::version::VersionSpec;

/// Errors from planning or applying file edits.
#[derive(Error, Debug)]
pub enum MutateError {
    /// The version changed but the old version string appears nowhere in the file.
    #[error("verification failed for {path}: no line contains version {old} (wanted {old} -> {new})")]
    VersionNotFound {
        /// Tracked file.
        path: Utf8PathBuf,
        /// Version that was searched for.
        old: VersionSpec,
        /// Version it would have been replaced with.
        new: VersionSpec,
    },

    /// The secondary pattern matched no line of the file.
    #[error("verification failed for {path}: pattern {pattern:?} changed no line")]
    PatternNotMatched {
        /// Tracked file.
        path: Utf8PathBuf,
        /// The regex source.
        pattern: String,
    },

    /// The secondary regex does not compile.
    #[error("invalid secondary pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The regex source.
        pattern: String,
        /// Compiler error.
        #[source]
        source: regex::Error,
    },

    /// The replacement template names a variable outside the allow-list.
    #[error("unknown placeholder {{{name}}} in replacement template {template:?} (allowed: {allowed})", allowed = TEMPLATE_VARIABLES.join(", "))]
    UnknownPlaceholder {
        /// Placeholder name.
        name: String,
        /// The full template.
        template: String,
    },

    /// A `{` or `}` in the replacement template has no partner.
    #[error("unbalanced brace at byte {offset} in replacement template {template:?}")]
    UnbalancedBrace {
        /// The full template.
        template: String,
        /// Byte offset of the offending brace.
        offset: usize,
    },

    /// A tracked file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Tracked file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A tracked file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Tracked file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl MutateError {
    /// Whether this is a verification failure (a substitution changed nothing).
    pub const fn is_verification(&self) -> bool {
        matches!(
            self,
            Self::VersionNotFound { .. } | Self::PatternNotMatched { .. }
        )
    }
}

/// Result alias for mutation operations.
pub type MutateResult<T> = Result<T, MutateError>;

// ──────────────────────────────────────────────
// Template variables
// ──────────────────────────────────────────────

/// Placeholder names a replacement template may use.
pub const TEMPLATE_VARIABLES: &[&str] =
    &["git_version", "ci_version", "current_version", "new_version"];

/// The fixed set of values available to replacement templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    /// VCS commit descriptor, `"<short-hash> <iso-date> by <author>"`.
    pub git_version: String,
    /// Externally supplied CI version, if any.
    pub ci_version: Option<String>,
    /// The version before the bump.
    pub current_version: String,
    /// The version after the bump.
    pub new_version: String,
}

impl TemplateVars {
    fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "git_version" => Some(Cow::Borrowed(&self.git_version)),
            "ci_version" => Some(
                self.ci_version
                    .as_deref()
                    .map_or(Cow::Borrowed(""), |ci| Cow::Owned(format!(" at {ci}"))),
            ),
            "current_version" => Some(Cow::Borrowed(&self.current_version)),
            "new_version" => Some(Cow::Borrowed(&self.new_version)),
            _ => None,
        }
    }
}

/// Resolve `{name}` placeholders in a replacement template.
///
/// `{{`/`}}` produce literal braces. A `{` preceded by an odd run of `$` is a
/// regex group reference (`${1}`, `${name}`) and is copied verbatim.
/// Substituted values have `$` doubled so the regex engine inserts them
/// literally.
pub fn render_template(template: &str, vars: &TemplateVars) -> MutateResult<String> {
    let unbalanced = |offset| MutateError::UnbalancedBrace {
        template: template.to_string(),
        offset,
    };

    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len());
    let mut dollars = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                out.push('{');
                i += 2;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                out.push('}');
                i += 2;
            }
            b'{' => {
                let close = template[i..].find('}').ok_or_else(|| unbalanced(i))? + i;
                if dollars % 2 == 1 {
                    out.push_str(&template[i..=close]);
                } else {
                    let name = &template[i + 1..close];
                    let value = vars.lookup(name).ok_or_else(|| MutateError::UnknownPlaceholder {
                        name: name.to_string(),
                        template: template.to_string(),
                    })?;
                    out.push_str(&value.replace('$', "$$"));
                }
                i = close + 1;
            }
            b'}' => return Err(unbalanced(i)),
            _ => {
                // Copy one UTF-8 scalar.
                let ch_len = template[i..].chars().next().map_or(1, char::len_utf8);
                out.push_str(&template[i..i + ch_len]);
                i += ch_len;
                dollars = if bytes[i - ch_len] == b'$' { dollars + 1 } else { 0 };
                continue;
            }
        }
        dollars = 0;
    }

    Ok(out)
}

// ──────────────────────────────────────────────
// Secondary pattern
// ──────────────────────────────────────────────

/// A compiled secondary substitution with its resolved replacement.
#[derive(Debug, Clone)]
pub struct SecondaryPattern {
    regex: Regex,
    replacement: String,
}

impl SecondaryPattern {
    /// Compile `pattern` and resolve `template` against `vars`.
    ///
    /// Compile once per invocation and share the result across files.
    pub fn compile(pattern: &str, template: &str, vars: &TemplateVars) -> MutateResult<Self> {
        let regex = Regex::new(pattern).map_err(|source| MutateError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let replacement = render_template(template, vars)?;
        debug!(%pattern, %replacement, "compiled secondary pattern");
        Ok(Self { regex, replacement })
    }

    /// The regex source.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// The replacement after placeholder resolution.
    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

// ──────────────────────────────────────────────
// Edits
// ──────────────────────────────────────────────

/// One line that a substitution changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineChange {
    /// 1-based line number.
    pub line: usize,
    /// Line before substitution.
    pub before: String,
    /// Line after substitution.
    pub after: String,
}

/// The verified, not yet written, new content of one tracked file.
#[derive(Debug, Clone)]
pub struct FileEdit {
    /// Tracked file.
    pub path: Utf8PathBuf,
    /// Whether the version substitution changed at least one line.
    pub version_replaced: bool,
    /// Whether the secondary pattern changed at least one line.
    pub secondary_replaced: bool,
    /// Lines that changed.
    pub changes: Vec<LineChange>,
    original: String,
    rewritten: String,
}

impl FileEdit {
    fn untouched(path: &Utf8Path, content: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            version_replaced: false,
            secondary_replaced: false,
            changes: Vec::new(),
            original: content.to_string(),
            rewritten: content.to_string(),
        }
    }

    /// The content that will be written.
    pub fn contents(&self) -> &str {
        &self.rewritten
    }

    /// The rewritten content, line by line.
    pub fn rewritten_lines(&self) -> impl Iterator<Item = &str> {
        self.rewritten.lines()
    }

    /// Whether writing would leave the file byte-for-byte unchanged.
    pub fn is_noop(&self) -> bool {
        self.original == self.rewritten
    }

    /// Write the new content atomically. Returns `false` for no-op edits.
    pub fn write(&self) -> MutateResult<bool> {
        if self.is_noop() {
            debug!(path = %self.path, "content unchanged, not writing");
            return Ok(false);
        }
        fsutil::write_atomic(&self.path, self.rewritten.as_bytes()).map_err(|source| {
            MutateError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        Ok(true)
    }
}

/// Compute and verify the rewritten content of one file.
///
/// Version substitution runs first, then the secondary pattern on the
/// result. Output lines are `\n`-terminated regardless of the input's line
/// endings. When neither substitution is active the content is returned
/// untouched.
pub fn mutate(
    path: &Utf8Path,
    content: &str,
    old: VersionSpec,
    new: VersionSpec,
    secondary: Option<&SecondaryPattern>,
) -> MutateResult<FileEdit> {
    let change_version = old != new;
    if !change_version && secondary.is_none() {
        return Ok(FileEdit::untouched(path, content));
    }

    let old_str = old.to_string();
    let new_str = new.to_string();

    let mut version_replaced = false;
    let mut secondary_replaced = false;
    let mut changes = Vec::new();
    let mut rewritten = String::with_capacity(content.len() + 16);

    for (idx, line) in content.lines().enumerate() {
        let mut current = Cow::Borrowed(line);

        if change_version && current.contains(&old_str) {
            current = Cow::Owned(current.replace(&old_str, &new_str));
            version_replaced = true;
        }

        if let Some(secondary) = secondary {
            let replaced = secondary
                .regex
                .replace_all(&current, secondary.replacement.as_str())
                .into_owned();
            if replaced != *current {
                current = Cow::Owned(replaced);
                secondary_replaced = true;
            }
        }

        if current != line {
            info!(%path, line = idx + 1, before = line.trim(), after = current.trim(), "changing line");
            changes.push(LineChange {
                line: idx + 1,
                before: line.to_string(),
                after: current.to_string(),
            });
        }

        rewritten.push_str(&current);
        rewritten.push('\n');
    }

    if change_version && !version_replaced {
        return Err(MutateError::VersionNotFound {
            path: path.to_path_buf(),
            old,
            new,
        });
    }
    if let Some(secondary) = secondary
        && !secondary_replaced
    {
        return Err(MutateError::PatternNotMatched {
            path: path.to_path_buf(),
            pattern: secondary.pattern().to_string(),
        });
    }

    Ok(FileEdit {
        path: path.to_path_buf(),
        version_replaced,
        secondary_replaced,
        changes,
        original: content.to_string(),
        rewritten,
    })
}

/// Read and verify every tracked file without writing anything.
#[instrument(skip_all, fields(files = files.len(), %old, %new, secondary = secondary.is_some()))]
pub fn plan_edits(
    files: &[Utf8PathBuf],
    old: VersionSpec,
    new: VersionSpec,
    secondary: Option<&SecondaryPattern>,
) -> MutateResult<Vec<FileEdit>> {
    files
        .iter()
        .map(|path| {
            let content = std::fs::read_to_string(path).map_err(|source| MutateError::Read {
                path: path.clone(),
                source,
            })?;
            let edit = mutate(path, &content, old, new, secondary)?;
            debug!(%path, changed_lines = edit.changes.len(), "file verified");
            Ok(edit)
        })
        .collect()
}

/// Write every planned edit. Returns the paths that were actually written.
#[instrument(skip_all, fields(files = edits.len()))]
pub fn apply_edits(edits: &[FileEdit]) -> MutateResult<Vec<Utf8PathBuf>> {
    let mut written = Vec::new();
    for edit in edits {
        if edit.write()? {
            written.push(edit.path.clone());
        }
    }
    debug!(written = written.len(), "edits applied");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const V123: VersionSpec = VersionSpec::new(1, 2, 3);
    const V124: VersionSpec = VersionSpec::new(1, 2, 4);

    fn path() -> &'static Utf8Path {
        Utf8Path::new("version.txt")
    }

    fn vars() -> TemplateVars {
        TemplateVars {
            git_version: "abc1234 2024-01-01 10:30:00 +0100 by Jane".into(),
            ci_version: Some("build-77".into()),
            current_version: "1.2.3".into(),
            new_version: "1.2.4".into(),
        }
    }

    #[test]
    fn replaces_version_on_every_matching_line() {
        let edit = mutate(path(), "version=1.2.3\nother\nv1.2.3 again 1.2.3\n", V123, V124, None)
            .unwrap();
        assert_eq!(edit.contents(), "version=1.2.4\nother\nv1.2.4 again 1.2.4\n");
        assert!(edit.version_replaced);
        assert!(!edit.secondary_replaced);
        assert_eq!(edit.changes.len(), 2);
        assert_eq!(edit.changes[0].line, 1);
        assert_eq!(edit.changes[1].line, 3);
    }

    #[test]
    fn missing_old_version_fails_verification() {
        let err = mutate(path(), "version=9.9.9\n", V123, V124, None).unwrap_err();
        assert!(err.is_verification());
        assert!(err.to_string().contains("version.txt"));
        assert!(err.to_string().contains("1.2.3"));
    }

    #[test]
    fn unchanged_version_without_pattern_is_untouched() {
        let content = "keep  \r\ntrailing spaces\r\nno newline";
        let edit = mutate(path(), content, V123, V123, None).unwrap();
        assert!(edit.is_noop());
        assert_eq!(edit.contents(), content);
    }

    #[test]
    fn line_endings_are_normalized() {
        let edit = mutate(path(), "a 1.2.3\r\nb\r\nc", V123, V124, None).unwrap();
        assert_eq!(edit.contents(), "a 1.2.4\nb\nc\n");
        assert_eq!(edit.rewritten_lines().collect::<Vec<_>>(), ["a 1.2.4", "b", "c"]);
    }

    #[test]
    fn secondary_pattern_applies_after_version() {
        let pattern = SecondaryPattern::compile(
            r#"(#define BUILD) ".*""#,
            r#"$1 "{new_version}{ci_version}""#,
            &vars(),
        )
        .unwrap();
        let content = "#define VERSION \"1.2.3\"\n#define BUILD \"old\"\n";
        let edit = mutate(path(), content, V123, V124, Some(&pattern)).unwrap();
        assert_eq!(
            edit.contents(),
            "#define VERSION \"1.2.4\"\n#define BUILD \"1.2.4 at build-77\"\n"
        );
        assert!(edit.version_replaced);
        assert!(edit.secondary_replaced);
    }

    #[test]
    fn secondary_pattern_sees_version_substitution_result() {
        let pattern = SecondaryPattern::compile(r"ver 1\.2\.4", "ver {new_version}-final", &vars())
            .unwrap();
        let edit = mutate(path(), "ver 1.2.3\n", V123, V124, Some(&pattern)).unwrap();
        assert_eq!(edit.contents(), "ver 1.2.4-final\n");
    }

    #[test]
    fn secondary_pattern_with_no_match_fails_verification() {
        let pattern = SecondaryPattern::compile("NOPE", "x", &vars()).unwrap();
        let err = mutate(path(), "version=1.2.3\n", V123, V124, Some(&pattern)).unwrap_err();
        assert!(matches!(err, MutateError::PatternNotMatched { .. }));
        assert!(err.is_verification());
    }

    #[test]
    fn secondary_match_that_changes_nothing_fails_verification() {
        let pattern = SecondaryPattern::compile("same", "same", &vars()).unwrap();
        let err = mutate(path(), "same\n", V123, V123, Some(&pattern)).unwrap_err();
        assert!(matches!(err, MutateError::PatternNotMatched { .. }));
    }

    #[test]
    fn none_bump_with_pattern_only_runs_pattern() {
        let pattern =
            SecondaryPattern::compile(r"GIT=.*", "GIT={git_version}", &vars()).unwrap();
        let edit = mutate(path(), "v=1.2.3\nGIT=\n", V123, V123, Some(&pattern)).unwrap();
        assert_eq!(
            edit.contents(),
            "v=1.2.3\nGIT=abc1234 2024-01-01 10:30:00 +0100 by Jane\n"
        );
        assert!(!edit.version_replaced);
    }

    #[test]
    fn invalid_regex_is_reported() {
        let err = SecondaryPattern::compile("(unclosed", "x", &vars()).unwrap_err();
        assert!(matches!(err, MutateError::InvalidPattern { .. }));
    }

    #[test]
    fn render_template_resolves_allowed_names() {
        let out = render_template("{git_version}{ci_version} [{current_version}->{new_version}]", &vars())
            .unwrap();
        assert_eq!(
            out,
            "abc1234 2024-01-01 10:30:00 +0100 by Jane at build-77 [1.2.3->1.2.4]"
        );
    }

    #[test]
    fn render_template_empty_ci_version() {
        let vars = TemplateVars {
            ci_version: None,
            ..vars()
        };
        assert_eq!(render_template("x{ci_version}y", &vars).unwrap(), "xy");
    }

    #[test]
    fn render_template_rejects_unknown_names() {
        let err = render_template("{self.config}", &vars()).unwrap_err();
        assert!(matches!(err, MutateError::UnknownPlaceholder { ref name, .. } if name == "self.config"));
    }

    #[test]
    fn render_template_keeps_group_references_and_escapes() {
        assert_eq!(
            render_template("${1}-{{literal}}-$$-{new_version}", &vars()).unwrap(),
            "${1}-{literal}-$$-1.2.4"
        );
        // `$$` is an escaped dollar, so the brace after it is a placeholder.
        assert_eq!(render_template("$${new_version}", &vars()).unwrap(), "$$1.2.4");
    }

    #[test]
    fn render_template_escapes_dollars_in_values() {
        let vars = TemplateVars {
            git_version: "cost $5".into(),
            ..vars()
        };
        assert_eq!(render_template("{git_version}", &vars).unwrap(), "cost $$5");
    }

    #[test]
    fn render_template_unbalanced_braces() {
        assert!(matches!(
            render_template("oops {new_version", &vars()),
            Err(MutateError::UnbalancedBrace { offset: 5, .. })
        ));
        assert!(matches!(
            render_template("oops }", &vars()),
            Err(MutateError::UnbalancedBrace { offset: 5, .. })
        ));
    }

    #[test]
    fn plan_rejects_everything_when_one_file_fails() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let good = root.join("good.txt");
        let bad = root.join("bad.txt");
        std::fs::write(&good, "1.2.3\n").unwrap();
        std::fs::write(&bad, "nothing here\n").unwrap();

        let err = plan_edits(&[good.clone(), bad], V123, V124, None).unwrap_err();
        assert!(err.is_verification());
        assert_eq!(std::fs::read_to_string(&good).unwrap(), "1.2.3\n");
    }

    #[test]
    fn apply_writes_changed_files_only() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let a = root.join("a.txt");
        let b = root.join("b.txt");
        std::fs::write(&a, "1.2.3\r\n").unwrap();
        std::fs::write(&b, "version 1.2.3\n").unwrap();

        let edits = plan_edits(&[a.clone(), b.clone()], V123, V124, None).unwrap();
        let written = apply_edits(&edits).unwrap();

        assert_eq!(written, vec![a.clone(), b.clone()]);
        assert_eq!(std::fs::read_to_string(&a).unwrap(), "1.2.4\n");
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "version 1.2.4\n");
    }

    #[test]
    fn plan_reports_unreadable_file() {
        let err = plan_edits(&[Utf8PathBuf::from("/definitely/not/here.txt")], V123, V124, None)
            .unwrap_err();
        assert!(matches!(err, MutateError::Read { .. }));
    }
}
