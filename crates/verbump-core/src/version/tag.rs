//! Tag names for releases and branch snapshots.

use chrono::NaiveDateTime;

use super::VersionSpec;

/// Timestamp layout used in composite tags, e.g. `2024-01-01@10.30`.
const TAG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d@%H.%M";

/// Tag for a regular release: `v1.2.3`.
pub fn release_tag(version: VersionSpec) -> String {
    format!("v{version}")
}

/// Composite tag for `push_tag`: `<branch>-<version>-<YYYY-MM-DD@HH.MM>`.
pub fn compose_tag(branch: &str, version: VersionSpec, now: NaiveDateTime) -> String {
    format!("{branch}-{version}-{}", now.format(TAG_TIMESTAMP_FORMAT))
}
