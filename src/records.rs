// src/records.rs

//! Transfer records produced by the tool-output parsers
//!
//! These are short-lived: a scheduled refresh produces them off the
//! coordinator thread and the repository consumes them when the results
//! are applied. The repository's own entities live in `crate::repo`.

use chrono::NaiveDateTime;
use strum_macros::Display;

/// Status of a package. The declaration order is meaningful: it is the
/// sort order used when ordering a catalog by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum PackageStatus {
    /// Installed but older than the registry version
    Outdated,
    /// Installed and newer than the registry version
    Newer,
    /// Installed and in sync with the registry
    Installed,
    /// Not installed
    NotInstalled,
    /// Installed but not present in any official registry
    Foreign,
    /// Foreign and older than its foreign-source version
    ForeignOutdated,
}

impl PackageStatus {
    pub fn installed(self) -> bool {
        self != PackageStatus::NotInstalled
    }

    /// Whether this status counts as outdated. `newer_counts` controls
    /// whether a locally-newer package is included.
    pub fn outdated(self, newer_counts: bool) -> bool {
        match self {
            PackageStatus::Outdated | PackageStatus::ForeignOutdated => true,
            PackageStatus::Newer => newer_counts,
            _ => false,
        }
    }
}

/// One entry of the registry package listing (`-Ss`-style output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub repository: String,
    pub version: String,
    pub description: String,
    /// Previously-installed version, only set for an outdated install
    pub previous_version: String,
    pub status: PackageStatus,
}

impl PackageRecord {
    pub fn new(
        name: impl Into<String>,
        repository: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        status: PackageStatus,
        previous_version: impl Into<String>,
    ) -> Self {
        let previous_version = previous_version.into().trim().to_string();
        Self {
            name: name.into(),
            repository: repository.into(),
            version: version.into(),
            description: description.into(),
            previous_version,
            status,
        }
    }
}

/// One block of the detail listing (`-Si`/`-Qi`-style output).
///
/// Imported as UTF-8; the packager field may carry arbitrary non-ASCII
/// content. Sizes are in KiB as printed by the tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailRecord {
    pub name: String,
    pub repository: String,
    pub version: String,
    pub url: String,
    pub license: String,
    pub group: String,
    pub provides: String,
    pub required_by: String,
    pub optional_for: String,
    pub depends_on: String,
    pub opt_depends: String,
    pub conflicts_with: String,
    pub replaces: String,
    pub packager: String,
    pub arch: String,
    pub description: String,
    pub build_date: Option<NaiveDateTime>,
    pub download_size: f64,
    pub installed_size: f64,
}
