// src/repo/entity.rs

//! Entities owned by the package repository
//!
//! `PackageEntity` and `GroupEntity` are created and invalidated only by
//! `Repository` mutation methods; dependents observe them read-only.
//! Dependency and group membership links are indices into the
//! repository's sorted package vector, never owning references, and any
//! rebuild or resort of that vector invalidates them wholesale.

use crate::records::{PackageRecord, PackageStatus};
use crate::version;
use std::cmp::Ordering;
use strum_macros::Display;

/// Granularity of a repository mutation notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ResetKind {
    /// The whole package vector has been rebuilt
    FullReplace,
    /// The list of package groups has been replaced (members included)
    GroupListReplace,
    /// The members of existing groups have changed
    GroupMembersChanged,
}

/// Notification interface for models depending on the repository.
///
/// Every structural mutation is bracketed by one `begin_reset` /
/// `end_reset` pair. The repository snapshots its observer list before
/// each pass, so an observer may be dropped or deregistered while a
/// notification is in flight; observers must not call back into the
/// repository from within these methods.
pub trait ResetObserver {
    fn begin_reset(&self, kind: ResetKind);
    fn end_reset(&self, kind: ResetKind);
}

/// One package of the catalog plus its derived install state.
#[derive(Debug)]
pub struct PackageEntity {
    pub name: String,
    pub repository: String,
    pub version: String,
    pub description: String,
    /// Previously-installed version, set when the install is out of sync
    pub previous_version: String,
    /// No other installed package depends on this one
    pub required: bool,
    /// Tracked by the foreign (AUR-like) mechanism, not an official registry
    pub foreign: bool,
    pub explicitly_installed: bool,
    pub status: PackageStatus,
    depends_on: Option<Vec<usize>>,
    required_by: Option<Vec<usize>>,
}

impl PackageEntity {
    /// Build an entity from a parsed record.
    ///
    /// An `Outdated` hint is corrected to `Newer` when the
    /// previously-installed version actually orders after the registry
    /// version; the correction is applied once, here.
    pub(crate) fn from_record(
        record: PackageRecord,
        required: bool,
        foreign: bool,
        explicitly_installed: bool,
    ) -> Self {
        let status = if record.status == PackageStatus::Outdated
            && version::compare(&record.previous_version, &record.version) == Ordering::Greater
        {
            PackageStatus::Newer
        } else {
            record.status
        };
        Self {
            name: record.name,
            repository: record.repository,
            version: record.version,
            description: record.description,
            previous_version: record.previous_version,
            required,
            foreign,
            explicitly_installed,
            status,
            depends_on: None,
            required_by: None,
        }
    }

    pub fn installed(&self) -> bool {
        self.status.installed()
    }

    pub fn outdated(&self) -> bool {
        self.status.outdated(true)
    }

    /// Indices of the packages this one depends on, if fetched.
    pub fn depends_on(&self) -> Option<&[usize]> {
        self.depends_on.as_deref()
    }

    /// Indices of the packages depending on this one, if fetched.
    pub fn required_by(&self) -> Option<&[usize]> {
        self.required_by.as_deref()
    }

    pub(crate) fn set_depends_on(&mut self, indices: Vec<usize>) {
        self.depends_on = Some(indices);
    }

    pub(crate) fn add_required_by(&mut self, index: usize) {
        self.required_by.get_or_insert_with(Vec::new).push(index);
    }

    pub(crate) fn clear_edges(&mut self) {
        self.depends_on = None;
        self.required_by = None;
    }
}

/// A package group: a name plus a possibly-absent member list.
#[derive(Debug)]
pub struct GroupEntity {
    name: String,
    members: Option<Vec<usize>>,
}

/// Shared empty member list for uninitialized and invalidated groups.
static NO_MEMBERS: [usize; 0] = [];

impl GroupEntity {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            members: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member indices into the repository's package vector. Uninitialized
    /// and invalidated groups all answer with the shared empty list.
    pub fn members(&self) -> &[usize] {
        self.members.as_deref().unwrap_or(&NO_MEMBERS)
    }

    pub fn is_loaded(&self) -> bool {
        self.members.is_some()
    }

    /// Whether the current members match `names` by package name, in order.
    /// An unloaded group never matches.
    pub(crate) fn member_list_equals(&self, packages: &[PackageEntity], names: &[String]) -> bool {
        match &self.members {
            None => false,
            Some(members) => {
                members.len() == names.len()
                    && members
                        .iter()
                        .zip(names)
                        .all(|(&index, name)| packages[index].name == *name)
            }
        }
    }

    /// The group gets its own list the moment the first member arrives.
    pub(crate) fn add_member(&mut self, index: usize) {
        self.members.get_or_insert_with(Vec::new).push(index);
    }

    pub(crate) fn invalidate(&mut self) {
        self.members = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, version: &str, status: PackageStatus, previous: &str) -> PackageRecord {
        PackageRecord::new(name, "core", version, name, status, previous)
    }

    #[test]
    fn test_outdated_hint_survives_when_previous_is_older() {
        let entity = PackageEntity::from_record(
            record("bash", "5.2-2", PackageStatus::Outdated, "5.2-1"),
            true,
            false,
            true,
        );
        assert_eq!(entity.status, PackageStatus::Outdated);
    }

    #[test]
    fn test_outdated_hint_corrects_to_newer() {
        let entity = PackageEntity::from_record(
            record("bash", "5.2-1", PackageStatus::Outdated, "5.2-2"),
            true,
            false,
            true,
        );
        assert_eq!(entity.status, PackageStatus::Newer);
    }

    #[test]
    fn test_correction_only_applies_to_outdated_hint() {
        let entity = PackageEntity::from_record(
            record("bash", "5.2-1", PackageStatus::Installed, ""),
            true,
            false,
            false,
        );
        assert_eq!(entity.status, PackageStatus::Installed);
    }

    #[test]
    fn test_group_starts_unloaded_with_shared_empty_list() {
        let group = GroupEntity::new("base".to_string());
        assert!(!group.is_loaded());
        assert!(group.members().is_empty());
    }

    #[test]
    fn test_group_owns_list_after_first_member() {
        let mut group = GroupEntity::new("base".to_string());
        group.add_member(3);
        assert!(group.is_loaded());
        assert_eq!(group.members(), &[3]);

        group.invalidate();
        assert!(!group.is_loaded());
        assert!(group.members().is_empty());
    }
}
