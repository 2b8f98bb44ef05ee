// src/repo/mod.rs

//! Central in-memory storage for catalog data
//!
//! The repository owns the package and group entities, derives install
//! status when entities are built, and notifies registered dependents of
//! structural changes through the begin/end reset protocol. The package
//! vector holds exactly one logical generation at a time and is always
//! kept sorted by name, which group membership resolution relies on for
//! binary lookup.
//!
//! All mutation happens on the coordinator thread (refresh results are
//! applied by scheduler stage-2 continuations), so no internal locking
//! is needed.

mod entity;

pub use entity::{GroupEntity, PackageEntity, ResetKind, ResetObserver};

use crate::error::{Error, Result};
use crate::records::PackageRecord;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::{Rc, Weak};
use tracing::{debug, error};

/// Registry name under which foreign-managed packages are filed.
pub const FOREIGN_REPOSITORY: &str = "aur";

/// Central data storage for package data.
#[derive(Default)]
pub struct Repository {
    observers: Vec<Weak<dyn ResetObserver>>,
    /// All packages, sorted by name
    packages: Vec<PackageEntity>,
    groups: Vec<GroupEntity>,
    /// Distinct registry names, derived from the package vector
    repo_names: BTreeSet<String>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dependent for reset notifications. The repository holds
    /// only a weak reference; a dropped dependent is skipped.
    pub fn register_observer<O>(&mut self, observer: &Rc<O>)
    where
        O: ResetObserver + 'static,
    {
        self.observers.retain(|weak| weak.strong_count() > 0);
        let rc: Rc<dyn ResetObserver> = observer.clone();
        let weak: Weak<dyn ResetObserver> = Rc::downgrade(&rc);
        self.observers.push(weak);
    }

    pub fn deregister_observer<O>(&mut self, observer: &Rc<O>)
    where
        O: ResetObserver + 'static,
    {
        let target = Rc::as_ptr(observer) as *const ();
        self.observers
            .retain(|weak| Weak::as_ptr(weak) as *const () != target);
    }

    fn begin_reset(&self, kind: ResetKind) {
        // Snapshot so deregistration mid-notification stays safe.
        for weak in self.observers.clone() {
            if let Some(observer) = weak.upgrade() {
                observer.begin_reset(kind);
            }
        }
    }

    fn end_reset(&self, kind: ResetKind) {
        for weak in self.observers.clone() {
            if let Some(observer) = weak.upgrade() {
                observer.end_reset(kind);
            }
        }
    }

    /// Full rebuild of the package vector from a fresh registry listing.
    ///
    /// `unrequired` are the names no other installed package depends on,
    /// `explicit` the explicitly-installed names. Group member caches and
    /// dependency edges are invalidated, the vector is re-sorted and the
    /// registry-name set re-derived.
    pub fn replace_packages(
        &mut self,
        records: Vec<PackageRecord>,
        unrequired: &HashSet<String>,
        explicit: &HashSet<String>,
    ) {
        debug!(count = records.len(), "replacing package list");
        self.begin_reset(ResetKind::FullReplace);

        for group in &mut self.groups {
            group.invalidate();
        }
        self.packages = records
            .into_iter()
            .map(|record| {
                let required = !unrequired.contains(&record.name);
                let explicitly_installed = explicit.contains(&record.name);
                PackageEntity::from_record(record, required, false, explicitly_installed)
            })
            .collect();
        self.packages.sort_by(|a, b| a.name.cmp(&b.name));
        self.recompute_repo_names();

        self.end_reset(ResetKind::FullReplace);
    }

    /// Replace the foreign-managed slice of the catalog.
    ///
    /// Existing foreign entities are dropped. Each incoming record with a
    /// matching foreign-source version is filed under the foreign
    /// registry name; when the versions differ the record becomes
    /// `ForeignOutdated`, keeping the installed version as the previous
    /// one. Foreign entities are always explicitly installed.
    pub fn merge_foreign_packages(
        &mut self,
        records: Vec<PackageRecord>,
        unrequired: &HashSet<String>,
        foreign_versions: &HashMap<String, String>,
    ) {
        debug!(count = records.len(), "merging foreign package list");
        self.begin_reset(ResetKind::FullReplace);

        self.packages.retain(|package| !package.foreign);
        for mut record in records {
            if let Some(foreign_version) = foreign_versions.get(&record.name) {
                record.repository = FOREIGN_REPOSITORY.to_string();
                if record.version != *foreign_version {
                    record.previous_version = record.version;
                    record.version = foreign_version.clone();
                    record.status = crate::records::PackageStatus::ForeignOutdated;
                }
            }
            let required = !unrequired.contains(&record.name);
            self.packages
                .push(PackageEntity::from_record(record, required, true, true));
        }
        self.packages.sort_by(|a, b| a.name.cmp(&b.name));
        // The resort shifted indices, so cached links are stale.
        for package in &mut self.packages {
            package.clear_edges();
        }
        for group in &mut self.groups {
            group.invalidate();
        }
        self.recompute_repo_names();

        self.end_reset(ResetKind::FullReplace);
    }

    /// Replace the group list unless the ordered names already match.
    pub fn set_groups(&mut self, names: &[String]) {
        if self.group_list_equals(names) {
            return;
        }
        self.begin_reset(ResetKind::GroupListReplace);
        self.groups = names
            .iter()
            .map(|name| GroupEntity::new(name.clone()))
            .collect();
        self.end_reset(ResetKind::GroupListReplace);
    }

    /// Replace the member list of one group unless it already matches.
    ///
    /// Member names are resolved against the sorted package vector; the
    /// first non-foreign match wins, unresolvable names are skipped.
    /// Naming a group the repository does not know is a contract
    /// violation between core components: it is reported and rejected
    /// without touching existing state.
    pub fn set_group_members(&mut self, group: &str, members: &[String]) -> Result<()> {
        let Some(group_index) = self.groups.iter().position(|g| g.name() == group) else {
            error!(group, "group is not known to the repository");
            return Err(Error::UnknownGroup(group.to_string()));
        };
        if self.groups[group_index].member_list_equals(&self.packages, members) {
            return Ok(());
        }

        self.begin_reset(ResetKind::GroupMembersChanged);
        let indices: Vec<usize> = members
            .iter()
            .filter_map(|name| self.find_first_non_foreign(name))
            .collect();
        let group_entity = &mut self.groups[group_index];
        group_entity.invalidate();
        for index in indices {
            group_entity.add_member(index);
        }
        self.end_reset(ResetKind::GroupMembersChanged);
        Ok(())
    }

    /// Attach dependency edges fetched for one package: forward edges on
    /// the package itself, reverse edges on every resolvable target.
    /// Edges are wholesale-invalidated by the next rebuild.
    pub fn set_dependency_edges(&mut self, name: &str, depends_on: &[String]) -> Result<()> {
        let Some(package_index) = self.first_index_by_name(name) else {
            error!(package = name, "package is not known to the repository");
            return Err(Error::UnknownPackage(name.to_string()));
        };
        let indices: Vec<usize> = depends_on
            .iter()
            .filter_map(|dep| self.first_index_by_name(dep))
            .collect();
        for &dep_index in &indices {
            self.packages[dep_index].add_required_by(package_index);
        }
        self.packages[package_index].set_depends_on(indices);
        Ok(())
    }

    /// The full catalog, sorted by name.
    pub fn packages(&self) -> &[PackageEntity] {
        &self.packages
    }

    /// Packages of one group, defaulting to the full catalog when the
    /// group is absent, unknown or its members have not been loaded yet.
    pub fn packages_in_group(&self, group: &str) -> Vec<&PackageEntity> {
        if !group.is_empty()
            && let Some(entity) = self.groups.iter().find(|g| g.name() == group)
            && entity.is_loaded()
        {
            return entity
                .members()
                .iter()
                .map(|&index| &self.packages[index])
                .collect();
        }
        self.packages.iter().collect()
    }

    pub fn first_by_name(&self, name: &str) -> Option<&PackageEntity> {
        self.first_index_by_name(name)
            .map(|index| &self.packages[index])
    }

    pub fn groups(&self) -> &[GroupEntity] {
        &self.groups
    }

    /// Distinct registry names present in the catalog.
    pub fn repo_names(&self) -> &BTreeSet<String> {
        &self.repo_names
    }

    pub fn count_total(&self) -> usize {
        self.packages.len()
    }

    pub fn count_installed(&self) -> usize {
        self.packages.iter().filter(|p| p.installed()).count()
    }

    /// Number of outdated packages; `newer_counts` controls whether
    /// locally-newer installs are included.
    pub fn count_outdated(&self, newer_counts: bool) -> usize {
        self.packages
            .iter()
            .filter(|p| p.status.outdated(newer_counts))
            .count()
    }

    fn group_list_equals(&self, names: &[String]) -> bool {
        self.groups.len() == names.len()
            && self.groups.iter().zip(names).all(|(g, name)| g.name() == name)
    }

    /// Leftmost package of that name, via binary search.
    fn first_index_by_name(&self, name: &str) -> Option<usize> {
        let start = self.packages.partition_point(|p| p.name.as_str() < name);
        (start < self.packages.len() && self.packages[start].name == name).then_some(start)
    }

    /// Leftmost non-foreign package of that name. Foreign packages are
    /// never group members.
    fn find_first_non_foreign(&self, name: &str) -> Option<usize> {
        let mut index = self.packages.partition_point(|p| p.name.as_str() < name);
        while index < self.packages.len() && self.packages[index].name == name {
            if !self.packages[index].foreign {
                return Some(index);
            }
            index += 1;
        }
        None
    }

    fn recompute_repo_names(&mut self) {
        self.repo_names = self
            .packages
            .iter()
            .filter(|p| !p.repository.is_empty())
            .map(|p| p.repository.clone())
            .collect();
    }
}
