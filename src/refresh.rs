// src/refresh.rs

//! Two-phase refresh flows
//!
//! Each flow schedules one task: stage-1 invokes the external tool (and
//! the fetcher where needed) and parses its output on the worker thread,
//! stage-2 applies the result to the session on the coordinator thread.
//! A `false` return from any of these means the request was superseded
//! or deduplicated, which callers treat as normal.

use crate::aur;
use crate::cache::{self, CacheDir};
use crate::commands::{CommandRunner, PacmanCommands};
use crate::fetch::Fetcher;
use crate::parser;
use crate::records::{DetailRecord, PackageRecord};
use crate::repo::Repository;
use crate::scheduler::{InsertMode, TaskKind, TaskScheduler};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Coordinator-owned state handed to every stage-2 continuation.
#[derive(Default)]
pub struct Session {
    pub repo: Repository,
    /// Latest distribution news blob, as cached
    pub news: Option<String>,
    /// Latest single-package detail lookup
    pub detail: Option<DetailRecord>,
    /// Set by the shutdown task
    pub quit: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}

type Scheduler = TaskScheduler<Session>;

/// Refresh the group list.
pub fn schedule_group_list_update<R>(scheduler: &Scheduler, pacman: PacmanCommands<R>) -> bool
where
    R: CommandRunner + Send + 'static,
{
    scheduler.schedule(
        InsertMode::RemoveFirstOfTypePushBack,
        TaskKind::UpdateGroupList,
        move || {
            let groups = parser::parse_group_list(&pacman.group_list());
            Box::new(move |session: &mut Session| session.repo.set_groups(&groups))
        },
    )
}

/// Rebuild the whole package catalog from the registry listing.
pub fn schedule_package_list_update<R>(scheduler: &Scheduler, pacman: PacmanCommands<R>) -> bool
where
    R: CommandRunner + Send + 'static,
{
    scheduler.schedule(
        InsertMode::RemoveFirstOfTypePushBack,
        TaskKind::UpdatePackageList,
        move || {
            let records = parser::parse_package_list(&pacman.package_list());
            let unrequired = parser::parse_name_set(&pacman.unrequired_list());
            let explicit = parser::parse_name_set(&pacman.explicit_list());
            Box::new(move |session: &mut Session| {
                session.repo.replace_packages(records, &unrequired, &explicit);
            })
        },
    )
}

/// Refresh the foreign-managed slice of the catalog, using whatever
/// foreign-source info is cached.
pub fn schedule_foreign_list_update<R>(
    scheduler: &Scheduler,
    pacman: PacmanCommands<R>,
    cache: CacheDir,
) -> bool
where
    R: CommandRunner + Send + 'static,
{
    scheduler.schedule(
        InsertMode::RemoveFirstOfTypePushBack,
        TaskKind::UpdateForeignList,
        move || {
            let (records, unrequired, foreign_versions) = gather_foreign(&pacman, &cache);
            Box::new(move |session: &mut Session| {
                session
                    .repo
                    .merge_foreign_packages(records, &unrequired, &foreign_versions);
            })
        },
    )
}

/// Download fresh foreign-source info into the cache, then refresh the
/// foreign slice of the catalog from it. Only one such task may be
/// queued or running at a time.
pub fn schedule_foreign_info_fetch<R, F>(
    scheduler: &Scheduler,
    pacman: PacmanCommands<R>,
    fetcher: F,
    cache: CacheDir,
) -> bool
where
    R: CommandRunner + Send + 'static,
    F: Fetcher + Send + 'static,
{
    scheduler.schedule(
        InsertMode::OnlyOne,
        TaskKind::FetchForeignInfo,
        move || {
            let foreign = parser::parse_foreign_list(&pacman.foreign_list());
            let url = aur::multiinfo_url(foreign.iter().map(|(name, _)| name.as_str()));
            let fetched = cache
                .write_atomic_with(cache::FOREIGN_INFO_FILE, |dest| fetcher.fetch_to(&url, dest));
            if let Err(error) = fetched {
                warn!(%error, "could not refresh foreign package info");
            }
            let (records, unrequired, foreign_versions) = gather_foreign(&pacman, &cache);
            Box::new(move |session: &mut Session| {
                session
                    .repo
                    .merge_foreign_packages(records, &unrequired, &foreign_versions);
            })
        },
    )
}

/// Refresh the member list of one group.
pub fn schedule_group_members_update<R>(
    scheduler: &Scheduler,
    pacman: PacmanCommands<R>,
    group: String,
) -> bool
where
    R: CommandRunner + Send + 'static,
{
    scheduler.schedule(
        InsertMode::RemoveFirstOfTypePushBack,
        TaskKind::UpdateGroupMembers,
        move || {
            let members = parser::parse_group_members(&pacman.group_members(&group));
            Box::new(move |session: &mut Session| {
                // An unknown group is reported by the repository itself.
                let _ = session.repo.set_group_members(&group, &members);
            })
        },
    )
}

/// Look up the detail record of one package.
pub fn schedule_package_info_update<R>(
    scheduler: &Scheduler,
    pacman: PacmanCommands<R>,
    name: String,
    repository: String,
    installed: bool,
) -> bool
where
    R: CommandRunner + Send + 'static,
{
    scheduler.schedule(
        InsertMode::RemoveFirstOfTypePushBack,
        TaskKind::UpdatePackageInfo,
        move || {
            let query = if installed || repository.is_empty() {
                name
            } else {
                format!("{repository}/{name}")
            };
            let details = parser::parse_details(&pacman.package_details(&query, installed));
            Box::new(move |session: &mut Session| session.detail = details.into_iter().next())
        },
    )
}

/// Download the distribution news feed into the cache. A failed download
/// keeps the cached copy, which is still published to the session.
pub fn schedule_news_update<F>(
    scheduler: &Scheduler,
    fetcher: F,
    cache: CacheDir,
    url: String,
) -> bool
where
    F: Fetcher + Send + 'static,
{
    scheduler.schedule(
        InsertMode::RemoveFirstOfTypeOverwrite,
        TaskKind::UpdateNews,
        move || {
            let fetched =
                cache.write_atomic_with(cache::NEWS_FILE, |dest| fetcher.fetch_to(&url, dest));
            if let Err(error) = fetched {
                warn!(%error, "could not refresh distribution news, keeping cached copy");
            }
            let news = cache.read(cache::NEWS_FILE);
            Box::new(move |session: &mut Session| session.news = news)
        },
    )
}

/// Synchronize the registry databases. Only one sync may be queued or
/// running at a time.
pub fn schedule_repo_sync<R>(scheduler: &Scheduler, pacman: PacmanCommands<R>) -> bool
where
    R: CommandRunner + Send + 'static,
{
    scheduler.schedule(
        InsertMode::OnlyOne,
        TaskKind::SyncRepositories,
        move || {
            pacman.synchronize();
            Box::new(|_session: &mut Session| debug!("registry databases synchronized"))
        },
    )
}

/// Schedule the terminal shutdown task; its stage-2 asks the session to
/// quit once everything queued before it has completed.
pub fn schedule_shutdown(scheduler: &Scheduler) -> bool {
    scheduler.schedule(InsertMode::PushBack, TaskKind::Shutdown, || {
        Box::new(|session: &mut Session| session.quit = true)
    })
}

/// Group list, package list and foreign list in one go.
pub fn schedule_full_refresh<R>(
    scheduler: &Scheduler,
    pacman: PacmanCommands<R>,
    cache: CacheDir,
) -> bool
where
    R: CommandRunner + Clone + Send + 'static,
{
    let groups = schedule_group_list_update(scheduler, pacman.clone());
    let packages = schedule_package_list_update(scheduler, pacman.clone());
    let foreign = schedule_foreign_list_update(scheduler, pacman, cache);
    groups && packages && foreign
}

fn gather_foreign<R: CommandRunner>(
    pacman: &PacmanCommands<R>,
    cache: &CacheDir,
) -> (
    Vec<PackageRecord>,
    HashSet<String>,
    HashMap<String, String>,
) {
    let foreign = parser::parse_foreign_list(&pacman.foreign_list());
    let records = if foreign.is_empty() {
        Vec::new()
    } else {
        let names = foreign
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        parser::records_from_details(parser::parse_details(&pacman.package_details(&names, true)))
    };
    let unrequired = parser::parse_name_set(&pacman.unrequired_list());
    let foreign_versions = cache
        .read(cache::FOREIGN_INFO_FILE)
        .map(|raw| aur::parse_multiinfo(&raw))
        .unwrap_or_default();
    (records, unrequired, foreign_versions)
}
