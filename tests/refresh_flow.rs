// tests/refresh_flow.rs

//! End-to-end refresh flows: scripted tool output driven through the
//! scheduler into the repository, with reset notifications observed.

use paclens::cache::{self, CacheDir};
use paclens::commands::{CommandOutput, CommandRunner, PacmanCommands};
use paclens::fetch::Fetcher;
use paclens::records::PackageStatus;
use paclens::refresh::{self, Session};
use paclens::repo::{ResetKind, ResetObserver};
use paclens::{FOREIGN_REPOSITORY, Result, TaskScheduler};
use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;

const PACKAGE_LIST: &str = "\
core/bash 5.2.037-1 [installed]
    the bourne again shell
extra/thunar 4.20.0-1 [installed: 4.18.0-1]
    file manager
community/zsh 5.9-5
    the z shell
";

const GROUP_LIST: &str = "xfce4\nbase\nxfce4\n";
const GROUP_MEMBERS: &str = "xfce4 thunar\n";
const FOREIGN_LIST: &str = "yay 12.3.4-1\n";
const FOREIGN_DETAILS: &str = "\
Name            : yay
Version         : 12.3.4-1
Description     : an AUR helper
";
const EXPLICIT: &str = "bash\nyay\n";
const UNREQUIRED: &str = "zsh\nyay\n";

/// Answers every pacman query from the fixtures above.
#[derive(Clone)]
struct ToolScript;

impl CommandRunner for ToolScript {
    fn run(&self, program: &str, args: &[&str], _fixed_locale: bool) -> Result<CommandOutput> {
        assert_eq!(program, "pacman");
        let reply = match args.first().copied() {
            Some("-Ss") => PACKAGE_LIST,
            Some("-Qm") => FOREIGN_LIST,
            Some("-Qi") => FOREIGN_DETAILS,
            Some("-Spg") if args.len() == 1 => GROUP_LIST,
            Some("-Spg") => GROUP_MEMBERS,
            Some("-Qe") => EXPLICIT,
            Some("-Qt") => UNREQUIRED,
            _ => "",
        };
        Ok(CommandOutput {
            stdout: reply.as_bytes().to_vec(),
            stderr: Vec::new(),
            success: true,
        })
    }
}

#[derive(Default)]
struct ResetCounter {
    begins: Cell<usize>,
    ends: Cell<usize>,
}

impl ResetObserver for ResetCounter {
    fn begin_reset(&self, _kind: ResetKind) {
        self.begins.set(self.begins.get() + 1);
    }

    fn end_reset(&self, _kind: ResetKind) {
        self.ends.set(self.ends.get() + 1);
    }
}

struct CannedFetcher(&'static str);

impl Fetcher for CannedFetcher {
    fn fetch_to(&self, _url: &str, dest: &mut dyn Write) -> Result<()> {
        dest.write_all(self.0.as_bytes())?;
        Ok(())
    }
}

#[test]
fn test_full_refresh_populates_the_repository() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CacheDir::new(dir.path()).unwrap();
    let pacman = PacmanCommands::new(ToolScript);
    let scheduler = TaskScheduler::new();
    let mut session = Session::new();

    let observer = Rc::new(ResetCounter::default());
    session.repo.register_observer(&observer);

    assert!(refresh::schedule_full_refresh(&scheduler, pacman, cache));
    assert!(scheduler.has_tasks());
    while scheduler.wait_task(&mut session) {}
    assert!(!scheduler.has_tasks());

    // Groups, packages and foreign merge: three bracketed resets.
    assert_eq!(observer.begins.get(), 3);
    assert_eq!(observer.ends.get(), 3);

    let repo = &session.repo;
    assert_eq!(repo.count_total(), 4);
    assert_eq!(repo.count_installed(), 3);
    assert_eq!(repo.count_outdated(true), 1);

    let bash = repo.first_by_name("bash").unwrap();
    assert_eq!(bash.status, PackageStatus::Installed);
    assert!(bash.explicitly_installed);
    assert!(bash.required);
    assert_eq!(bash.description, "bash the bourne again shell");

    let zsh = repo.first_by_name("zsh").unwrap();
    assert_eq!(zsh.status, PackageStatus::NotInstalled);
    assert!(!zsh.required);

    let thunar = repo.first_by_name("thunar").unwrap();
    assert_eq!(thunar.status, PackageStatus::Outdated);
    assert_eq!(thunar.previous_version, "4.18.0-1");

    let yay = repo.first_by_name("yay").unwrap();
    assert!(yay.foreign);
    assert!(yay.explicitly_installed);
    assert!(!yay.required);
    assert_eq!(yay.status, PackageStatus::Foreign);
    assert_eq!(yay.description, "yay an AUR helper");

    let registries: Vec<String> = repo.repo_names().iter().cloned().collect();
    assert_eq!(registries, ["community", "core", "extra"]);
}

#[test]
fn test_group_members_flow_resolves_against_catalog() {
    let pacman = PacmanCommands::new(ToolScript);
    let scheduler = TaskScheduler::new();
    let mut session = Session::new();

    refresh::schedule_group_list_update(&scheduler, pacman.clone());
    refresh::schedule_package_list_update(&scheduler, pacman.clone());
    refresh::schedule_group_members_update(&scheduler, pacman, "xfce4".to_string());
    while scheduler.wait_task(&mut session) {}

    let group_names: Vec<&str> = session.repo.groups().iter().map(|g| g.name()).collect();
    assert_eq!(group_names, ["base", "xfce4"]);

    let members = session.repo.packages_in_group("xfce4");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "thunar");

    // The base group was never loaded and falls back to the full list.
    assert_eq!(session.repo.packages_in_group("base").len(), 3);
}

#[test]
fn test_foreign_info_fetch_marks_outdated_foreign_packages() {
    const MULTIINFO: &str = r#"{"version":1,"type":"multiinfo","resultcount":1,"results":[{"Name":"yay","Version":"12.3.5-1"}]}"#;

    let dir = tempfile::tempdir().unwrap();
    let cache = CacheDir::new(dir.path()).unwrap();
    let pacman = PacmanCommands::new(ToolScript);
    let scheduler = TaskScheduler::new();
    let mut session = Session::new();

    assert!(refresh::schedule_foreign_info_fetch(
        &scheduler,
        pacman.clone(),
        CannedFetcher(MULTIINFO),
        cache.clone(),
    ));
    // A second fetch while one is queued or running is dropped.
    assert!(!refresh::schedule_foreign_info_fetch(
        &scheduler,
        pacman,
        CannedFetcher(MULTIINFO),
        cache.clone(),
    ));
    while scheduler.wait_task(&mut session) {}

    assert_eq!(cache.read(cache::FOREIGN_INFO_FILE).unwrap(), MULTIINFO);

    let yay = session.repo.first_by_name("yay").unwrap();
    assert_eq!(yay.repository, FOREIGN_REPOSITORY);
    assert_eq!(yay.status, PackageStatus::ForeignOutdated);
    assert_eq!(yay.version, "12.3.5-1");
    assert_eq!(yay.previous_version, "12.3.4-1");
}
