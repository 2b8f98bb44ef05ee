// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use paclens::TaskScheduler;
use paclens::cache::CacheDir;
use paclens::commands::{PacmanCommands, SystemRunner};
use paclens::fetch::HttpFetcher;
use paclens::records::DetailRecord;
use paclens::refresh::{self, Session};
use std::path::PathBuf;

const DEFAULT_NEWS_FEED: &str = "https://archlinux.org/feeds/news/";

#[derive(Parser)]
#[command(name = "paclens")]
#[command(author, version, about = "Package browser for pacman systems", long_about = None)]
struct Cli {
    /// Cache directory (default: paclens under the user cache dir)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the catalog and print its counts
    Refresh,
    /// Refresh and list packages, optionally of one group
    List {
        /// Group to list
        #[arg(short, long, default_value = "")]
        group: String,
    },
    /// List the package groups
    Groups,
    /// Show the details of one package
    Info {
        /// Package name
        name: String,
    },
    /// Synchronize the registry databases
    Sync,
    /// Fetch and print the distribution news feed
    News {
        #[arg(long, default_value = DEFAULT_NEWS_FEED)]
        url: String,
    },
}

fn cache_root(cli: &Cli) -> PathBuf {
    cli.cache_dir.clone().unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("paclens")
    })
}

/// Run the coordinator loop until the scheduler drains.
fn drain(scheduler: &TaskScheduler<Session>, session: &mut Session) {
    while scheduler.wait_task(session) {}
}

fn print_counts(session: &Session) {
    println!("Packages: {}", session.repo.count_total());
    println!("  installed: {}", session.repo.count_installed());
    println!("  outdated:  {}", session.repo.count_outdated(true));
    let registries: Vec<String> = session.repo.repo_names().iter().cloned().collect();
    println!("Registries: {}", registries.join(", "));
}

fn print_detail(detail: &DetailRecord) {
    println!("Name           : {}", detail.name);
    println!("Version        : {}", detail.version);
    if !detail.repository.is_empty() {
        println!("Repository     : {}", detail.repository);
    }
    println!("Description    : {}", detail.description);
    println!("URL            : {}", detail.url);
    println!("Licenses       : {}", detail.license);
    println!("Depends On     : {}", detail.depends_on);
    println!("Required By    : {}", detail.required_by);
    if let Some(build_date) = detail.build_date {
        println!("Build Date     : {build_date}");
    }
    println!("Download Size  : {:.2} KiB", detail.download_size);
    println!("Installed Size : {:.2} KiB", detail.installed_size);
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cache = CacheDir::new(cache_root(&cli))?;
    let pacman = PacmanCommands::new(SystemRunner);
    let scheduler = TaskScheduler::new();
    let mut session = Session::new();

    match cli.command {
        Some(Commands::Refresh) => {
            refresh::schedule_full_refresh(&scheduler, pacman, cache);
            drain(&scheduler, &mut session);
            print_counts(&session);
        }
        Some(Commands::List { group }) => {
            refresh::schedule_group_list_update(&scheduler, pacman.clone());
            refresh::schedule_package_list_update(&scheduler, pacman.clone());
            if !group.is_empty() {
                refresh::schedule_group_members_update(&scheduler, pacman, group.clone());
            }
            drain(&scheduler, &mut session);
            for package in session.repo.packages_in_group(&group) {
                println!(
                    "{}/{} {} [{}]",
                    package.repository, package.name, package.version, package.status
                );
            }
        }
        Some(Commands::Groups) => {
            refresh::schedule_group_list_update(&scheduler, pacman);
            drain(&scheduler, &mut session);
            for group in session.repo.groups() {
                println!("{}", group.name());
            }
        }
        Some(Commands::Info { name }) => {
            refresh::schedule_package_list_update(&scheduler, pacman.clone());
            drain(&scheduler, &mut session);
            let (repository, installed) = match session.repo.first_by_name(&name) {
                Some(package) => (package.repository.clone(), package.installed()),
                None => (String::new(), false),
            };
            refresh::schedule_package_info_update(
                &scheduler,
                pacman,
                name.clone(),
                repository,
                installed,
            );
            drain(&scheduler, &mut session);
            match &session.detail {
                Some(detail) => print_detail(detail),
                None => println!("No package called '{name}' was found"),
            }
        }
        Some(Commands::Sync) => {
            refresh::schedule_repo_sync(&scheduler, pacman);
            drain(&scheduler, &mut session);
            println!("Registry databases synchronized");
        }
        Some(Commands::News { url }) => {
            refresh::schedule_news_update(&scheduler, HttpFetcher::new(), cache, url);
            drain(&scheduler, &mut session);
            match &session.news {
                Some(news) => println!("{news}"),
                None => println!("No distribution news available"),
            }
        }
        None => {
            println!("paclens v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'paclens --help' for usage information");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_dir_override_wins() {
        let cli = Cli {
            cache_dir: Some(PathBuf::from("/tmp/paclens-test")),
            command: None,
        };
        assert_eq!(cache_root(&cli), PathBuf::from("/tmp/paclens-test"));
    }

    #[test]
    fn test_cli_parses_list_with_group() {
        let cli = Cli::try_parse_from(["paclens", "list", "--group", "xfce4"]).unwrap();
        match cli.command {
            Some(Commands::List { group }) => assert_eq!(group, "xfce4"),
            _ => panic!("expected the list subcommand"),
        }
    }

    #[test]
    fn test_cli_news_has_default_feed() {
        let cli = Cli::try_parse_from(["paclens", "news"]).unwrap();
        match cli.command {
            Some(Commands::News { url }) => assert_eq!(url, DEFAULT_NEWS_FEED),
            _ => panic!("expected the news subcommand"),
        }
    }
}
