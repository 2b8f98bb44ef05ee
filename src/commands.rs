// src/commands.rs

//! External command execution and the raw pacman queries
//!
//! `CommandRunner` is the seam between the core and the process
//! machinery; `SystemRunner` is the real implementation and tests
//! substitute scripted runners. `PacmanCommands` wraps the raw queries
//! the refresh flows need and delivers unparsed text: a failed or
//! empty-output invocation surfaces as an empty string after being
//! logged, never as a panic, and is retried only by the next scheduled
//! refresh.

use crate::error::{Error, Result};
use std::process::Command;
use tracing::warn;

/// Captured output of one external command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

/// Runs a command line and captures its output.
pub trait CommandRunner {
    /// Execute `program` with `args`. With `fixed_locale` the child runs
    /// under the C locale so its output stays machine-parsable.
    fn run(&self, program: &str, args: &[&str], fixed_locale: bool) -> Result<CommandOutput>;
}

/// The real process-spawning runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], fixed_locale: bool) -> Result<CommandOutput> {
        let mut command = Command::new(program);
        command.args(args);
        if fixed_locale {
            command
                .env("LANG", "C")
                .env("LC_MESSAGES", "C")
                .env("LC_ALL", "C");
        }
        let output = command
            .output()
            .map_err(|e| Error::Command(format!("failed to run {program}: {e}")))?;
        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        })
    }
}

/// The raw pacman queries, delivering unparsed text.
#[derive(Debug, Clone)]
pub struct PacmanCommands<R> {
    runner: R,
}

impl<R: CommandRunner> PacmanCommands<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn query(&self, args: &[&str]) -> String {
        match self.runner.run("pacman", args, true) {
            Ok(output) => {
                if !output.success {
                    warn!(?args, "pacman exited with failure");
                }
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            Err(error) => {
                warn!(%error, ?args, "could not run pacman");
                String::new()
            }
        }
    }

    /// All packages of all registries, installed or not (`-Ss`).
    pub fn package_list(&self) -> String {
        self.query(&["-Ss"])
    }

    /// Installed packages not found in any registry (`-Qm`).
    pub fn foreign_list(&self) -> String {
        self.query(&["-Qm"])
    }

    /// Detail blocks for the whitespace-separated `names` (`-Si`, or
    /// `-Qi` for installed packages). Names may use `registry/name`
    /// notation for the registry query.
    pub fn package_details(&self, names: &str, installed: bool) -> String {
        let flag = if installed { "-Qi" } else { "-Si" };
        let mut args = vec![flag];
        args.extend(names.split_whitespace());
        self.query(&args)
    }

    /// All distinct package groups (`-Spg`).
    pub fn group_list(&self) -> String {
        self.query(&["-Spg"])
    }

    /// The `group member` listing of one group (`-Spg <name>`).
    pub fn group_members(&self, group: &str) -> String {
        self.query(&["-Spg", group])
    }

    /// Explicitly installed package names (`-Qe`).
    pub fn explicit_list(&self) -> String {
        self.query(&["-Qe"])
    }

    /// Names no other installed package depends on (`-Qt`).
    pub fn unrequired_list(&self) -> String {
        self.query(&["-Qt"])
    }

    /// Synchronize the registry databases (`-Sy`).
    pub fn synchronize(&self) -> String {
        self.query(&["-Sy"])
    }
}
