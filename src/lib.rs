// src/lib.rs

//! Paclens — package-browser core for pacman systems
//!
//! Keeps an in-memory package catalog consistent while background
//! refreshes run concurrently with user interaction.
//!
//! # Architecture
//!
//! - One repository owns the package/group graph and notifies dependents
//!   of structural changes through a begin/end reset protocol
//! - One sequential scheduler serializes all long-running work behind a
//!   dedicated worker: stage-1 fetches and parses off-thread, stage-2
//!   applies and notifies on the coordinator thread
//! - Install status is derived with the package manager's own version
//!   ordering, at entity construction only
//! - The external tool, the HTTP fetcher and the cache directory sit
//!   behind thin seams so flows are testable without a live system

pub mod aur;
pub mod cache;
pub mod commands;
mod error;
pub mod fetch;
pub mod parser;
pub mod records;
pub mod refresh;
pub mod repo;
pub mod scheduler;
pub mod version;

pub use error::{Error, Result};
pub use records::{DetailRecord, PackageRecord, PackageStatus};
pub use refresh::Session;
pub use repo::{
    FOREIGN_REPOSITORY, GroupEntity, PackageEntity, Repository, ResetKind, ResetObserver,
};
pub use scheduler::{InsertMode, Stage2, TaskKind, TaskScheduler};
