// src/error.rs

//! Crate-wide error type and result alias

use thiserror::Error;

/// Errors surfaced by the package-browser core
#[derive(Error, Debug)]
pub enum Error {
    /// External command could not be spawned or waited on
    #[error("Failed to run external command: {0}")]
    Command(String),

    /// HTTP download failed
    #[error("HTTP fetch failed: {0}")]
    Fetch(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Atomic cache-file replacement failed
    #[error("Cache write failed: {0}")]
    Cache(String),

    /// A group name the repository has never been told about
    #[error("Unknown package group '{0}'")]
    UnknownGroup(String),

    /// A package name the repository has never been told about
    #[error("Unknown package '{0}'")]
    UnknownPackage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
