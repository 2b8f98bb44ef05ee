// src/cache.rs

//! On-disk cache directory
//!
//! Holds the foreign-package-info file and the distribution news file.
//! Both are opaque blobs to the core and are only ever replaced
//! atomically: content goes to a temp file in the same directory first
//! and is renamed over the old file, so readers see either the previous
//! or the new content, never a partial write.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// File holding the cached foreign-source multiinfo response.
pub const FOREIGN_INFO_FILE: &str = "aur_info.json";

/// File holding the cached distribution news feed.
pub const NEWS_FILE: &str = "distro_news.xml";

#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    /// Open (creating if needed) the cache directory at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    pub fn exists(&self, file: &str) -> bool {
        self.path(file).exists()
    }

    /// Cached content of `file`, or `None` when absent or unreadable.
    pub fn read(&self, file: &str) -> Option<String> {
        fs::read_to_string(self.path(file)).ok()
    }

    /// Atomically replace `file` with `contents`.
    pub fn write_atomic(&self, file: &str, contents: &[u8]) -> Result<()> {
        self.write_atomic_with(file, |dest| {
            dest.write_all(contents)?;
            Ok(())
        })
    }

    /// Atomically replace `file` with whatever `fill` writes. When `fill`
    /// fails the temp file is discarded and the old content stays intact.
    pub fn write_atomic_with<F>(&self, file: &str, fill: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        let mut temp = NamedTempFile::new_in(&self.root)?;
        fill(&mut temp)?;
        temp.persist(self.path(file))
            .map_err(|e| Error::Cache(e.to_string()))?;
        debug!(file, cache = %self.root.display(), "cache file replaced");
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
