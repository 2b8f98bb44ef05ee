// src/fetch.rs

//! HTTP-fetch-to-writer seam
//!
//! The refresh flows only need "download this URL into that file", so
//! the seam is a single trait; `HttpFetcher` is the real blocking
//! implementation and tests substitute canned fetchers.

use crate::error::{Error, Result};
use std::io::Write;

/// Downloads a URL into a writer.
pub trait Fetcher {
    fn fetch_to(&self, url: &str, dest: &mut dyn Write) -> Result<()>;
}

/// Blocking HTTP fetcher.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_to(&self, url: &str, dest: &mut dyn Write) -> Result<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Fetch(format!("{url}: HTTP {}", response.status())));
        }
        response
            .copy_to(dest)
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(())
    }
}
