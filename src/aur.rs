// src/aur.rs

//! Foreign-source (AUR) multiinfo handling
//!
//! The multiinfo endpoint answers with `{version, type, resultcount,
//! results: [{Name, Version, ...}]}`. The response is external data and
//! is validated defensively: a wrong version, type or result count
//! yields an empty map rather than an error, and entries missing a name
//! or version are skipped.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Multiinfo endpoint; package names are appended as `arg[]` parameters.
pub const AUR_RPC_URL: &str = "https://aur.archlinux.org/rpc.php?type=multiinfo";

#[derive(Debug, Deserialize)]
struct MultiInfo {
    #[serde(default)]
    version: Value,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    resultcount: i64,
    #[serde(default)]
    results: Vec<AurPackage>,
}

#[derive(Debug, Deserialize)]
struct AurPackage {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Version", default)]
    version: String,
}

/// Build the multiinfo request URL for `names`.
pub fn multiinfo_url<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut url = String::from(AUR_RPC_URL);
    for name in names {
        url.push_str("&arg%5B%5D=");
        url.push_str(name);
    }
    url
}

/// Parse a multiinfo response into a name-to-version map.
pub fn parse_multiinfo(raw: &str) -> HashMap<String, String> {
    let Ok(info) = serde_json::from_str::<MultiInfo>(raw) else {
        warn!("foreign package info is not valid JSON");
        return HashMap::new();
    };

    // Plausibility checks on the envelope.
    if !version_is_one(&info.version) || info.kind != "multiinfo" {
        warn!(version = %info.version, kind = %info.kind, "unexpected foreign package info envelope");
        return HashMap::new();
    }
    if info.results.len() as i64 != info.resultcount {
        warn!(
            resultcount = info.resultcount,
            results = info.results.len(),
            "foreign package info result count mismatch"
        );
        return HashMap::new();
    }

    info.results
        .into_iter()
        .filter(|package| !package.name.is_empty() && !package.version.is_empty())
        .map(|package| (package.name, package.version))
        .collect()
}

// The wire value is a number in the current endpoint but was a string
// historically; accept both.
fn version_is_one(value: &Value) -> bool {
    value.as_i64() == Some(1) || value.as_str() == Some("1")
}
