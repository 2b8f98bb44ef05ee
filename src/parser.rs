// src/parser.rs

//! Parsers for the package tool's text output
//!
//! Two main modes: the line-oriented registry listing (one unindented
//! header line per package, indented description continuations) and the
//! blank-line-delimited detail listing (`Key : Value` blocks). The
//! auxiliary parsers cover the group, member and name-set listings.
//!
//! All functions are pure over `&str`; malformed lines are skipped and
//! malformed field values fall back to safe defaults rather than failing
//! the whole listing.

use crate::records::{DetailRecord, PackageRecord, PackageStatus};
use chrono::NaiveDateTime;
use std::collections::HashSet;

/// C-locale timestamp as printed by the tool, e.g. `Thu Jun  6 10:03:41 2016`.
const DATE_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

struct Header {
    name: String,
    repository: String,
    version: String,
    previous_version: String,
    status: PackageStatus,
}

impl Header {
    fn into_record(self, description: &str) -> PackageRecord {
        // The description is contractually prefixed with the package name.
        let description = if description.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, description)
        };
        PackageRecord {
            name: self.name,
            repository: self.repository,
            version: self.version,
            description,
            previous_version: self.previous_version,
            status: self.status,
        }
    }
}

fn parse_header_line(line: &str) -> Header {
    // `repository/name version ... [installed[: oldversion]]`
    let mut parts = line.split(' ');
    let repo_name = parts.next().unwrap_or_default();
    let version = parts.next().unwrap_or_default().to_string();
    let (repository, name) = match repo_name.split_once('/') {
        Some((repository, name)) => (repository.to_string(), name.to_string()),
        None => (String::new(), repo_name.to_string()),
    };

    let (status, previous_version) = if let Some(pos) = line.find("[installed:") {
        let rest = &line[pos + "[installed:".len()..];
        (
            PackageStatus::Outdated,
            rest.replace(']', "").trim().to_string(),
        )
    } else if line.contains("[installed]") {
        (PackageStatus::Installed, String::new())
    } else {
        (PackageStatus::NotInstalled, String::new())
    };

    Header {
        name,
        repository,
        version,
        previous_version,
        status,
    }
}

/// Parse the registry package listing.
///
/// A line not starting with whitespace begins a new record; indented
/// lines are description continuations, concatenated trimmed with no
/// joiner. The record in progress is flushed by the next header line and
/// the final record at end of input.
pub fn parse_package_list(input: &str) -> Vec<PackageRecord> {
    let mut records = Vec::new();
    let mut current: Option<Header> = None;
    let mut description = String::new();

    for line in input.lines() {
        if line.is_empty() {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            if let Some(header) = current.take() {
                records.push(header.into_record(&description));
            }
            description.clear();
            current = Some(parse_header_line(line));
        } else if current.is_some() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                description.push(' ');
            } else {
                description.push_str(trimmed);
            }
        }
    }
    if let Some(header) = current.take() {
        records.push(header.into_record(&description));
    }
    records
}

/// Parse the detail listing into one record per blank-line-delimited block.
pub fn parse_details(input: &str) -> Vec<DetailRecord> {
    input
        .split("\n\n")
        .filter(|block| !block.trim().is_empty())
        .map(parse_detail_block)
        .collect()
}

fn parse_detail_block(info: &str) -> DetailRecord {
    DetailRecord {
        name: extract_field(info, "Name"),
        repository: extract_field(info, "Repository"),
        version: extract_field(info, "Version"),
        // "URL" would also match inside a longer value, so anchor it.
        url: extract_field(info, "\nURL"),
        license: extract_field(info, "Licenses"),
        group: extract_field(info, "Groups"),
        provides: extract_field(info, "Provides"),
        required_by: extract_field(info, "Required By"),
        optional_for: extract_field(info, "Optional For"),
        depends_on: extract_field(info, "Depends On"),
        opt_depends: extract_opt_depends(info),
        conflicts_with: extract_field(info, "Conflicts With"),
        replaces: extract_field(info, "Replaces"),
        packager: extract_field(info, "Packager"),
        arch: extract_field(info, "Architecture"),
        description: extract_field(info, "Description"),
        build_date: parse_date(&extract_field(info, "Build Date")),
        download_size: parse_size(&extract_field(info, "Download Size")),
        installed_size: parse_size(&extract_field(info, "Installed Size")),
    }
}

/// Extract one field value from a detail block: the text between the
/// colon following `label` and the next newline, trimmed. Empty when the
/// label is absent.
pub fn extract_field(info: &str, label: &str) -> String {
    let Some(pos) = info.find(label) else {
        return String::new();
    };
    let after = &info[pos + label.len()..];
    let Some(colon) = after.find(':') else {
        return String::new();
    };
    let value = &after[colon + 1..];
    let end = value.find('\n').unwrap_or(value.len());
    value[..end].trim().to_string()
}

/// The optional-dependency field wraps over multiple lines and carries no
/// sentinel of its own, so it is captured up to the nearer of the two
/// labels that can follow it, with line breaks made explicit.
fn extract_opt_depends(info: &str) -> String {
    let Some(pos) = info.find("Optional Deps") else {
        return String::new();
    };
    let after = &info[pos + "Optional Deps".len()..];
    let Some(colon) = after.find(':') else {
        return String::new();
    };
    let value = &after[colon + 1..];
    let end = match (value.find("Conflicts With"), value.find("Required By")) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => value.len(),
    };
    value[..end].trim().replace('\n', "<br>")
}

/// First whitespace-delimited token as a float, 0 when unparsable.
fn parse_size(value: &str) -> f64 {
    value
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .unwrap_or(0.0)
}

fn parse_date(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATE_FORMAT).ok()
}

/// Parse the group listing: trimmed non-empty lines, sorted, deduplicated.
pub fn parse_group_list(input: &str) -> Vec<String> {
    let mut groups: Vec<String> = input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    groups.sort();
    groups.dedup();
    groups
}

/// Parse the members-of-group listing (`group member` per line).
pub fn parse_group_members(input: &str) -> Vec<String> {
    input
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(_), Some(name), None) => Some(name.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// First token of every line, as a set (explicit / unrequired listings).
pub fn parse_name_set(input: &str) -> HashSet<String> {
    input
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// `name version` pairs of the foreign package listing.
pub fn parse_foreign_list(input: &str) -> Vec<(String, String)> {
    input
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(name), Some(version)) => Some((name.to_string(), version.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// Map detail records of foreign installs to list records, the way the
/// foreign refresh flow feeds the repository.
pub fn records_from_details(details: Vec<DetailRecord>) -> Vec<PackageRecord> {
    details
        .into_iter()
        .map(|detail| {
            let description = if detail.description.is_empty() {
                detail.name.clone()
            } else {
                format!("{} {}", detail.name, detail.description)
            };
            PackageRecord {
                name: detail.name,
                repository: detail.repository,
                version: detail.version,
                description,
                previous_version: String::new(),
                status: PackageStatus::Foreign,
            }
        })
        .collect()
}
