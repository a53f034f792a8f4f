//! Lenient version parsing for tool output.

use std::sync::LazyLock;

use regex::Regex;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+){0,2})").unwrap());

/// Parse a version string, tolerating missing components and suffixes
/// (`1.21` -> `1.21.0`, `13.2.0-ubuntu` -> `13.2.0`).
pub fn parse_version_flexible(version_str: &str) -> Option<semver::Version> {
    let clean_version = version_str
        .trim()
        .split(|c: char| !c.is_ascii_digit() && c != '.')
        .next()
        .unwrap_or(version_str);

    if let Ok(v) = clean_version.parse() {
        return Some(v);
    }

    let parts: Vec<&str> = clean_version.split('.').collect();
    let major = parts.first().and_then(|s| s.parse().ok())?;
    let minor = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
    let patch = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);

    Some(semver::Version::new(major, minor, patch))
}

/// Find the first version-looking token after `marker` in tool output.
///
/// `go version go1.21.5 linux/amd64` with marker `go version go` yields 1.21.5.
pub fn find_version(output: &str, marker: &str) -> Option<semver::Version> {
    let tail = match output.find(marker) {
        Some(pos) => &output[pos + marker.len()..],
        None => output,
    };
    VERSION_RE
        .captures(tail)
        .and_then(|c| parse_version_flexible(&c[1]))
}
