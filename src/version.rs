//! Lenient semantic-version parsing for marker arguments.
//!
//! Marker versions are free-form strings written by library authors
//! (`"1.0"`, `"0.5.0"`, `"v2.1"`); the `semver` crate wants exactly three
//! components. Short forms are padded with zeros before parsing.
//! Unparseable versions compare as unknown, and the removal engine treats
//! unknown as "do not remove".

use semver::Version;

/// Parses a version string, padding missing minor/patch components.
pub fn parse_lenient(text: &str) -> Option<Version> {
    let trimmed = text.trim().trim_start_matches('v');
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    // Split off any pre-release/build suffix before counting components.
    let (core, suffix) = match trimmed.find(['-', '+']) {
        Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
        None => (trimmed, ""),
    };

    let dots = core.matches('.').count();
    let padded = match dots {
        0 => format!("{core}.0.0{suffix}"),
        1 => format!("{core}.0{suffix}"),
        _ => return None,
    };

    Version::parse(&padded).ok()
}

/// True when `version` sorts strictly before `threshold`.
pub fn is_before(version: &Version, threshold: &Version) -> bool {
    version < threshold
}

/// True when `current` is at or past `target`.
pub fn has_reached(current: &Version, target: &Version) -> bool {
    current >= target
}
