// SPDX-License-Identifier: MIT OR Apache-2.0
//! The two pure path-scrubbing functions spec §1 calls out as the tracing
//! engine's only remaining out-of-scope dependency: `scrubPath`,
//! `scrubPathParams`. No sample implementation survived distillation (see
//! DESIGN.md), so the exact scrubbing heuristic here is this crate's own —
//! drop the query string, and for `scrubPathParams` additionally replace
//! path segments that look like identifiers (all-digit, or long hex/UUID)
//! with `?`.

/// Drop the query string, leaving the path unchanged otherwise.
#[must_use]
pub fn scrub_path(path: &str) -> String {
    path.split('?').next().unwrap_or("").to_string()
}

/// `scrub_path`, plus replace identifier-shaped path segments with `?`.
#[must_use]
pub fn scrub_path_params(path: &str) -> String {
    scrub_path(path)
        .split('/')
        .map(|segment| if looks_like_an_identifier(segment) { "?" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_like_an_identifier(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    let all_digits = segment.chars().all(|c| c.is_ascii_digit());
    let uuid_shaped = segment.len() >= 32 && segment.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
    all_digits || uuid_shaped
}
