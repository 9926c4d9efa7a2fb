//! External names for catalog services.
//!
//! OSB platforms surface the service name to users and often use it as a
//! Kubernetes object name, so it must be lowercase, `[a-z0-9-]` and at most
//! 63 characters. Display names are neither unique nor safe, so the name is
//! derived from the display name plus a short hash of the service id.

use std::sync::LazyLock;

use regex::Regex;
use sha1::{Digest, Sha1};

/// Longest name prefix kept from the display name.
const MAX_PREFIX_LEN: usize = 57;

/// Hex characters of the service id digest appended to every name.
const SUFFIX_LEN: usize = 5;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-zA-Z0-9]+").expect("static pattern compiles"));

/// Build the externally visible name for a service.
///
/// Pure function of its inputs: same display name and id, same result.
pub fn external_name(display_name: &str, service_id: &str) -> String {
    let digest = hex::encode(Sha1::digest(service_id.as_bytes()));
    let suffix = &digest[..SUFFIX_LEN];

    let name = NON_ALPHANUMERIC
        .replace_all(display_name, "-")
        .to_lowercase();
    let name = name.strip_suffix('-').unwrap_or(&name);
    // Only ASCII survives the replacement, so byte slicing is char-safe.
    let name = &name[..name.len().min(MAX_PREFIX_LEN)];

    let full = format!("{name}-{suffix}");
    match full.strip_prefix('-') {
        Some(trimmed) => trimmed.to_string(),
        None => full,
    }
}
