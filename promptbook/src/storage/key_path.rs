//! Mapping of storage keys to file paths.
//!
//! A key maps to `H0/H1/{prefix}-{hash}.json` where `hash` is the hex SHA-256
//! of the normalized key, `H0` and `H1` are its first two characters in upper
//! case and `prefix` is the first word of the normalized key.

use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Longest readable prefix kept in a file name.
pub const MAX_FILENAME_PREFIX_LENGTH: usize = 20;

/// Lowercases a key and joins its alphanumeric runs with `-`.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Path of the file holding `key`, relative to the storage root.
#[must_use]
pub fn key_to_relative_path(key: &str) -> PathBuf {
    let normalized = normalize_key(key);
    let hash = hex::encode(Sha256::digest(normalized.as_bytes()));

    let prefix: String = normalized
        .split('-')
        .next()
        .unwrap_or_default()
        .chars()
        .take(MAX_FILENAME_PREFIX_LENGTH)
        .collect();
    let prefix = if prefix.is_empty() { "untitled".to_string() } else { prefix };

    [
        hash[0..1].to_uppercase(),
        hash[1..2].to_uppercase(),
        format!("{prefix}-{hash}.json"),
    ]
    .iter()
    .collect()
}
