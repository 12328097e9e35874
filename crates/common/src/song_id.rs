//! Content-derived song identifiers.
//!
//! A song id is the first 32 hex characters of a SHA-256 digest over
//! `duration|file_size|title`, with the title trimmed and lowercased. The same
//! recording imported twice hashes to the same id without a database lookup.
//! When two different recordings collide on the base id, the caller picks a
//! numeric suffix and the id becomes `<base>_<suffix>`.

use std::fmt;

use sha2::{Digest, Sha256};

/// Hex characters kept from the digest (128 of its 256 bits).
pub const BASE_ID_LEN: usize = 32;

const KEY_SEP: char = '|';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedId {
    pub base_id: String,
    /// Digits after `_`, kept verbatim since any digit run is well-formed.
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongIdError {
    InvalidFormat(String),
}

impl fmt::Display for SongIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SongIdError::InvalidFormat(value) => write!(f, "invalid song id format: {:?}", value),
        }
    }
}

impl std::error::Error for SongIdError {}

pub fn compute_id(duration: u32, file_size: u64, title: &str) -> String {
    let normalized = title.trim().to_lowercase();
    let key = format!("{}{}{}{}{}", duration, KEY_SEP, file_size, KEY_SEP, normalized);

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(BASE_ID_LEN);
    hex
}

/// Suffix 0 yields the plain base id.
pub fn compute_id_with_suffix(duration: u32, file_size: u64, title: &str, suffix: u64) -> String {
    let base = compute_id(duration, file_size, title);
    if suffix == 0 {
        base
    } else {
        format!("{}_{}", base, suffix)
    }
}

pub fn is_valid_id(id: &str) -> bool {
    let (base, suffix) = match id.split_once('_') {
        Some((base, suffix)) => (base, Some(suffix)),
        None => (id, None),
    };
    if base.len() != BASE_ID_LEN || !base.bytes().all(is_lower_hex) {
        return false;
    }
    match suffix {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => true,
    }
}

pub fn parse_id(id: &str) -> Result<ParsedId, SongIdError> {
    if !is_valid_id(id) {
        return Err(SongIdError::InvalidFormat(id.to_string()));
    }
    let (base_id, suffix) = match id.split_once('_') {
        Some((base, digits)) => (base, Some(digits.to_string())),
        None => (id, None),
    };
    Ok(ParsedId {
        base_id: base_id.to_string(),
        suffix,
    })
}

fn is_lower_hex(byte: u8) -> bool {
    byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte)
}
