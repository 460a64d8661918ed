//! Utility functions useful throughout the codebase.

use sha3::{Digest, Keccak256};

use crate::{
    constant::{ADDRESS_LENGTH_BYTES, HEX_PREFIX},
    error::chain,
};

/// Computes the Keccak-256 hash of `data`, rendered as `0x`-prefixed
/// lowercase hex.
///
/// This is the form in which the compiler records source hashes in its
/// metadata.
#[must_use]
pub fn keccak256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    format!("{HEX_PREFIX}{}", hex::encode(hasher.finalize()))
}

/// Strips an optional `0x` prefix from `value` and lowercases it, so that hex
/// strings from different producers can be compared directly.
#[must_use]
pub fn normalize_hex(value: &str) -> String {
    let trimmed = value.trim();
    let no_prefix = trimmed
        .strip_prefix(HEX_PREFIX)
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    no_prefix.to_ascii_lowercase()
}

/// Renders `address` in the mixed-case checksum encoding of
/// [EIP-55](https://eips.ethereum.org/EIPS/eip-55).
///
/// # Errors
///
/// Returns [`Err`] if `address` is not 20 bytes of hex, with or without the
/// `0x` prefix.
pub fn to_checksum_address(address: &str) -> chain::Result<String> {
    let lower = normalize_hex(address);
    let is_hex = lower.chars().all(|c| c.is_ascii_hexdigit());
    if lower.len() != ADDRESS_LENGTH_BYTES * 2 || !is_hex {
        return Err(chain::Error::InvalidAddress(address.to_string()));
    }

    let hash = Keccak256::digest(lower.as_bytes());
    let checksummed: String = lower
        .chars()
        .enumerate()
        .map(|(ix, c)| {
            // Each hex character of the address is paired with one nibble of the hash.
            let byte = hash[ix / 2];
            let nibble = if ix % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect();

    Ok(format!("{HEX_PREFIX}{checksummed}"))
}
