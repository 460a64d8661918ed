//! This module contains the bytecode comparator, which decides how closely a
//! recompiled contract matches the code deployed on chain.
//!
//! # Match Grades
//!
//! - A [`MatchStatus::Perfect`] match means that the two bytecodes are
//!   byte-for-byte identical, proving a reproducible build.
//! - A [`MatchStatus::Partial`] match means that the bytecodes are identical
//!   apart from the CBOR metadata section that the compiler appends to them.
//!   That section embeds hashes of the metadata document, which change with
//!   things like source paths and comments, so a partial match proves that
//!   the logic is equivalent without proving that the sources are identical.
//!
//! # The Metadata Section
//!
//! The compiler appends the CBOR-encoded metadata to the end of the bytecode,
//! followed by two bytes giving the length of the CBOR data as a big-endian
//! integer. The section is therefore self-describing: reading the final two
//! bytes tells us how much of the tail to remove.

use serde::{Deserialize, Serialize};

use crate::{
    constant::{METADATA_LENGTH_FIELD_HEX_CHARS, NO_CODE_VALUES},
    utility::normalize_hex,
};

/// How closely deployed bytecode matches recompiled bytecode.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// The bytecodes are identical.
    Perfect,

    /// The bytecodes are identical once their metadata sections are removed.
    Partial,
}

impl MatchStatus {
    /// Gets the comparison that produced this status.
    #[must_use]
    pub fn comparison_path(self) -> ComparisonPath {
        match self {
            Self::Perfect => ComparisonPath::Exact,
            Self::Partial => ComparisonPath::MetadataStripped,
        }
    }
}

/// The ways in which two bytecodes can be compared.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonPath {
    /// A direct comparison of the full bytecodes.
    Exact,

    /// A comparison of the bytecodes without their trailing metadata
    /// sections.
    MetadataStripped,
}

/// Compares the `deployed` bytecode with the `compiled` bytecode, allowing
/// partial matches.
///
/// Returns [`None`] if there is no deployed code, or if the bytecodes do not
/// match.
#[must_use]
pub fn compare_bytecodes(deployed: Option<&str>, compiled: &str) -> Option<MatchStatus> {
    compare_bytecodes_with(deployed, compiled, true)
}

/// Compares the `deployed` bytecode with the `compiled` bytecode.
///
/// If `allow_partial` is `false`, only perfect matches are reported.
///
/// Both bytecodes are hex-encoded, with or without the `0x` prefix, in any
/// case.
#[must_use]
pub fn compare_bytecodes_with(
    deployed: Option<&str>,
    compiled: &str,
    allow_partial: bool,
) -> Option<MatchStatus> {
    let deployed = deployed.filter(|code| !is_no_code(code))?;
    let deployed = normalize_hex(deployed);
    let compiled = normalize_hex(compiled);

    if deployed == compiled {
        return Some(MatchStatus::Perfect);
    }

    if allow_partial {
        let stripped_deployed = strip_metadata(&deployed)?;
        let stripped_compiled = strip_metadata(&compiled)?;
        if !stripped_deployed.is_empty() && stripped_deployed == stripped_compiled {
            return Some(MatchStatus::Partial);
        }
    }

    None
}

/// Removes the trailing metadata section from the hex-encoded `bytecode`
/// (without the `0x` prefix).
///
/// Returns [`None`] if the bytecode is too short to contain the section that
/// its final two bytes describe, or if those bytes are not valid hex.
#[must_use]
pub fn strip_metadata(bytecode: &str) -> Option<&str> {
    let len = bytecode.len();
    let field_start = len.checked_sub(METADATA_LENGTH_FIELD_HEX_CHARS)?;
    let field = bytecode.get(field_start..)?;
    let cbor_bytes = usize::from(u16::from_str_radix(field, 16).ok()?);

    let strip = cbor_bytes * 2 + METADATA_LENGTH_FIELD_HEX_CHARS;
    let keep = len.checked_sub(strip)?;
    bytecode.get(..keep)
}

/// Checks if `code` is one of the values a node returns for an address with no
/// code.
fn is_no_code(code: &str) -> bool {
    let code = code.trim().to_ascii_lowercase();
    NO_CODE_VALUES.contains(&code.as_str())
}
