//! This module contains the representation of the metadata document that the
//! Solidity compiler emits alongside each contract.
//!
//! Only the fields that verification depends on are typed. Everything else is
//! preserved verbatim so that the settings handed back to the compiler are
//! exactly those of the original build.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::compile;

/// A compiler metadata document.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CompilerMetadata {
    /// The source language, which must be [`crate::constant::SOLIDITY_LANGUAGE`].
    pub language: String,

    /// The compiler that produced the original build.
    pub compiler: CompilerInfo,

    /// The settings of the original build.
    pub settings: Settings,

    /// The sources that went into the original build, by file name.
    pub sources: BTreeMap<String, SourceEntry>,

    /// The remaining top-level fields, such as the ABI `output` and the
    /// metadata `version`.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl CompilerMetadata {
    /// Gets the exact compiler version string of the original build.
    #[must_use]
    pub fn compiler_version(&self) -> &str {
        &self.compiler.version
    }

    /// Gets the single `(file name, contract name)` pair that the document
    /// identifies as its compilation target.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if there is not exactly one target, or if the target's
    /// contract name is empty.
    pub fn compilation_target(&self) -> compile::Result<(&str, &str)> {
        let targets = &self.settings.compilation_target;
        let found = targets.len();
        match targets.iter().next() {
            Some((file, contract)) if found == 1 && !contract.is_empty() => {
                Ok((file.as_str(), contract.as_str()))
            }
            _ => Err(compile::Error::NoCompilationTarget { found }),
        }
    }
}

/// The compiler information recorded in a metadata document.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CompilerInfo {
    /// The full version string, including the commit, e.g.
    /// `0.6.1+commit.e6f7d5a4`.
    pub version: String,

    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The settings recorded in a metadata document.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// The file and contract that the document describes.
    #[serde(default)]
    pub compilation_target: BTreeMap<String, String>,

    /// All other compiler flags (optimizer, EVM version, remappings,
    /// libraries, and so on).
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// An entry in the `sources` map of a metadata document.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SourceEntry {
    /// The source text, if the compiler was asked to embed it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// The declared Keccak-256 hash of the source text.
    pub keccak256: String,

    /// Other fields, such as `urls` and `license`.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}
