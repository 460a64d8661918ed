//! This module contains the compiler input builder, which turns a metadata
//! document and its resolved sources into the standard-JSON input that
//! reproduces the original build.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::{
    constant::TARGET_OUTPUT_SELECTION,
    error::compile::{Error, Result},
    metadata::CompilerMetadata,
    source::SourceSet,
};

/// The standard-JSON input handed to the compiler.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompilerInput {
    /// The source language.
    pub language: String,

    /// The sources to compile, keyed by the file names that the metadata uses.
    pub sources: BTreeMap<String, InputSource>,

    /// The compiler settings, derived from those of the original build.
    pub settings: Map<String, Value>,
}

impl CompilerInput {
    /// Serializes the input into the JSON form that the compiler reads.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the input cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidInput(e.to_string()))
    }
}

/// A single source in the compiler input.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InputSource {
    pub content: String,
}

/// The compiler input along with the contract that is to be taken from the
/// compiler's output.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedInput {
    pub input:         CompilerInput,
    pub file_name:     String,
    pub contract_name: String,
}

/// Builds the compiler input for `metadata` from its resolved `sources`.
///
/// The settings are those of the original build, with the compilation target
/// removed (the compiler does not accept it) and the output selection for the
/// target contract replaced by [`TARGET_OUTPUT_SELECTION`].
///
/// # Errors
///
/// Returns [`Err`] if the metadata does not identify exactly one compilation
/// target.
pub fn build_input(metadata: &CompilerMetadata, sources: &SourceSet) -> Result<PreparedInput> {
    let (file_name, contract_name) = metadata.compilation_target()?;
    let (file_name, contract_name) = (file_name.to_string(), contract_name.to_string());

    // `compilationTarget` is a typed field, so it never appears among the
    // untyped settings copied here.
    let mut settings = metadata.settings.other.clone();

    if let Some(libraries) = settings.remove("libraries") {
        settings.insert("libraries".into(), nest_libraries(libraries));
    }

    settings
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()));

    let selection = settings
        .entry("outputSelection")
        .or_insert_with(|| Value::Object(Map::new()));
    if !selection.is_object() {
        *selection = Value::Object(Map::new());
    }
    if let Value::Object(by_file) = selection {
        let for_file = by_file
            .entry(file_name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !for_file.is_object() {
            *for_file = Value::Object(Map::new());
        }
        if let Value::Object(by_contract) = for_file {
            by_contract.insert(contract_name.clone(), json!(TARGET_OUTPUT_SELECTION));
        }
    }

    let sources = sources
        .iter()
        .map(|(name, content)| {
            let source = InputSource {
                content: content.to_string(),
            };
            (name.to_string(), source)
        })
        .collect();

    let input = CompilerInput {
        language: metadata.language.clone(),
        sources,
        settings,
    };

    Ok(PreparedInput {
        input,
        file_name,
        contract_name,
    })
}

/// Converts library addresses from the flat form used in metadata
/// (`"file.sol:Lib": address`) to the nested form that the compiler input
/// requires (`"file.sol": {"Lib": address}`).
///
/// Entries that are already nested are kept as they are. A key without a file
/// part is placed under the empty file name.
fn nest_libraries(libraries: Value) -> Value {
    let Value::Object(flat) = libraries else {
        return libraries;
    };

    let mut nested: Map<String, Value> = Map::new();
    for (key, value) in flat {
        if value.is_object() {
            nested.insert(key, value);
            continue;
        }

        let (file, library) = match key.rsplit_once(':') {
            Some((file, library)) => (file.to_string(), library.to_string()),
            None => (String::new(), key.clone()),
        };
        let entry = nested
            .entry(file)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(by_library) = entry {
            by_library.insert(library, value);
        }
    }

    Value::Object(nested)
}
