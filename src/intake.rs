//! This module contains the first stage of the verification pipeline: turning
//! the raw files supplied by the submitter into typed artifacts, and picking
//! out the compiler metadata documents among them.

use serde_json::Value;

use crate::{
    constant::SOLIDITY_LANGUAGE,
    error::intake::{Error, Result},
    metadata::CompilerMetadata,
};

/// A file as supplied by the submitter, before anything is known about its
/// contents.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawArtifact {
    name: Option<String>,
    data: Vec<u8>,
}

impl RawArtifact {
    /// Creates a new artifact from the provided `data`, without a name.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self { name: None, data }
    }

    /// Creates a new artifact from the provided `data`, with the display name
    /// `name`.
    #[must_use]
    pub fn named(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let name = Some(name.into());
        let data = data.into();
        Self { name, data }
    }

    /// Gets the display name of the artifact, if it has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Gets the raw bytes of the artifact.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// An uploaded file once its shape has been determined.
///
/// The shape is decided once, at classification time, and is never
/// re-inspected afterwards.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClassifiedFile {
    /// A JSON object, re-serialized in canonical form. Usually a metadata
    /// document.
    JsonObject(String),

    /// A JSON string whose contents are themselves JSON; a metadata document
    /// that arrived double-encoded.
    JsonString(String),

    /// Anything else, which is treated as a source file.
    PlainText(String),
}

impl ClassifiedFile {
    /// Classifies the provided `data`.
    ///
    /// Bytes that are not valid UTF-8 are decoded lossily.
    #[must_use]
    pub fn classify(data: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(data) {
            Ok(value @ Value::Object(_)) => Self::JsonObject(value.to_string()),
            Ok(Value::String(inner)) => Self::JsonString(inner),
            _ => Self::PlainText(String::from_utf8_lossy(data).into_owned()),
        }
    }

    /// Gets the text of the file, whatever its shape.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::JsonObject(text) | Self::JsonString(text) | Self::PlainText(text) => text,
        }
    }

    /// Gets the text of the file if it is a candidate source file.
    #[must_use]
    pub fn as_plain_text(&self) -> Option<&str> {
        match self {
            Self::PlainText(text) => Some(text),
            _ => None,
        }
    }

    /// Gets the text of the file if it may be a metadata document.
    #[must_use]
    pub fn as_json_text(&self) -> Option<&str> {
        match self {
            Self::JsonObject(text) | Self::JsonString(text) => Some(text),
            Self::PlainText(_) => None,
        }
    }
}

/// Classifies each of the provided `artifacts`.
///
/// # Errors
///
/// Returns [`Err`] if no artifacts were provided at all, as this indicates a
/// malformed request rather than a problem with the content of the files.
pub fn classify(artifacts: &[RawArtifact]) -> Result<Vec<ClassifiedFile>> {
    if artifacts.is_empty() {
        return Err(Error::NoFiles);
    }

    let files = artifacts
        .iter()
        .map(|artifact| {
            let file = ClassifiedFile::classify(artifact.data());
            tracing::trace!(
                name = artifact.name().unwrap_or("<unnamed>"),
                kind = kind_name(&file),
                "Classified uploaded file"
            );
            file
        })
        .collect();

    Ok(files)
}

/// Selects the Solidity metadata documents from among the classified `files`.
///
/// Files that are not JSON, or are JSON for a different language, are
/// ordinary source files and are skipped silently. Documents that claim to be
/// Solidity metadata but do not have the expected structure are skipped with a
/// warning.
///
/// # Errors
///
/// Returns [`Err`] if no metadata documents are found, as nothing can be
/// verified without one.
pub fn select_metadata(files: &[ClassifiedFile]) -> Result<Vec<CompilerMetadata>> {
    let documents: Vec<CompilerMetadata> = files
        .iter()
        .filter_map(ClassifiedFile::as_json_text)
        .filter_map(|text| serde_json::from_str::<Value>(text).ok())
        .filter(|value| value.get("language").and_then(Value::as_str) == Some(SOLIDITY_LANGUAGE))
        .filter_map(|value| match serde_json::from_value::<CompilerMetadata>(value) {
            Ok(metadata) => Some(metadata),
            Err(error) => {
                tracing::warn!(%error, "Skipping malformed Solidity metadata document");
                None
            }
        })
        .collect();

    if documents.is_empty() {
        return Err(Error::MetadataNotFound);
    }

    tracing::debug!(count = documents.len(), "Selected metadata documents");
    Ok(documents)
}

/// A store of files from previous submissions, indexed by the chain and
/// address that they were verified against.
pub trait ArtifactRepository {
    /// Gets the files stored for `address` on `chain`, or [`None`] if the
    /// repository holds nothing for that address.
    fn files_for(&self, chain: &str, address: &str) -> Option<Vec<RawArtifact>>;
}

/// Looks up the files stored in `repository` for `address` on `chain`.
///
/// # Errors
///
/// Returns [`Err`] if the repository has nothing stored for the address.
pub fn stored_artifacts(
    repository: &dyn ArtifactRepository,
    chain: &str,
    address: &str,
) -> Result<Vec<RawArtifact>> {
    repository
        .files_for(chain, address)
        .ok_or_else(|| Error::AddressNotFound {
            chain:   chain.to_string(),
            address: address.to_string(),
        })
}

fn kind_name(file: &ClassifiedFile) -> &'static str {
    match file {
        ClassifiedFile::JsonObject(_) => "json-object",
        ClassifiedFile::JsonString(_) => "json-string",
        ClassifiedFile::PlainText(_) => "plain-text",
    }
}
