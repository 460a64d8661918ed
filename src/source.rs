//! This module contains the source resolver, which reconstructs the exact set
//! of source files that a metadata document describes.
//!
//! # Content Addressing
//!
//! Every source in a metadata document is identified by the Keccak-256 hash of
//! its content. Sources are resolved by that hash rather than by name, so the
//! submitter may upload files under any name and in any order as long as their
//! bytes are exactly those that the original compiler ingested.
//!
//! The [`HashIndex`] used for this is built per submission from that
//! submission's own files. Uploaded content is untrusted, and is never shared
//! between unrelated submissions.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::{
    error::source::{Error, Result},
    intake::ClassifiedFile,
    metadata::CompilerMetadata,
    utility::{keccak256_hex, normalize_hex},
};

/// A mapping from the hash of a source file's content to that content.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HashIndex<'a> {
    by_hash: HashMap<String, &'a str>,
}

impl<'a> HashIndex<'a> {
    /// Builds an index over every plain-text file in `files`.
    ///
    /// Files that may be metadata documents are not indexed, as they are never
    /// sources.
    #[must_use]
    pub fn build(files: &'a [ClassifiedFile]) -> Self {
        let by_hash = files
            .iter()
            .filter_map(ClassifiedFile::as_plain_text)
            .map(|content| (normalize_hex(&keccak256_hex(content)), content))
            .collect();
        Self { by_hash }
    }

    /// Looks up the content whose hash is `hash`.
    ///
    /// The `hash` may be given with or without the `0x` prefix, and in any
    /// case.
    #[must_use]
    pub fn get(&self, hash: &str) -> Option<&'a str> {
        self.by_hash.get(&normalize_hex(hash)).copied()
    }

    /// Gets the number of distinct contents in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    /// Checks if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

/// The fully reconstructed set of sources for one metadata document, keyed by
/// the file names that the metadata uses for them.
///
/// Every content in the set hashes to the hash that the metadata declares for
/// its file.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SourceSet {
    sources: BTreeMap<String, String>,
}

impl SourceSet {
    /// Gets the content of the source called `file`.
    #[must_use]
    pub fn get(&self, file: &str) -> Option<&str> {
        self.sources.get(file).map(String::as_str)
    }

    /// Iterates over the `(file name, content)` pairs of the set in file name
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Gets the number of sources in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Checks if the set contains no sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FromIterator<(String, String)> for SourceSet {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let sources = iter.into_iter().collect();
        Self { sources }
    }
}

/// Resolves every source named by `metadata`, using the non-empty sources
/// embedded in the metadata itself or, failing that, the plain-text files
/// among `files`.
///
/// # Errors
///
/// Returns [`Err`] if an embedded source does not match its declared hash, or
/// if a source cannot be found by either means.
pub fn resolve_sources(metadata: &CompilerMetadata, files: &[ClassifiedFile]) -> Result<SourceSet> {
    let index = HashIndex::build(files);
    resolve_sources_with(metadata, &index)
}

/// Resolves every source named by `metadata` against an already-built
/// `index`.
///
/// This allows a single index to serve all of the metadata documents in one
/// submission.
///
/// # Errors
///
/// Returns [`Err`] if an embedded source does not match its declared hash, or
/// if a source cannot be found by either means.
pub fn resolve_sources_with(metadata: &CompilerMetadata, index: &HashIndex) -> Result<SourceSet> {
    let mut sources = BTreeMap::new();

    for (file, entry) in &metadata.sources {
        let declared = &entry.keccak256;
        let content = match &entry.content {
            Some(content) if !content.is_empty() => {
                if normalize_hex(&keccak256_hex(content)) != normalize_hex(declared) {
                    return Err(Error::InvalidContent { file: file.clone() });
                }
                content.clone()
            }
            _ => index
                .get(declared)
                .map(str::to_string)
                .ok_or_else(|| Error::MissingSource {
                    file: file.clone(),
                    hash: declared.clone(),
                })?,
        };
        sources.insert(file.clone(), content);
    }

    tracing::debug!(
        sources = sources.len(),
        indexed = index.len(),
        "Resolved metadata sources"
    );
    Ok(SourceSet { sources })
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::{
        error::source::Error,
        intake::ClassifiedFile,
        metadata::CompilerMetadata,
        source::{resolve_sources, HashIndex},
        utility::keccak256_hex,
    };

    const TOKEN: &str = "pragma solidity ^0.6.0;\ncontract Token {}\n";
    const LIB: &str = "pragma solidity ^0.6.0;\nlibrary Lib {}\n";

    fn metadata(sources: serde_json::Value) -> anyhow::Result<CompilerMetadata> {
        Ok(serde_json::from_value(json!({
            "language": "Solidity",
            "compiler": { "version": "0.6.1+commit.e6f7d5a4" },
            "settings": { "compilationTarget": { "Token.sol": "Token" } },
            "sources": sources
        }))?)
    }

    fn plain(text: &str) -> ClassifiedFile {
        ClassifiedFile::PlainText(text.to_string())
    }

    #[test]
    fn indexes_only_plain_text() {
        let files = vec![plain(TOKEN), ClassifiedFile::JsonObject("{}".into())];
        let index = HashIndex::build(&files);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&keccak256_hex("{}")), None);
        assert_eq!(
            index.get(&keccak256_hex(TOKEN)[2..].to_uppercase()),
            Some(TOKEN)
        );
    }

    #[test]
    fn resolves_by_hash_regardless_of_name_and_order() -> anyhow::Result<()> {
        let metadata = metadata(json!({
            "Token.sol": { "keccak256": keccak256_hex(TOKEN) },
            "lib/Lib.sol": { "keccak256": keccak256_hex(LIB) }
        }))?;
        let files = vec![plain(LIB), plain("unrelated"), plain(TOKEN)];

        let sources = resolve_sources(&metadata, &files)?;

        assert_eq!(sources.len(), 2);
        for (file, content) in sources.iter() {
            assert_eq!(keccak256_hex(content), metadata.sources[file].keccak256);
        }

        Ok(())
    }

    #[test]
    fn accepts_matching_inline_content() -> anyhow::Result<()> {
        let metadata = metadata(json!({
            "Token.sol": { "keccak256": keccak256_hex(TOKEN), "content": TOKEN }
        }))?;

        let sources = resolve_sources(&metadata, &[])?;
        assert_eq!(sources.get("Token.sol"), Some(TOKEN));

        Ok(())
    }

    #[test]
    fn looks_up_empty_inline_content_by_hash() -> anyhow::Result<()> {
        let metadata = metadata(json!({
            "Token.sol": { "keccak256": keccak256_hex(TOKEN), "content": "" }
        }))?;

        let sources = resolve_sources(&metadata, &[plain(TOKEN)])?;
        assert_eq!(sources.get("Token.sol"), Some(TOKEN));

        assert_eq!(
            resolve_sources(&metadata, &[]),
            Err(Error::MissingSource {
                file: "Token.sol".into(),
                hash: keccak256_hex(TOKEN),
            })
        );

        Ok(())
    }

    #[test]
    fn rejects_tampered_inline_content() -> anyhow::Result<()> {
        let tampered = TOKEN.replace("Token", "Tokem");
        let metadata = metadata(json!({
            "Token.sol": { "keccak256": keccak256_hex(TOKEN), "content": tampered }
        }))?;

        // The genuine file being present in the upload does not rescue it.
        let result = resolve_sources(&metadata, &[plain(TOKEN)]);
        assert_eq!(
            result,
            Err(Error::InvalidContent {
                file: "Token.sol".into(),
            })
        );

        Ok(())
    }

    #[test]
    fn reports_missing_sources_with_their_hash() -> anyhow::Result<()> {
        let hash = keccak256_hex(LIB);
        let metadata = metadata(json!({
            "Token.sol": { "keccak256": keccak256_hex(TOKEN) },
            "lib/Lib.sol": { "keccak256": hash }
        }))?;

        let result = resolve_sources(&metadata, &[plain(TOKEN)]);
        let error = result.unwrap_err();
        assert_eq!(
            error,
            Error::MissingSource {
                file: "lib/Lib.sol".into(),
                hash: hash.clone(),
            }
        );
        assert!(error.to_string().contains(&hash));

        // Adding the file back, even under a different name, resolves it.
        let files = vec![plain(TOKEN), plain(LIB)];
        assert!(resolve_sources(&metadata, &files).is_ok());

        Ok(())
    }
}
