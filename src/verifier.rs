//! This module contains the verifier itself, which ties the stages of the
//! verification pipeline together behind a small set of operations.
//!
//! # Operations
//!
//! - [`Verifier::check_files`] turns a submission into the metadata documents
//!   it contains, along with the resolved sources for each.
//! - [`Verifier::recompile`] reruns the build described by one of those
//!   documents.
//! - [`Verifier::match_bytecode_to_address`] searches candidate addresses on
//!   a chain for the one running the recompiled code.
//! - [`Verifier::compare_bytecodes`] grades a single pair of bytecodes.
//! - [`Verifier::verify`] does all of the above for every document in a
//!   submission.

use std::{sync::Arc, time::Duration};

use itertools::Itertools;
use serde::{ser::SerializeStruct, Serialize, Serializer};

use crate::{
    bytecode::{compare_bytecodes_with, MatchStatus},
    chain::{Chain, ChainProviders},
    compiler::{CompilerCache, CompilerDistribution, RecompilationResult, Recompiler},
    constant::{
        DEFAULT_COMPILER_LOAD_TIMEOUT,
        DEFAULT_COMPILE_TIMEOUT,
        DEFAULT_MATCH_CONCURRENCY,
        DEFAULT_PARTIAL_MATCHES_ENABLED,
        DEFAULT_RPC_TIMEOUT,
    },
    error::{container::Attributable, DocumentErrors, Error, Result},
    intake::{self, ArtifactRepository, RawArtifact},
    matcher::{self, Match},
    metadata::CompilerMetadata,
    source::{resolve_sources_with, HashIndex, SourceSet},
    watchdog::DynWatchdog,
};

/// The configuration for the verifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// The maximum amount of time that obtaining a compiler release may take.
    ///
    /// Defaults to [`DEFAULT_COMPILER_LOAD_TIMEOUT`].
    pub compiler_load_timeout: Duration,

    /// The maximum amount of time that a single compilation may take.
    ///
    /// Defaults to [`DEFAULT_COMPILE_TIMEOUT`].
    pub compile_timeout: Duration,

    /// The maximum number of candidate addresses whose code is fetched at
    /// once. Values below one are treated as one.
    ///
    /// Defaults to [`DEFAULT_MATCH_CONCURRENCY`].
    pub match_concurrency: usize,

    /// The maximum amount of time to wait for the code at a single candidate
    /// address. An address whose code does not arrive in time is skipped.
    ///
    /// Defaults to [`DEFAULT_RPC_TIMEOUT`].
    pub rpc_timeout: Duration,

    /// Whether bytecodes that differ only in their metadata sections are
    /// reported as partial matches, rather than as not matching at all.
    ///
    /// Defaults to [`DEFAULT_PARTIAL_MATCHES_ENABLED`].
    pub allow_partial_matches: bool,
}

impl Config {
    /// Sets the `compiler_load_timeout` config parameter to `value`.
    #[must_use]
    pub fn with_compiler_load_timeout(mut self, value: Duration) -> Self {
        self.compiler_load_timeout = value;
        self
    }

    /// Sets the `compile_timeout` config parameter to `value`.
    #[must_use]
    pub fn with_compile_timeout(mut self, value: Duration) -> Self {
        self.compile_timeout = value;
        self
    }

    /// Sets the `match_concurrency` config parameter to `value`.
    #[must_use]
    pub fn with_match_concurrency(mut self, value: usize) -> Self {
        self.match_concurrency = value;
        self
    }

    /// Sets the `rpc_timeout` config parameter to `value`.
    #[must_use]
    pub fn with_rpc_timeout(mut self, value: Duration) -> Self {
        self.rpc_timeout = value;
        self
    }

    /// Sets the `allow_partial_matches` config parameter to `value`.
    #[must_use]
    pub fn with_partial_matches(mut self, value: bool) -> Self {
        self.allow_partial_matches = value;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        let compiler_load_timeout = DEFAULT_COMPILER_LOAD_TIMEOUT;
        let compile_timeout = DEFAULT_COMPILE_TIMEOUT;
        let match_concurrency = DEFAULT_MATCH_CONCURRENCY;
        let rpc_timeout = DEFAULT_RPC_TIMEOUT;
        let allow_partial_matches = DEFAULT_PARTIAL_MATCHES_ENABLED;
        Self {
            compiler_load_timeout,
            compile_timeout,
            match_concurrency,
            rpc_timeout,
            allow_partial_matches,
        }
    }
}

/// A metadata document whose sources were all resolved.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckedFile {
    /// The index of the document among the metadata documents of the
    /// submission.
    #[serde(skip)]
    pub document: usize,

    /// The metadata document.
    pub metadata: CompilerMetadata,

    /// The sources that the document names, keyed by file name.
    pub sources: SourceSet,
}

/// The result of checking a submission.
///
/// A document that cannot be resolved does not prevent the others from being
/// checked, so a submission can produce both files and errors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckedFiles {
    files:  Vec<CheckedFile>,
    errors: DocumentErrors,
}

impl CheckedFiles {
    /// Gets the documents that were resolved, in submission order.
    #[must_use]
    pub fn files(&self) -> &[CheckedFile] {
        &self.files
    }

    /// Gets the message of the error for the latest document that failed, if
    /// any did.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.errors.last().map(|error| error.payload.to_string())
    }

    /// Gets the errors for every document that failed.
    #[must_use]
    pub fn errors(&self) -> &DocumentErrors {
        &self.errors
    }

    /// Checks if every document was resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

impl IntoIterator for CheckedFiles {
    type IntoIter = std::vec::IntoIter<CheckedFile>;
    type Item = CheckedFile;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// Serializes as `{ "files": [...], "error": ... }`, with the error being the
/// message of the latest failure or `null`.
impl Serialize for CheckedFiles {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("CheckedFiles", 2)?;
        state.serialize_field("files", &self.files)?;
        state.serialize_field("error", &self.error())?;
        state.end()
    }
}

/// A contract that was recompiled and matched against a chain.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verified {
    pub file_name:     String,
    pub contract_name: String,
    pub compilation:   RecompilationResult,

    /// Where the contract was found; see [`Match::is_match`].
    #[serde(rename = "match")]
    pub matched: Match,
}

/// The outcome of verifying a single metadata document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Outcome {
    /// The index of the document among the metadata documents of the
    /// submission.
    pub document: usize,

    /// The verified contract, or the reason the document could not be
    /// verified.
    pub result: Result<Verified>,
}

/// The verifier, which runs submissions through the verification pipeline.
///
/// A verifier may be shared between concurrent requests. The only state it
/// holds across requests is its compiler cache.
#[derive(Debug)]
pub struct Verifier {
    config:     Config,
    recompiler: Recompiler,
    providers:  ChainProviders,
    watchdog:   DynWatchdog,
}

impl Verifier {
    /// Creates a verifier that obtains compilers from `distribution` and
    /// deployed code from `providers`.
    #[must_use]
    pub fn new(
        distribution: Arc<dyn CompilerDistribution>,
        providers: ChainProviders,
        config: Config,
        watchdog: DynWatchdog,
    ) -> Self {
        let cache = CompilerCache::new(distribution).with_load_timeout(config.compiler_load_timeout);
        Self::with_cache(Arc::new(cache), providers, config, watchdog)
    }

    /// Creates a verifier that shares an existing compiler `cache`.
    ///
    /// The load timeout of the cache is used in place of
    /// [`Config::compiler_load_timeout`].
    #[must_use]
    pub fn with_cache(
        cache: Arc<CompilerCache>,
        providers: ChainProviders,
        config: Config,
        watchdog: DynWatchdog,
    ) -> Self {
        let recompiler = Recompiler::new(cache).with_compile_timeout(config.compile_timeout);
        Self {
            config,
            recompiler,
            providers,
            watchdog,
        }
    }

    /// Gets the configuration of the verifier.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gets the compiler cache of the verifier.
    #[must_use]
    pub fn cache(&self) -> &Arc<CompilerCache> {
        self.recompiler.cache()
    }

    /// Finds the metadata documents among `artifacts` and resolves the sources
    /// of each.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if no artifacts were given, if none of them is a
    /// metadata document, or if the watchdog requests a stop. Failures to
    /// resolve an individual document are reported in the returned
    /// [`CheckedFiles`] instead.
    pub fn check_files(&self, artifacts: &[RawArtifact]) -> Result<CheckedFiles> {
        let files = intake::classify(artifacts)?;
        let documents = intake::select_metadata(&files)?;
        let index = HashIndex::build(&files);

        let mut checked = CheckedFiles::default();
        for (document, metadata) in documents.into_iter().enumerate() {
            if self.watchdog.should_stop() {
                return Err(Error::Stopped);
            }

            match resolve_sources_with(&metadata, &index).attribute(document) {
                Ok(sources) => checked.files.push(CheckedFile {
                    document,
                    metadata,
                    sources,
                }),
                Err(error) => {
                    tracing::warn!(%error, "Could not resolve metadata sources");
                    checked.errors.add(error.into());
                }
            }
        }

        tracing::info!(
            resolved = checked.files.len(),
            failed = checked.errors.len(),
            "Checked submitted files"
        );
        Ok(checked)
    }

    /// Checks the files stored in `repository` for `address` on `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the repository has nothing for the address, or for
    /// any of the reasons that [`Self::check_files`] does.
    pub fn check_address_files(
        &self,
        repository: &dyn ArtifactRepository,
        chain: &Chain,
        address: &str,
    ) -> Result<CheckedFiles> {
        let artifacts = intake::stored_artifacts(repository, chain.name(), address)?;
        self.check_files(&artifacts)
    }

    /// Recompiles the target contract of `metadata` from its resolved
    /// `sources`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the contract cannot be recompiled.
    pub async fn recompile(
        &self,
        metadata: &CompilerMetadata,
        sources: &SourceSet,
    ) -> Result<RecompilationResult> {
        Ok(self.recompiler.recompile(metadata, sources).await?)
    }

    /// Finds the first of `addresses` on `chain` whose deployed code matches
    /// the `compiled` runtime bytecode.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the chain is not known to the verifier, or if the
    /// watchdog requests a stop.
    pub async fn match_bytecode_to_address(
        &self,
        chain: &Chain,
        addresses: &[String],
        compiled: &str,
    ) -> Result<Match> {
        let provider = self.providers.get(chain)?;
        matcher::match_bytecode_to_address(
            &**provider,
            addresses,
            compiled,
            &self.config,
            &*self.watchdog,
        )
        .await
    }

    /// Compares the `deployed` bytecode with the `compiled` bytecode, as
    /// configured for this verifier.
    #[must_use]
    pub fn compare_bytecodes(&self, deployed: Option<&str>, compiled: &str) -> Option<MatchStatus> {
        compare_bytecodes_with(deployed, compiled, self.config.allow_partial_matches)
    }

    /// Verifies every metadata document among `artifacts` against the
    /// candidate `addresses` on `chain`.
    ///
    /// Returns one outcome per metadata document, in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the chain is not known to the verifier, or for any of
    /// the reasons that [`Self::check_files`] does.
    pub async fn verify(
        &self,
        artifacts: &[RawArtifact],
        chain: &Chain,
        addresses: &[String],
    ) -> Result<Vec<Outcome>> {
        self.providers.get(chain)?;
        let checked = self.check_files(artifacts)?;

        let failed: Vec<Outcome> = checked
            .errors()
            .payloads()
            .iter()
            .map(|error| Outcome {
                document: error.document,
                result:   Err(error.payload.clone()),
            })
            .collect();

        let mut verified = Vec::with_capacity(checked.files().len());
        for file in checked {
            if self.watchdog.should_stop() {
                return Err(Error::Stopped);
            }
            let result = self.verify_file(&file, chain, addresses).await;
            if matches!(result, Err(Error::Stopped)) {
                return Err(Error::Stopped);
            }
            verified.push(Outcome {
                document: file.document,
                result,
            });
        }

        Ok(failed
            .into_iter()
            .chain(verified)
            .sorted_by_key(|outcome| outcome.document)
            .collect())
    }

    async fn verify_file(
        &self,
        file: &CheckedFile,
        chain: &Chain,
        addresses: &[String],
    ) -> Result<Verified> {
        let (file_name, contract_name) = file.metadata.compilation_target()?;
        let file_name = file_name.to_string();
        let contract_name = contract_name.to_string();

        let compilation = self.recompile(&file.metadata, &file.sources).await?;
        let matched = self
            .match_bytecode_to_address(chain, addresses, &compilation.deployed_bytecode)
            .await?;

        if matched.is_match() {
            tracing::info!(file = %file_name, contract = %contract_name, ?matched, "Verified contract");
        } else {
            tracing::info!(file = %file_name, contract = %contract_name, "No candidate address matched");
        }

        Ok(Verified {
            file_name,
            contract_name,
            compilation,
            matched,
        })
    }
}
