//! This module contains the recompiler, which obtains the exact compiler
//! release named by a metadata document and reruns the original build.
//!
//! # Compiler Releases
//!
//! Compiler releases are obtained through a [`CompilerDistribution`], and are
//! always requested by their exact version string. Even patch-level
//! differences between compilers can change the emitted bytecode, so no form
//! of version range resolution is ever performed.
//!
//! Loaded compilers are held in a process-wide [`CompilerCache`]. Loading a
//! given version is a single-flight operation: concurrent requests for the
//! same uncached version share one download. Both loading and compiling are
//! bounded in time, so a hung download cannot stall a verification
//! indefinitely.

pub mod output;
pub mod solc;

use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, LazyLock},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::OnceCell;

pub use self::output::RecompilationResult;
use crate::{
    compiler::output::CompilerOutput,
    constant::{DEFAULT_COMPILER_LOAD_TIMEOUT, DEFAULT_COMPILE_TIMEOUT, RELEASE_VERSION_PATTERN},
    error::compile::{Error, Result},
    input::build_input,
    metadata::CompilerMetadata,
    source::SourceSet,
};

/// A loaded compiler release that can be invoked on standard-JSON input.
#[async_trait]
pub trait Compiler
where
    Self: Debug + Send + Sync,
{
    /// Gets the exact version string of the compiler.
    fn version(&self) -> &str;

    /// Compiles the standard-JSON `input`, returning the standard-JSON
    /// output.
    ///
    /// Compilation errors in the sources are reported inside the output, not
    /// as an [`Err`].
    async fn compile(&self, input: &str) -> Result<String>;
}

/// A dynamically dispatched [`Compiler`] instance.
pub type DynCompiler = Arc<dyn Compiler>;

/// A source of compiler releases.
#[async_trait]
pub trait CompilerDistribution
where
    Self: Debug + Send + Sync,
{
    /// Obtains the compiler release whose version is exactly `version`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the release cannot be obtained.
    async fn load_version(&self, version: &str) -> Result<DynCompiler>;
}

/// A single cache slot, filled at most once.
type Slot = Arc<OnceCell<DynCompiler>>;

/// A process-wide cache of loaded compilers, keyed by exact version.
///
/// The cache is safe to share between concurrent verifications. A failed or
/// timed-out load leaves the slot for that version empty, so that a later
/// request can try again.
#[derive(Debug)]
pub struct CompilerCache {
    /// Where compiler releases come from.
    distribution: Arc<dyn CompilerDistribution>,

    /// The maximum amount of time a single load may take.
    load_timeout: Duration,

    /// The slots for every version that has been requested so far.
    loaded: Mutex<HashMap<String, Slot>>,
}

impl CompilerCache {
    /// Creates a new, empty, cache that loads compilers from `distribution`.
    ///
    /// Loads are bounded by [`DEFAULT_COMPILER_LOAD_TIMEOUT`]; see
    /// [`Self::with_load_timeout`].
    #[must_use]
    pub fn new(distribution: Arc<dyn CompilerDistribution>) -> Self {
        let load_timeout = DEFAULT_COMPILER_LOAD_TIMEOUT;
        let loaded = Mutex::new(HashMap::new());
        Self {
            distribution,
            load_timeout,
            loaded,
        }
    }

    /// Sets the maximum amount of time a single load may take to `value`.
    #[must_use]
    pub fn with_load_timeout(mut self, value: Duration) -> Self {
        self.load_timeout = value;
        self
    }

    /// Gets the compiler whose version is exactly `version`, loading it if it
    /// is not yet cached.
    ///
    /// A leading `v` on the version is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `version` is not a release version, or if the
    /// compiler cannot be loaded within the load timeout.
    pub async fn get(&self, version: &str) -> Result<DynCompiler> {
        let version = normalize_version(version);
        check_release_version(version)?;
        let slot = self.slot(version);

        let load = slot.get_or_try_init(|| async {
            tracing::info!(version, "Loading compiler release");
            self.distribution.load_version(version).await
        });
        let compiler = tokio::time::timeout(self.load_timeout, load)
            .await
            .map_err(|_| {
                tracing::warn!(version, timeout = ?self.load_timeout, "Compiler load timed out");
                Error::load(version, format!("timed out after {:?}", self.load_timeout))
            })??;

        Ok(compiler.clone())
    }

    /// Checks if the compiler with exactly `version` has already been loaded.
    #[must_use]
    pub fn is_loaded(&self, version: &str) -> bool {
        self.loaded
            .lock()
            .get(normalize_version(version))
            .is_some_and(|slot| slot.initialized())
    }

    fn slot(&self, version: &str) -> Slot {
        let mut loaded = self.loaded.lock();
        loaded.entry(version.to_string()).or_default().clone()
    }
}

/// The recompiler, responsible for rerunning the original build described by
/// a metadata document.
#[derive(Debug)]
pub struct Recompiler {
    cache:           Arc<CompilerCache>,
    compile_timeout: Duration,
}

impl Recompiler {
    /// Creates a new recompiler that obtains compilers from `cache`.
    ///
    /// Compilation is bounded by [`DEFAULT_COMPILE_TIMEOUT`]; see
    /// [`Self::with_compile_timeout`].
    #[must_use]
    pub fn new(cache: Arc<CompilerCache>) -> Self {
        let compile_timeout = DEFAULT_COMPILE_TIMEOUT;
        Self {
            cache,
            compile_timeout,
        }
    }

    /// Sets the maximum amount of time a single compilation may take to
    /// `value`.
    #[must_use]
    pub fn with_compile_timeout(mut self, value: Duration) -> Self {
        self.compile_timeout = value;
        self
    }

    /// Gets the compiler cache used by this recompiler.
    #[must_use]
    pub fn cache(&self) -> &Arc<CompilerCache> {
        &self.cache
    }

    /// Recompiles the target contract of `metadata` from its resolved
    /// `sources`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the metadata has no single compilation target, if the
    /// compiler cannot be loaded or does not finish in time, or if the target
    /// contract is missing from the compiler's output.
    pub async fn recompile(
        &self,
        metadata: &CompilerMetadata,
        sources: &SourceSet,
    ) -> Result<RecompilationResult> {
        let prepared = build_input(metadata, sources)?;
        let version = normalize_version(metadata.compiler_version());

        tracing::info!(
            file = %prepared.file_name,
            contract = %prepared.contract_name,
            version,
            "Recompiling"
        );

        let compiler = self.cache.get(version).await?;
        let input = prepared.input.to_json()?;
        let raw = tokio::time::timeout(self.compile_timeout, compiler.compile(&input))
            .await
            .map_err(|_| {
                Error::load(
                    version,
                    format!("compilation timed out after {:?}", self.compile_timeout),
                )
            })??;

        CompilerOutput::parse(&raw, version)?
            .into_result(&prepared.file_name, &prepared.contract_name)
    }
}

static RELEASE_VERSION: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(RELEASE_VERSION_PATTERN));

/// Checks that `version` is the exact version of a compiler release.
///
/// Versions come from uploaded metadata and end up in cache paths, so anything
/// else is rejected before a distribution sees it.
///
/// # Errors
///
/// Returns [`Err`] if `version` does not match [`RELEASE_VERSION_PATTERN`].
pub fn check_release_version(version: &str) -> Result<()> {
    let pattern = RELEASE_VERSION
        .as_ref()
        .map_err(|e| Error::load(version, e))?;
    if pattern.is_match(version) {
        Ok(())
    } else {
        tracing::warn!(version, "Rejecting malformed compiler version");
        Err(Error::load(version, "not a compiler release version"))
    }
}

/// Strips surrounding whitespace and a leading `v` from `version`.
fn normalize_version(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed.strip_prefix('v').unwrap_or(trimmed)
}
