//! This module contains the default [`CompilerDistribution`], which runs native
//! `solc` releases as published at [binaries.soliditylang.org](https://binaries.soliditylang.org).
//!
//! Releases are looked up by their exact `longVersion` in the platform's
//! release list, checked against the Keccak-256 hash recorded in that list,
//! and cached on disk so that each release is downloaded at most once.

use std::{
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{io::AsyncWriteExt, process::Command};

use crate::{
    compiler::{check_release_version, Compiler, CompilerDistribution, DynCompiler},
    constant::{DEFAULT_SOLC_BINARIES_URL, SOLC_EXECUTABLE_NAME, SOLC_RELEASE_LIST_FILE},
    error::compile::{Error, Result},
    utility::{keccak256_hex, normalize_hex},
};

/// The platforms for which native compiler releases are published.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Platform {
    LinuxAmd64,
    MacosAmd64,
    WindowsAmd64,
}

impl Platform {
    /// Gets the platform that the current process is running on, if releases
    /// are published for it.
    #[must_use]
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self::LinuxAmd64)
        } else if cfg!(target_os = "macos") {
            Some(Self::MacosAmd64)
        } else if cfg!(target_os = "windows") {
            Some(Self::WindowsAmd64)
        } else {
            None
        }
    }

    /// Gets the name of the directory in which the platform's releases are
    /// published.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinuxAmd64 => "linux-amd64",
            Self::MacosAmd64 => "macosx-amd64",
            Self::WindowsAmd64 => "windows-amd64",
        }
    }
}

/// The configuration for the native `solc` distribution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SolcConfig {
    /// The directory in which downloaded releases are kept.
    pub cache_dir: PathBuf,

    /// The platform whose releases are downloaded.
    ///
    /// Defaults to [`Platform::current`], falling back to
    /// [`Platform::LinuxAmd64`].
    pub platform: Platform,

    /// The base URL that releases are downloaded from.
    ///
    /// Defaults to [`DEFAULT_SOLC_BINARIES_URL`].
    pub binaries_url: String,
}

impl SolcConfig {
    /// Creates a configuration that caches releases in `cache_dir`.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        let platform = Platform::current().unwrap_or(Platform::LinuxAmd64);
        let binaries_url = DEFAULT_SOLC_BINARIES_URL.to_string();
        Self {
            cache_dir,
            platform,
            binaries_url,
        }
    }

    /// Sets the `platform` config parameter to `value`.
    #[must_use]
    pub fn with_platform(mut self, value: Platform) -> Self {
        self.platform = value;
        self
    }

    /// Sets the `binaries_url` config parameter to `value`.
    #[must_use]
    pub fn with_binaries_url(mut self, value: impl Into<String>) -> Self {
        self.binaries_url = value.into();
        self
    }

    fn platform_url(&self) -> String {
        format!(
            "{}/{}",
            self.binaries_url.trim_end_matches('/'),
            self.platform.as_str()
        )
    }
}

/// The release list published for each platform.
#[derive(Clone, Debug, Deserialize)]
struct ReleaseList {
    builds: Vec<ReleaseBuild>,
}

/// A single release in the release list.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseBuild {
    path:         String,
    long_version: String,
    keccak256:    String,
}

/// Native `solc` releases, downloaded on demand and cached on disk.
#[derive(Clone, Debug)]
pub struct SolcReleases {
    config: SolcConfig,
    client: reqwest::Client,
}

impl SolcReleases {
    /// Creates a new distribution with the provided `config`.
    #[must_use]
    pub fn new(config: SolcConfig) -> Self {
        let client = reqwest::Client::new();
        Self { config, client }
    }

    /// Gets the path at which the release with `version` is cached.
    ///
    /// The `version` is joined onto the cache directory as is, so it must
    /// already have passed [`check_release_version`].
    #[must_use]
    pub fn executable_path(&self, version: &str) -> PathBuf {
        let name = match self.config.platform {
            Platform::WindowsAmd64 => format!("{SOLC_EXECUTABLE_NAME}.exe"),
            _ => SOLC_EXECUTABLE_NAME.to_string(),
        };
        self.config
            .cache_dir
            .join(self.config.platform.as_str())
            .join(version)
            .join(name)
    }

    async fn find_release(&self, version: &str) -> Result<ReleaseBuild> {
        let url = format!("{}/{SOLC_RELEASE_LIST_FILE}", self.config.platform_url());
        let list: ReleaseList = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::load(version, format!("could not fetch {url}: {e}")))?
            .json()
            .await
            .map_err(|e| Error::load(version, format!("could not read {url}: {e}")))?;

        list.builds
            .into_iter()
            .find(|build| build.long_version == version)
            .ok_or_else(|| {
                Error::load(
                    version,
                    format!("no release is published for {}", self.config.platform.as_str()),
                )
            })
    }

    async fn download(&self, version: &str, build: &ReleaseBuild) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.config.platform_url(), build.path);
        tracing::info!(version, %url, "Downloading compiler release");

        let bytes = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::load(version, format!("could not download {url}: {e}")))?
            .bytes()
            .await
            .map_err(|e| Error::load(version, format!("could not download {url}: {e}")))?;

        if normalize_hex(&keccak256_hex(&bytes)) != normalize_hex(&build.keccak256) {
            return Err(Error::load(
                version,
                format!("the download from {url} does not match its published keccak256 hash"),
            ));
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl CompilerDistribution for SolcReleases {
    async fn load_version(&self, version: &str) -> Result<DynCompiler> {
        check_release_version(version)?;
        let path = self.executable_path(version);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(version, path = %path.display(), "Using cached compiler release");
        } else {
            let build = self.find_release(version).await?;
            let bytes = self.download(version, &build).await?;

            let target = path.clone();
            tokio::task::spawn_blocking(move || install_executable(&target, &bytes))
                .await
                .map_err(|e| Error::load(version, e))?
                .map_err(|e| {
                    Error::load(version, format!("could not write {}: {e}", path.display()))
                })?;
        }

        Ok(Arc::new(SolcBinary::new(version, path)))
    }
}

/// Writes `bytes` to `path` as an executable, atomically, so that a partial
/// download is never mistaken for a cached release.
fn install_executable(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o755))?;
    }

    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// A native `solc` executable, invoked in standard-JSON mode.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SolcBinary {
    version: String,
    path:    PathBuf,
}

impl SolcBinary {
    /// Wraps the executable at `path`, which must be the compiler with exactly
    /// `version`.
    #[must_use]
    pub fn new(version: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let version = version.into();
        let path = path.into();
        Self { version, path }
    }

    /// Gets the path of the executable.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Compiler for SolcBinary {
    fn version(&self) -> &str {
        &self.version
    }

    async fn compile(&self, input: &str) -> Result<String> {
        // The process is killed if this future is dropped, which is what
        // happens when the caller's timeout expires.
        let mut child = Command::new(&self.path)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::load(
                    &self.version,
                    format!("could not start {}: {e}", self.path.display()),
                )
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| self.invalid_output(format!("could not write input: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.invalid_output(format!("could not read output: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.invalid_output(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout).map_err(|e| self.invalid_output(e))
    }
}

impl SolcBinary {
    fn invalid_output(&self, reason: impl ToString) -> Error {
        Error::InvalidOutput {
            version: self.version.clone(),
            reason:  reason.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use crate::{
        compiler::{
            solc::{install_executable, Platform, SolcConfig, SolcReleases},
            CompilerDistribution,
        },
        error::compile,
    };

    #[test]
    fn lays_out_the_cache_by_platform_and_version() {
        let config = SolcConfig::new("/tmp/solc").with_platform(Platform::LinuxAmd64);
        let releases = SolcReleases::new(config);

        assert_eq!(
            releases.executable_path("0.6.1+commit.e6f7d5a4"),
            Path::new("/tmp/solc/linux-amd64/0.6.1+commit.e6f7d5a4/solc")
        );
    }

    #[test]
    fn builds_platform_urls() {
        let config = SolcConfig::new("/tmp/solc")
            .with_platform(Platform::MacosAmd64)
            .with_binaries_url("https://example.org/");

        assert_eq!(config.platform_url(), "https://example.org/macosx-amd64");
    }

    #[test]
    fn installs_executables_atomically() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("linux-amd64").join("0.8.0").join("solc");

        install_executable(&path, b"#!/bin/sh\n")?;

        assert_eq!(std::fs::read(&path)?, b"#!/bin/sh\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path)?.permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        Ok(())
    }

    #[tokio::test]
    async fn never_runs_executables_outside_the_cache() -> anyhow::Result<()> {
        let cache = tempfile::tempdir()?;
        let outside = tempfile::tempdir()?;
        let planted = outside.path().join("planted");
        install_executable(&planted.join("solc"), b"#!/bin/sh\n")?;

        let config = SolcConfig::new(cache.path())
            .with_platform(Platform::LinuxAmd64)
            .with_binaries_url("http://127.0.0.1:9");
        let releases = SolcReleases::new(config);

        let traversal = format!("../../{}/planted", outside.path().display());
        let absolute = planted.display().to_string();
        for version in [traversal, absolute] {
            let result = releases.load_version(&version).await;
            assert!(matches!(
                result,
                Err(compile::Error::CompilerLoad { reason, .. }) if reason == "not a compiler release version"
            ));
        }

        Ok(())
    }
}
