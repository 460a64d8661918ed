//! A command-line front end to the contract verifier.
//!
//! # Commands
//!
//! - `check <FILES>...` - Find the metadata documents among the files and
//!   resolve their sources
//! - `compare <DEPLOYED> <COMPILED>` - Grade a pair of hex-encoded bytecodes
//! - `verify --chain <CHAIN> --rpc-url <URL> --address <ADDRESS>... <FILES>...`
//!   - Recompile the files and search the addresses for the deployed contract
//!
//! Log output goes to stderr and honours `RUST_LOG`, while results are
//! printed to stdout as JSON.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use contract_verifier::{
    chain::{rpc::JsonRpcProvider, Chain, ChainProviders},
    compiler::{
        solc::{SolcConfig, SolcReleases},
        CompilerDistribution,
    },
    intake::RawArtifact,
    verifier::{Config, Verifier},
    watchdog::LazyWatchdog,
};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Verifies that deployed contracts were compiled from the given sources.
#[derive(Debug, Parser)]
#[command(name = "contract-verifier")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Find the metadata documents among the files and resolve their
    /// sources.
    Check {
        /// The uploaded files: metadata documents and sources
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Compare deployed bytecode with recompiled bytecode.
    Compare {
        /// The hex-encoded deployed bytecode
        deployed: String,

        /// The hex-encoded recompiled bytecode
        compiled: String,

        #[command(flatten)]
        options: MatchOptions,
    },

    /// Recompile the files and search the candidate addresses for the
    /// deployed contract.
    Verify {
        /// The name of the chain the contract is deployed on
        #[arg(long, env = "VERIFIER_CHAIN", default_value = "mainnet")]
        chain: String,

        /// The JSON-RPC endpoint of a node on the chain
        #[arg(long, env = "VERIFIER_RPC_URL")]
        rpc_url: String,

        /// A candidate address, in order of preference (repeatable)
        #[arg(long = "address", required = true)]
        addresses: Vec<String>,

        /// The directory in which downloaded compilers are cached
        #[arg(long, env = "VERIFIER_SOLC_CACHE_DIR", default_value = ".solc-cache")]
        solc_cache_dir: PathBuf,

        /// Seconds to allow for obtaining a compiler release
        #[arg(long, default_value_t = 120)]
        load_timeout: u64,

        /// Seconds to allow for a single compilation
        #[arg(long, default_value_t = 300)]
        compile_timeout: u64,

        /// Seconds to wait for the code at a single address
        #[arg(long, default_value_t = 30)]
        rpc_timeout: u64,

        /// How many addresses to fetch code for at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        #[command(flatten)]
        options: MatchOptions,

        /// The uploaded files: metadata documents and sources
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct MatchOptions {
    /// Only report perfect matches
    #[arg(long)]
    no_partial: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { files } => check(&files).await,
        Commands::Compare {
            deployed,
            compiled,
            options,
        } => {
            let config = Config::default().with_partial_matches(!options.no_partial);
            let verifier = offline_verifier(config);
            let status = verifier.compare_bytecodes(Some(deployed.as_str()), &compiled);
            println!("{}", json!({ "status": status }));
            Ok(())
        }
        Commands::Verify {
            chain,
            rpc_url,
            addresses,
            solc_cache_dir,
            load_timeout,
            compile_timeout,
            rpc_timeout,
            concurrency,
            options,
            files,
        } => {
            let rpc_timeout = Duration::from_secs(rpc_timeout);
            let config = Config::default()
                .with_compiler_load_timeout(Duration::from_secs(load_timeout))
                .with_compile_timeout(Duration::from_secs(compile_timeout))
                .with_match_concurrency(concurrency)
                .with_rpc_timeout(rpc_timeout)
                .with_partial_matches(!options.no_partial);
            let chain = Chain::new(chain);
            let provider = JsonRpcProvider::with_timeout(rpc_url, rpc_timeout)?;
            let providers = ChainProviders::new().with(chain.clone(), Arc::new(provider));
            let releases = SolcReleases::new(SolcConfig::new(solc_cache_dir));
            let verifier = Verifier::new(Arc::new(releases), providers, config, LazyWatchdog.in_arc());

            verify(&verifier, &files, &chain, &addresses).await
        }
    }
}

async fn check(files: &[PathBuf]) -> Result<()> {
    let artifacts = read_artifacts(files).await?;
    let checked = offline_verifier(Config::default()).check_files(&artifacts)?;

    for error in checked.errors().payloads() {
        tracing::warn!(%error, "Document could not be resolved");
    }
    println!("{}", serde_json::to_string_pretty(&checked)?);

    Ok(())
}

async fn verify(
    verifier: &Verifier,
    files: &[PathBuf],
    chain: &Chain,
    addresses: &[String],
) -> Result<()> {
    let artifacts = read_artifacts(files).await?;
    let outcomes = verifier.verify(&artifacts, chain, addresses).await?;

    let report: Vec<_> = outcomes
        .into_iter()
        .map(|outcome| match outcome.result {
            Ok(verified) => json!({ "document": outcome.document, "verified": verified }),
            Err(error) => json!({ "document": outcome.document, "error": error.to_string() }),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Creates a verifier for commands that never compile or touch a chain.
fn offline_verifier(config: Config) -> Verifier {
    let releases: Arc<dyn CompilerDistribution> =
        Arc::new(SolcReleases::new(SolcConfig::new(std::env::temp_dir())));
    Verifier::new(releases, ChainProviders::new(), config, LazyWatchdog.in_arc())
}

async fn read_artifacts(paths: &[PathBuf]) -> Result<Vec<RawArtifact>> {
    let mut artifacts = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Could not read {}", path.display()))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        artifacts.push(RawArtifact::named(name, data));
    }
    Ok(artifacts)
}
