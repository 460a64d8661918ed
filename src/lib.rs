//! This library implements source verification for contracts deployed on
//! [EVM](https://ethereum.org/en/developers/docs/evm/) chains. It establishes
//! that the bytecode at an address was produced by compiling a disclosed set
//! of Solidity sources with a specific compiler release and settings.
//!
//! # How it Works
//!
//! From a very high level, verification proceeds as follows:
//!
//! 1. The uploaded files are classified into [`intake::ClassifiedFile`]s, and
//!    the compiler metadata documents among them are selected.
//! 2. For each [`metadata::CompilerMetadata`], the sources it names are
//!    reconstructed into a [`source::SourceSet`], either from the metadata
//!    itself or from the other uploaded files by their keccak-256 hash.
//! 3. The metadata and sources are turned into the standard-JSON
//!    [`input::CompilerInput`] that reproduces the original build.
//! 4. The exact compiler release named by the metadata is obtained and run by
//!    the [`compiler::Recompiler`].
//! 5. The recompiled runtime bytecode is compared with the code deployed at
//!    each candidate address, and the first address that matches is
//!    reported along with a [`bytecode::MatchStatus`].
//!
//! # Basic Usage
//!
//! For the most basic usage of the library, it is sufficient to construct a
//! [`Verifier`] and call [`Verifier::verify`], passing the uploaded files.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use contract_verifier::{
//!     chain::{rpc::JsonRpcProvider, Chain, ChainProviders},
//!     compiler::solc::{SolcConfig, SolcReleases},
//!     intake::RawArtifact,
//!     verifier::Config,
//!     watchdog::LazyWatchdog,
//!     Verifier,
//! };
//!
//! # async fn run() -> contract_verifier::error::Result<()> {
//! let releases = SolcReleases::new(SolcConfig::new("/tmp/solc-cache"));
//! let providers = ChainProviders::new().with(
//!     "mainnet",
//!     Arc::new(JsonRpcProvider::new("http://localhost:8545")?),
//! );
//! let verifier = Verifier::new(
//!     Arc::new(releases),
//!     providers,
//!     Config::default(),
//!     LazyWatchdog.in_arc(),
//! );
//!
//! let files = vec![
//!     RawArtifact::named("metadata.json", std::fs::read("metadata.json").unwrap()),
//!     RawArtifact::named("Token.sol", std::fs::read("Token.sol").unwrap()),
//! ];
//! let addresses = vec!["0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".to_string()];
//!
//! for outcome in verifier.verify(&files, &Chain::from("mainnet"), &addresses).await? {
//!     println!("{}: {:?}", outcome.document, outcome.result);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming

pub mod bytecode;
pub mod chain;
pub mod compiler;
pub mod constant;
pub mod error;
pub mod input;
pub mod intake;
pub mod matcher;
pub mod metadata;
pub mod source;
pub mod utility;
pub mod verifier;
pub mod watchdog;

// Re-exports to provide the library interface.
pub use bytecode::{compare_bytecodes, MatchStatus};
pub use matcher::Match;
pub use verifier::{CheckedFiles, Verifier};
