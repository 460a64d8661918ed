//! This module contains common utilities for simplifying the writing of
//! integration tests for this library.
//!
//! Nothing here touches the network or runs a real compiler: the compiler,
//! its distribution, the chain and the artifact repository are all stubbed.

#![cfg(test)]
#![allow(unused)] // Each test binary uses a different subset

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use contract_verifier::{
    chain::{ChainProviders, CodeProvider},
    compiler::{Compiler, CompilerDistribution, DynCompiler},
    error::{chain, compile},
    intake::{ArtifactRepository, RawArtifact},
    utility::{keccak256_hex, to_checksum_address},
    verifier::{Config, Verifier},
    watchdog::LazyWatchdog,
};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

/// The chain that [`new_verifier`] registers its stub provider for.
pub const CHAIN: &str = "mainnet";

/// The compiler release used by the fixtures.
pub const VERSION: &str = "0.8.19+commit.7dd6d404";

pub const TOKEN_FILE: &str = "contracts/Token.sol";
pub const TOKEN_SOURCE: &str = "pragma solidity ^0.8.19;\n\ncontract Token {}\n";

pub const LIBRARY_FILE: &str = "contracts/Math.sol";
pub const LIBRARY_SOURCE: &str = "pragma solidity ^0.8.19;\n\nlibrary Math {}\n";

/// The runtime code of the fixture contract, without its metadata section.
pub const RUNTIME: &str = "6080604052348015600f57600080fd5b50";

/// Sources containing this marker fail to compile.
pub const SYNTAX_ERROR: &str = "syntax error";

pub const ADDRESS_A: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
pub const ADDRESS_B: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";

/// Builds hex-encoded bytecode consisting of `runtime` followed by a CBOR
/// metadata section whose IPFS hash is made of `hash_byte`.
pub fn with_metadata(runtime: &str, hash_byte: &str) -> String {
    let cbor = format!(
        "a2646970667358221220{}64736f6c6343000813",
        hash_byte.repeat(32)
    );
    let length = cbor.len() / 2;
    format!("{runtime}{cbor}{length:04x}")
}

/// Builds a metadata document targeting `contract` in `file`, whose `sources`
/// are referenced only by their hashes.
pub fn metadata_referencing(file: &str, contract: &str, sources: &[(&str, &str)]) -> String {
    let sources: Map<String, Value> = sources
        .iter()
        .map(|(name, content)| {
            (
                (*name).to_string(),
                json!({ "keccak256": keccak256_hex(content), "urls": [] }),
            )
        })
        .collect();
    metadata_document(file, contract, sources)
}

/// Builds a metadata document targeting `contract` in `file`, with the
/// `sources` embedded in it.
pub fn metadata_embedding(file: &str, contract: &str, sources: &[(&str, &str)]) -> String {
    let sources: Map<String, Value> = sources
        .iter()
        .map(|(name, content)| {
            (
                (*name).to_string(),
                json!({ "keccak256": keccak256_hex(content), "content": content }),
            )
        })
        .collect();
    metadata_document(file, contract, sources)
}

fn metadata_document(file: &str, contract: &str, sources: Map<String, Value>) -> String {
    json!({
        "compiler": { "version": VERSION },
        "language": "Solidity",
        "output": { "abi": [] },
        "settings": {
            "compilationTarget": { file: contract },
            "evmVersion": "paris",
            "libraries": {},
            "metadata": { "bytecodeHash": "ipfs" },
            "optimizer": { "enabled": true, "runs": 200 },
            "remappings": []
        },
        "sources": sources,
        "version": 1
    })
    .to_string()
}

/// A compiler that emits `deployed` as the runtime code of every contract
/// selected in its input, and remembers the inputs it was given.
#[derive(Debug)]
pub struct StubCompiler {
    version:  String,
    deployed: String,
    inputs:   Mutex<Vec<Value>>,
}

impl StubCompiler {
    pub fn new(version: impl Into<String>, deployed: impl Into<String>) -> Self {
        Self {
            version:  version.into(),
            deployed: deployed.into(),
            inputs:   Mutex::new(vec![]),
        }
    }

    /// Gets the inputs the compiler has been invoked with so far.
    pub fn inputs(&self) -> Vec<Value> {
        self.inputs.lock().clone()
    }
}

#[async_trait]
impl Compiler for StubCompiler {
    fn version(&self) -> &str {
        &self.version
    }

    async fn compile(&self, input: &str) -> compile::Result<String> {
        let input: Value = serde_json::from_str(input)
            .map_err(|e| compile::Error::InvalidInput(e.to_string()))?;
        self.inputs.lock().push(input.clone());

        let broken = input["sources"]
            .as_object()
            .into_iter()
            .flat_map(Map::values)
            .filter_map(|source| source["content"].as_str())
            .any(|content| content.contains(SYNTAX_ERROR));
        if broken {
            let output = json!({
                "errors": [
                    { "severity": "warning", "message": "Unused variable." },
                    { "severity": "error", "message": "ParserError: Expected ';' but got '}'" }
                ]
            });
            return Ok(output.to_string());
        }

        let mut contracts = Map::new();
        let selection = input["settings"]["outputSelection"].as_object();
        for (file, selected) in selection.into_iter().flatten() {
            let compiled: Map<String, Value> = selected
                .as_object()
                .into_iter()
                .flat_map(Map::keys)
                .filter(|contract| !contract.is_empty() && *contract != "*")
                .map(|contract| {
                    let artifacts = json!({
                        "metadata": " {\"compiler\":{\"version\":\"stub\"}}\n",
                        "evm": {
                            "bytecode": { "object": format!("6080{}", self.deployed) },
                            "deployedBytecode": { "object": self.deployed }
                        }
                    });
                    (contract.clone(), artifacts)
                })
                .collect();
            contracts.insert(file.clone(), Value::Object(compiled));
        }

        Ok(json!({ "contracts": contracts }).to_string())
    }
}

/// A distribution that serves a fixed set of stub compilers, counting how
/// many times it is asked for one.
#[derive(Debug, Default)]
pub struct StubDistribution {
    compilers: HashMap<String, Arc<StubCompiler>>,
    loads:     AtomicUsize,
}

impl StubDistribution {
    pub fn with(mut self, compiler: Arc<StubCompiler>) -> Self {
        self.compilers.insert(compiler.version().to_string(), compiler);
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompilerDistribution for StubDistribution {
    async fn load_version(&self, version: &str) -> compile::Result<DynCompiler> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let compiler: DynCompiler = self
            .compilers
            .get(version)
            .cloned()
            .ok_or_else(|| compile::Error::load(version, "no such release"))?;
        Ok(compiler)
    }
}

/// A chain with fixed code at a fixed set of addresses. Every other address
/// has no code.
#[derive(Debug, Default)]
pub struct StubChain {
    code:     HashMap<String, String>,
    requests: AtomicUsize,
}

impl StubChain {
    pub fn with(mut self, address: &str, code: impl Into<String>) -> Self {
        let address = to_checksum_address(address).expect("fixture addresses are valid");
        self.code.insert(address, code.into());
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeProvider for StubChain {
    async fn get_code(&self, address: &str) -> chain::Result<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .code
            .get(address)
            .cloned()
            .unwrap_or_else(|| "0x".to_string()))
    }
}

/// An in-memory store of previously submitted files.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    files: HashMap<(String, String), Vec<RawArtifact>>,
}

impl MemoryRepository {
    pub fn with(mut self, chain: &str, address: &str, files: Vec<RawArtifact>) -> Self {
        self.files
            .insert((chain.to_string(), address.to_string()), files);
        self
    }
}

impl ArtifactRepository for MemoryRepository {
    fn files_for(&self, chain: &str, address: &str) -> Option<Vec<RawArtifact>> {
        self.files
            .get(&(chain.to_string(), address.to_string()))
            .cloned()
    }
}

/// Constructs a verifier that compiles with `distribution` and reads code
/// from `chain`, registered as [`CHAIN`].
pub fn new_verifier(
    distribution: Arc<StubDistribution>,
    chain: Arc<StubChain>,
    config: Config,
) -> Verifier {
    let providers = ChainProviders::new().with(CHAIN, chain);
    Verifier::new(distribution, providers, config, LazyWatchdog.in_arc())
}

/// Constructs a verifier for tests that never compile or touch a chain.
pub fn offline_verifier() -> Verifier {
    new_verifier(
        Arc::new(StubDistribution::default()),
        Arc::new(StubChain::default()),
        Config::default(),
    )
}

/// Gets `address` in checksummed form.
pub fn checksummed(address: &str) -> anyhow::Result<String> {
    Ok(to_checksum_address(address)?)
}
