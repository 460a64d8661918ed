//! This module contains the types of the `solc --standard-json` output, as far
//! as verification needs them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    constant::HEX_PREFIX,
    error::compile::{Error, Result},
};

/// The standard-JSON output of the compiler.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CompilerOutput {
    /// The compiled contracts, by file name and then contract name.
    #[serde(default)]
    pub contracts: BTreeMap<String, BTreeMap<String, Contract>>,

    /// The errors and warnings emitted during compilation.
    #[serde(default)]
    pub errors: Vec<Diagnostic>,
}

impl CompilerOutput {
    /// Parses the `raw` output of the compiler for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `raw` is not valid compiler output.
    pub fn parse(raw: &str, version: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidOutput {
            version: version.to_string(),
            reason:  e.to_string(),
        })
    }

    /// Takes the artifacts of `contract` from `file` out of the output.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the contract, or any of the artifacts verification
    /// needs, is absent. The compiler's error diagnostics are attached, as
    /// they usually explain the absence.
    pub fn into_result(mut self, file: &str, contract: &str) -> Result<RecompilationResult> {
        let found = self
            .contracts
            .get_mut(file)
            .and_then(|contracts| contracts.remove(contract));

        let artifacts = found.and_then(|c| {
            let metadata = c.metadata?;
            let evm = c.evm?;
            Some((metadata, evm.bytecode?.object, evm.deployed_bytecode?.object))
        });

        match artifacts {
            Some((metadata, bytecode, deployed_bytecode)) => Ok(RecompilationResult {
                bytecode:          with_hex_prefix(&bytecode),
                deployed_bytecode: with_hex_prefix(&deployed_bytecode),
                metadata:          metadata.trim().to_string(),
            }),
            None => Err(Error::CompilationOutput {
                file:     file.to_string(),
                contract: contract.to_string(),
                errors:   self
                    .errors
                    .iter()
                    .filter(|d| d.is_error())
                    .map(Diagnostic::describe)
                    .collect(),
            }),
        }
    }
}

/// A single compiled contract in the output.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Contract {
    /// The metadata document the compiler emitted for this build.
    #[serde(default)]
    pub metadata: Option<String>,

    /// The EVM artifacts.
    #[serde(default)]
    pub evm: Option<Evm>,
}

/// The EVM artifacts of a compiled contract.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evm {
    #[serde(default)]
    pub bytecode: Option<Bytecode>,

    #[serde(default)]
    pub deployed_bytecode: Option<Bytecode>,
}

/// A bytecode object, hex-encoded without a prefix.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Bytecode {
    pub object: String,
}

/// An error or warning emitted by the compiler.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    #[serde(default)]
    pub severity: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub formatted_message: Option<String>,
}

impl Diagnostic {
    /// Checks if the diagnostic is an error rather than a warning or info.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == "error"
    }

    /// Gets the most descriptive message available for the diagnostic.
    #[must_use]
    pub fn describe(&self) -> String {
        self.formatted_message
            .as_deref()
            .unwrap_or(&self.message)
            .trim()
            .to_string()
    }
}

/// The artifacts of recompiling the target contract of a metadata document.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecompilationResult {
    /// The creation bytecode, `0x`-prefixed.
    pub bytecode: String,

    /// The runtime bytecode, `0x`-prefixed. This is what is compared against
    /// the code deployed on chain.
    pub deployed_bytecode: String,

    /// The metadata document emitted by the recompilation.
    pub metadata: String,
}

fn with_hex_prefix(object: &str) -> String {
    if object.starts_with(HEX_PREFIX) {
        object.to_string()
    } else {
        format!("{HEX_PREFIX}{object}")
    }
}
