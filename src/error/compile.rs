//! This module contains the error type that pertains to building the compiler
//! input and running the compiler.

use thiserror::Error;

/// Errors that occur while recompiling the sources of a metadata document.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error(
        "Could not determine compilation target from metadata: expected exactly one target, found \
         {found}"
    )]
    NoCompilationTarget { found: usize },

    #[error("Could not load compiler version {version}: {reason}")]
    CompilerLoad { version: String, reason: String },

    #[error(
        "Contract {contract} from {file} is absent from the output of the compiler{}",
        describe_diagnostics(.errors)
    )]
    CompilationOutput {
        file:     String,
        contract: String,
        errors:   Vec<String>,
    },

    #[error("Compiler version {version} produced output that could not be parsed: {reason}")]
    InvalidOutput { version: String, reason: String },

    #[error("Could not serialize the compiler input: {_0}")]
    InvalidInput(String),
}

impl Error {
    /// Constructs a compiler load error for `version` with the provided
    /// `reason`.
    pub fn load(version: impl Into<String>, reason: impl ToString) -> Self {
        Self::CompilerLoad {
            version: version.into(),
            reason:  reason.to_string(),
        }
    }
}

/// The result type for functions that may return compile errors.
pub type Result<T> = std::result::Result<T, Error>;

fn describe_diagnostics(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(": {}", errors.join("; "))
    }
}
