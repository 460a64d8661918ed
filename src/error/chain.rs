//! This module contains the error type that pertains to retrieving deployed
//! code from a chain.

use std::time::Duration;

use thiserror::Error;

/// Errors that occur when talking to a chain.
///
/// Apart from [`Error::UnknownChain`], the address matcher treats these as
/// local to a single candidate address and skips that candidate.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("No code provider is configured for chain {_0}")]
    UnknownChain(String),

    #[error("{_0:?} is not a valid address")]
    InvalidAddress(String),

    #[error("The node returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Request to the node failed: {_0}")]
    Transport(String),

    #[error("The node returned a malformed response: {_0}")]
    MalformedResponse(String),

    #[error("The node did not respond within {_0:?}")]
    Timeout(Duration),
}

/// The result type for functions that may return chain errors.
pub type Result<T> = std::result::Result<T, Error>;
