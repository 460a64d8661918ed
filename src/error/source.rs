//! This module contains the error type that pertains to reconstructing the
//! source files referenced by a metadata document.

use thiserror::Error;

/// Errors that occur while resolving the sources of one metadata document.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Invalid content for file {file}")]
    InvalidContent { file: String },

    #[error(
        "The metadata file mentions a source file called \"{file}\" that cannot be found in your \
         upload.\nIts keccak256 hash is {hash}. Please try to find it and include it in the \
         upload."
    )]
    MissingSource { file: String, hash: String },
}

/// The result type for functions that may return source errors.
pub type Result<T> = std::result::Result<T, Error>;
