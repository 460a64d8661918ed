//! This module contains the primary error type for the verifier's interface.
//! It also re-exports the more specific error types that are
//! subsystem-specific.

pub mod chain;
pub mod compile;
pub mod container;
pub mod intake;
pub mod source;

use thiserror::Error;

/// The interface result type for the library.
///
/// # Usage
///
/// Any function considered to be part of the public interface of the library
/// should return this result type. Subsystems should return the more-specific
/// child error types as appropriate.
pub type Result<T> = std::result::Result<T, Error>;

/// The interface error type for the library.
///
/// All errors returned from the library interface (and hence encountered by the
/// clients of the library) should be members of this enum.
///
/// The messages of these errors are intended to be shown to the submitter of
/// the files, and carry enough context (file names, hashes, compiler versions)
/// for them to correct their submission.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// Errors that come from ingesting and classifying the uploaded files.
    #[error(transparent)]
    Intake(#[from] intake::Error),

    /// Errors from reconstructing the sources named by a metadata document.
    #[error(transparent)]
    Source(#[from] source::Error),

    /// Errors from building the compiler input and running the compiler.
    #[error(transparent)]
    Compile(#[from] compile::Error),

    /// Errors from talking to the chain.
    #[error(transparent)]
    Chain(#[from] chain::Error),

    /// The verification was asked to stop by its watchdog.
    #[error("Verification was stopped before it could complete")]
    Stopped,
}

/// A library error attributed to the metadata document that caused it.
pub type DocumentError = container::Attributed<Error>;

/// A container of the per-document errors encountered in a batch submission.
pub type DocumentErrors = container::Errors<DocumentError>;

/// Allow simple conversions from attributed source errors by re-wrapping the
/// attributed error around the more general payload.
impl From<container::Attributed<source::Error>> for DocumentError {
    fn from(value: container::Attributed<source::Error>) -> Self {
        Self {
            document: value.document,
            payload:  Error::from(value.payload),
        }
    }
}
