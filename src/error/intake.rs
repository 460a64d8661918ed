//! This module contains the error type that pertains to ingesting the uploaded
//! files and selecting the metadata documents among them.

use thiserror::Error;

/// Errors that occur before any individual metadata document is processed.
///
/// All of these are fatal to the whole submission.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error(
        "Unable to extract any files. Your request may be misformatted or missing some contents."
    )]
    NoFiles,

    #[error("Address {address} for chain {chain} not found in repository")]
    AddressNotFound { chain: String, address: String },

    #[error("Metadata file not found. Did you include \"metadata.json\"?")]
    MetadataNotFound,
}

/// The result type for functions that may return intake errors.
pub type Result<T> = std::result::Result<T, Error>;
