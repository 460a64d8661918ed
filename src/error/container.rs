use std::fmt::Formatter;

use thiserror::Error;

/// An error that is attributed to a particular metadata document in a batch
/// submission.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct Attributed<E>
where
    E: Clone,
{
    /// The index of the metadata document, in the order in which the documents
    /// were found among the uploaded files.
    pub document: usize,

    /// The error data
    pub payload: E,
}

/// Displays the error prefixed by the index of the metadata document that
/// caused it.
impl<E> std::fmt::Display for Attributed<E>
where
    E: std::fmt::Display + Clone,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[metadata #{}]: {}", self.document, self.payload)
    }
}

/// A trait for types that can have a metadata document attached to them.
pub trait Attributable
where
    Self: Sized,
{
    /// The return type with the attached document index.
    type Attributed;

    /// Attach the metadata document described by `document` to the error.
    fn attribute(self, document: usize) -> Self::Attributed;
}

/// A blanket implementation that allows for attaching a document to any
/// result.
impl<T, E> Attributable for Result<T, E>
where
    E: std::error::Error + Clone,
{
    type Attributed = Result<T, Attributed<E>>;

    fn attribute(self, document: usize) -> Self::Attributed {
        self.map_err(|e| Attributed {
            document,
            payload: e,
        })
    }
}

/// A collection of errors, kept in the order in which they were added.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Errors<E> {
    payloads: Vec<E>,
}

impl<E> Errors<E> {
    /// Creates a new container for errors.
    #[must_use]
    pub fn new() -> Self {
        let payloads = vec![];
        Self { payloads }
    }

    /// Gets the errors contained within this error.
    #[must_use]
    pub fn payloads(&self) -> &[E] {
        self.payloads.as_slice()
    }

    /// Gets the most recently encountered error, if any.
    #[must_use]
    pub fn last(&self) -> Option<&E> {
        self.payloads.last()
    }

    /// Gets the length of the errors container.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    /// Checks if the errors container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Errors<E>
where
    E: std::error::Error,
{
    /// Adds the provided `error` to the container.
    pub fn add(&mut self, error: E) {
        self.payloads.push(error);
    }
}

impl<E> Errors<Attributed<E>>
where
    E: std::error::Error + Clone,
{
    /// Gets the errors attributed to the metadata document at `document`.
    pub fn for_document(&self, document: usize) -> impl Iterator<Item = &E> {
        self.payloads
            .iter()
            .filter(move |e| e.document == document)
            .map(|e| &e.payload)
    }
}

/// The default errors container is one containing no errors.
impl<E> Default for Errors<E> {
    fn default() -> Self {
        Self::new()
    }
}
