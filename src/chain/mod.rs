//! This module contains utility types for dealing with the chains on which
//! contracts are deployed. Each chain that the verifier can match against is
//! configured with a [`CodeProvider`] that retrieves deployed code from it.

pub mod rpc;

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::chain::{Error, Result};

/// The identifier of a chain, such as `mainnet` or `goerli`.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Chain(String);

impl Chain {
    /// Creates a chain identifier from `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Gets the name of the chain.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Chain {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The interface to something that can retrieve the code deployed at an
/// address on one chain.
#[async_trait]
pub trait CodeProvider
where
    Self: Debug + Send + Sync,
{
    /// Gets the hex-encoded code deployed at `address`.
    ///
    /// An address without code yields an empty code value such as `0x`, not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the code could not be retrieved.
    async fn get_code(&self, address: &str) -> Result<String>;
}

/// A dynamically dispatched [`CodeProvider`] instance.
pub type DynCodeProvider = Arc<dyn CodeProvider>;

/// The code providers for every chain that the verifier knows about.
#[derive(Clone, Debug, Default)]
pub struct ChainProviders {
    providers: HashMap<Chain, DynCodeProvider>,
}

impl ChainProviders {
    /// Creates an empty set of providers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` as the source of code for `chain`, replacing any
    /// previous provider.
    #[must_use]
    pub fn with(mut self, chain: impl Into<Chain>, provider: DynCodeProvider) -> Self {
        self.insert(chain, provider);
        self
    }

    /// Registers `provider` as the source of code for `chain`, replacing any
    /// previous provider.
    pub fn insert(&mut self, chain: impl Into<Chain>, provider: DynCodeProvider) {
        self.providers.insert(chain.into(), provider);
    }

    /// Gets the provider for `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if no provider is registered for `chain`.
    pub fn get(&self, chain: &Chain) -> Result<&DynCodeProvider> {
        self.providers
            .get(chain)
            .ok_or_else(|| Error::UnknownChain(chain.to_string()))
    }

    /// Gets the chains that have providers registered.
    pub fn chains(&self) -> impl Iterator<Item = &Chain> {
        self.providers.keys()
    }
}
