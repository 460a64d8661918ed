//! This module contains the address matcher, which searches a list of
//! candidate addresses for the one whose deployed code matches a recompiled
//! contract.

use std::time::Duration;

use futures::{stream, StreamExt};
use serde::Serialize;

use crate::{
    bytecode::{compare_bytecodes_with, MatchStatus},
    chain::CodeProvider,
    error::{chain, Error, Result},
    utility::to_checksum_address,
    verifier::Config,
    watchdog::Watchdog,
};

/// The outcome of matching a recompiled contract against deployed code.
///
/// Either both the address and the status are set, or neither is.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Match {
    address: Option<String>,
    status:  Option<MatchStatus>,
}

impl Match {
    /// Creates a match of `status` at `address`.
    #[must_use]
    pub fn new(address: impl Into<String>, status: MatchStatus) -> Self {
        Self {
            address: Some(address.into()),
            status:  Some(status),
        }
    }

    /// Creates the outcome for when no address matched.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Gets the checksummed address whose code matched.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Gets how closely the code matched.
    #[must_use]
    pub fn status(&self) -> Option<MatchStatus> {
        self.status
    }

    /// Checks if an address matched.
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.status.is_some()
    }
}

/// Finds the first of `addresses` whose deployed code, as retrieved from
/// `provider`, matches the `compiled` runtime bytecode.
///
/// Addresses are tried in the order given, and the first one that matches is
/// returned even when later ones would also match. Up to
/// [`Config::match_concurrency`] fetches are in flight at once, but results
/// are always considered in order. Addresses that are malformed, or whose
/// code cannot be fetched within [`Config::rpc_timeout`], are skipped.
///
/// # Errors
///
/// Returns [`Err`] if the `watchdog` requests a stop before a match is found.
pub async fn match_bytecode_to_address(
    provider: &dyn CodeProvider,
    addresses: &[String],
    compiled: &str,
    config: &Config,
    watchdog: &dyn Watchdog,
) -> Result<Match> {
    let mut fetches = stream::iter(addresses)
        .map(|address| fetch_code(provider, address, config.rpc_timeout))
        .buffered(config.match_concurrency.max(1));

    while let Some((address, code)) = fetches.next().await {
        if watchdog.should_stop() {
            return Err(Error::Stopped);
        }

        let deployed = match code {
            Ok(code) => code,
            Err(error) => {
                tracing::warn!(%address, %error, "Skipping address whose code could not be fetched");
                continue;
            }
        };

        if let Some(status) =
            compare_bytecodes_with(Some(deployed.as_str()), compiled, config.allow_partial_matches)
        {
            tracing::info!(%address, ?status, "Found matching address");
            return Ok(Match::new(address, status));
        }

        tracing::debug!(%address, "Deployed code does not match");
    }

    Ok(Match::none())
}

/// Fetches the code at `address`, returning the address in checksummed form
/// where it is valid.
async fn fetch_code(
    provider: &dyn CodeProvider,
    address: &str,
    timeout: Duration,
) -> (String, chain::Result<String>) {
    match to_checksum_address(address) {
        Ok(checksummed) => {
            let code = tokio::time::timeout(timeout, provider.get_code(&checksummed))
                .await
                .unwrap_or(Err(chain::Error::Timeout(timeout)));
            (checksummed, code)
        }
        Err(error) => (address.to_string(), Err(error)),
    }
}
