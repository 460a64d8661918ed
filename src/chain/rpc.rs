//! This module contains a [`CodeProvider`] that talks to a node over HTTP
//! JSON-RPC.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    chain::CodeProvider,
    constant::{DEFAULT_RPC_TIMEOUT, JSON_RPC_VERSION, LATEST_BLOCK_TAG},
    error::chain::{Error, Result},
};

/// Retrieves deployed code with `eth_getCode` from a node at a fixed URL.
#[derive(Debug)]
pub struct JsonRpcProvider {
    url:     String,
    client:  reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    /// Creates a provider for the node at `url`, whose requests give up after
    /// [`DEFAULT_RPC_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_RPC_TIMEOUT)
    }

    /// Creates a provider for the node at `url`, whose requests give up after
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the HTTP client cannot be constructed.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        let next_id = AtomicU64::new(1);
        Ok(Self {
            url,
            client,
            next_id,
        })
    }

    /// Gets the URL of the node.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CodeProvider for JsonRpcProvider {
    async fn get_code(&self, address: &str) -> Result<String> {
        let request = Request {
            jsonrpc: JSON_RPC_VERSION,
            id:      self.next_id.fetch_add(1, Ordering::Relaxed),
            method:  "eth_getCode",
            params:  [address, LATEST_BLOCK_TAG],
        };

        let response: Response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;

        response.into_code()
    }
}

/// A JSON-RPC request.
#[derive(Debug, Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id:      u64,
    method:  &'static str,
    params:  [&'a str; 2],
}

/// A JSON-RPC response carrying either a hex string or an error.
#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<String>,

    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code:    i64,
    message: String,
}

impl Response {
    fn into_code(self) -> Result<String> {
        match (self.result, self.error) {
            (_, Some(RpcError { code, message })) => Err(Error::Rpc { code, message }),
            (Some(code), None) => Ok(code),
            (None, None) => Err(Error::MalformedResponse(
                "response has neither a result nor an error".into(),
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        chain::rpc::{Request, Response},
        error::chain::Error,
    };

    fn parse(raw: &str) -> anyhow::Result<Response> {
        Ok(serde_json::from_str(raw)?)
    }

    #[test]
    fn encodes_get_code_requests() -> anyhow::Result<()> {
        let request = Request {
            jsonrpc: "2.0",
            id:      7,
            method:  "eth_getCode",
            params:  ["0xabc", "latest"],
        };

        assert_eq!(
            serde_json::to_value(&request)?,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "eth_getCode",
                "params": ["0xabc", "latest"]
            })
        );

        Ok(())
    }

    #[test]
    fn reads_code_from_results() -> anyhow::Result<()> {
        let response = parse(r#"{"jsonrpc":"2.0","id":1,"result":"0x6080"}"#)?;
        assert_eq!(response.into_code(), Ok("0x6080".to_string()));

        Ok(())
    }

    #[test]
    fn surfaces_node_errors() -> anyhow::Result<()> {
        let response = parse(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid argument"}}"#,
        )?;
        assert_eq!(
            response.into_code(),
            Err(Error::Rpc {
                code:    -32602,
                message: "invalid argument".into(),
            })
        );

        let empty = parse(r#"{"jsonrpc":"2.0","id":1}"#)?;
        assert!(matches!(empty.into_code(), Err(Error::MalformedResponse(_))));

        Ok(())
    }
}
