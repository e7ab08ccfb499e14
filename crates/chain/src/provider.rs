//! Read-only RPC access.
//! Every call builds a fresh Alloy HTTP provider and is bounded by a timeout.

use std::time::Duration;

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use reqwest::Url;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("invalid RPC URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("RPC request failed: {0}")]
    Request(String),

    #[error("RPC request timed out after {0:?}")]
    Timeout(Duration),
}

/// Chain state reader for the values fetched fresh per attempt:
/// the signer's transaction count and the current head block.
#[derive(Debug, Clone)]
pub struct ChainReader {
    rpc_url: Url,
    timeout: Duration,
}

impl ChainReader {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let rpc_url = rpc_url.parse::<Url>().map_err(|e| RpcError::InvalidUrl {
            url: rpc_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { rpc_url, timeout })
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    /// Latest block number.
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let block = tokio::time::timeout(self.timeout, provider.get_block_number())
            .await
            .map_err(|_| RpcError::Timeout(self.timeout))?
            .map_err(|e| RpcError::Request(e.to_string()))?;

        debug!(block = block, "Fetched head block");
        Ok(block)
    }

    /// Transaction count (nonce) of `address`. Never cached.
    pub async fn transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let nonce = tokio::time::timeout(self.timeout, provider.get_transaction_count(address))
            .await
            .map_err(|_| RpcError::Timeout(self.timeout))?
            .map_err(|e| RpcError::Request(e.to_string()))?;

        debug!(address = %address, nonce = nonce, "Fetched transaction count");
        Ok(nonce)
    }
}
