//! Flashbots-style private relay client.
//!
//! Sends single-transaction bundles with `eth_sendBundle` for one target
//! block. Requests are authenticated with the `X-Flashbots-Signature`
//! header: `<address>:<sig>`, where `sig` is an EIP-191 signature over the
//! hex-encoded keccak256 of the request body.

use std::time::{Duration, Instant};

use alloy::primitives::{keccak256, Address};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::provider::{ChainReader, RpcError};
use crate::signer::SignedLiquidation;

/// Flashbots mainnet relay.
pub const DEFAULT_RELAY_URL: &str = "https://relay.flashbots.net";

const SIGNATURE_HEADER: &str = "X-Flashbots-Signature";

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("head block unavailable: {0}")]
    HeadBlock(#[from] RpcError),

    #[error("failed to sign relay request: {0}")]
    Auth(String),

    #[error("malformed relay response (HTTP {status}): {body}")]
    Malformed { status: u16, body: String },
}

/// How the relay answered a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayResponse {
    Accepted { bundle_hash: Option<String> },
    Rejected { code: Option<i64>, message: String },
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'a str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BundleParams {
    txs: Vec<String>,
    block_number: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

/// Serialize the `eth_sendBundle` body for one transaction.
pub fn bundle_body(tx: &SignedLiquidation, target_block: u64) -> String {
    let request = JsonRpcRequest {
        jsonrpc: "2.0",
        id: 1,
        method: "eth_sendBundle",
        params: [BundleParams {
            txs: vec![format!("0x{}", hex::encode(&tx.raw))],
            block_number: format!("{:#x}", target_block),
        }],
    };
    // Serializing plain strings and numbers cannot fail.
    serde_json::to_string(&request).unwrap_or_default()
}

/// Compute the `X-Flashbots-Signature` header value for a request body.
pub async fn flashbots_signature(
    auth: &PrivateKeySigner,
    body: &str,
) -> Result<String, RelayError> {
    let digest = format!("0x{}", hex::encode(keccak256(body.as_bytes())));
    let signature = auth
        .sign_message(digest.as_bytes())
        .await
        .map_err(|e| RelayError::Auth(e.to_string()))?;

    Ok(format!(
        "{}:0x{}",
        auth.address(),
        hex::encode(signature.as_bytes())
    ))
}

/// Classify a relay reply. A JSON-RPC `error` object is a rejection.
pub fn parse_relay_response(status: u16, body: &str) -> Result<RelayResponse, RelayError> {
    let malformed = || RelayError::Malformed {
        status,
        body: body.chars().take(256).collect(),
    };

    let parsed: JsonRpcResponse = serde_json::from_str(body).map_err(|_| malformed())?;

    if let Some(error) = parsed.error {
        return Ok(RelayResponse::Rejected {
            code: error.code,
            message: error.message,
        });
    }

    match parsed.result {
        Some(result) => Ok(RelayResponse::Accepted {
            bundle_hash: result
                .get("bundleHash")
                .and_then(|h| h.as_str())
                .map(str::to_string),
        }),
        None => Err(malformed()),
    }
}

/// Private relay client.
pub struct FlashbotsRelay {
    client: reqwest::Client,
    url: String,
    auth: PrivateKeySigner,
    reader: ChainReader,
}

impl FlashbotsRelay {
    /// `auth` only identifies the searcher to the relay; it need not hold funds.
    pub fn new(
        url: impl Into<String>,
        auth: PrivateKeySigner,
        reader: ChainReader,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let relay = Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.into(),
            auth,
            reader,
        };
        info!(
            relay = %relay.url,
            auth = %relay.auth_address(),
            "Relay client initialized"
        );

        Ok(relay)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn auth_address(&self) -> Address {
        self.auth.address()
    }

    /// Next block after the current head, read fresh on every call.
    pub async fn target_block(&self) -> Result<u64, RelayError> {
        Ok(self.reader.block_number().await? + 1)
    }

    /// Submit one signed transaction as a bundle for `target_block`.
    #[instrument(skip(self, tx), fields(tx_hash = %tx.tx_hash, target_block = target_block))]
    pub async fn submit(
        &self,
        tx: &SignedLiquidation,
        target_block: u64,
    ) -> Result<RelayResponse, RelayError> {
        let start = Instant::now();
        let body = bundle_body(tx, target_block);
        let signature = flashbots_signature(&self.auth, &body).await?;

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        let result = parse_relay_response(status, &text)?;

        match &result {
            RelayResponse::Accepted { bundle_hash } => debug!(
                bundle_hash = ?bundle_hash,
                submit_ms = start.elapsed().as_millis(),
                "Bundle accepted by relay"
            ),
            RelayResponse::Rejected { code, message } => warn!(
                code = ?code,
                message = %message,
                submit_ms = start.elapsed().as_millis(),
                "Bundle rejected by relay"
            ),
        }

        Ok(result)
    }
}

impl std::fmt::Debug for FlashbotsRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashbotsRelay")
            .field("url", &self.url)
            .field("auth", &self.auth.address())
            .finish_non_exhaustive()
    }
}
