//! Liquidator chain interaction layer.
//!
//! This crate provides:
//! - Fresh, timeout-bounded RPC reads (head block, signer nonce)
//! - Flat legacy gas settings
//! - The `initiateFlashLoan` contract binding
//! - Liquidation transaction building and signing
//! - Private relay (`eth_sendBundle`) submission

pub mod bindings;
pub mod gas;
mod provider;
pub mod relay;
mod signer;

pub use bindings::encode_initiate_flash_loan;
pub use gas::{GasSettings, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE_GWEI};
pub use provider::{ChainReader, RpcError};
pub use relay::{FlashbotsRelay, RelayError, RelayResponse, DEFAULT_RELAY_URL};
pub use signer::{
    signer_from_hex, BuildError, LiquidationCall, LiquidationSigner, LiquidationSignerBuilder,
    SignedLiquidation, POLYGON_CHAIN_ID,
};
