//! Liquidation transaction builder and signer.
//!
//! Turns one candidate position into a signed, relay-ready legacy
//! transaction. The nonce is read from the chain for every build so that
//! submissions from earlier cycles or other processes never collide.

use std::time::Instant;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use tracing::{debug, info, instrument};

use crate::bindings::encode_initiate_flash_loan;
use crate::gas::GasSettings;
use crate::provider::{ChainReader, RpcError};
use liquidator_api::Position;

/// Polygon PoS chain id.
pub const POLYGON_CHAIN_ID: u64 = 137;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("nonce fetch failed: {0}")]
    Nonce(#[from] RpcError),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Decoded call parameters for one liquidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationCall {
    pub user: Address,
    pub debt_asset: Address,
    pub collateral_asset: Address,
    pub amount: U256,
    pub calldata: Bytes,
}

/// A signed liquidation transaction ready for a bundle.
#[derive(Debug, Clone)]
pub struct SignedLiquidation {
    /// EIP-2718 encoded signed transaction
    pub raw: Bytes,
    pub tx_hash: B256,
    pub nonce: u64,
    pub user: Address,
}

/// Parse a hex private key, with or without `0x` prefix.
pub fn signer_from_hex(
    private_key: &str,
) -> Result<PrivateKeySigner, alloy::signers::local::LocalSignerError> {
    private_key.trim().trim_start_matches("0x").parse()
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, BuildError> {
    value.trim().parse().map_err(|_| BuildError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

/// Builder for [`LiquidationSigner`].
pub struct LiquidationSignerBuilder {
    reader: ChainReader,
    contract: Address,
    chain_id: u64,
    gas: Option<GasSettings>,
}

impl LiquidationSignerBuilder {
    pub fn new(reader: ChainReader, contract: Address) -> Self {
        Self {
            reader,
            contract,
            chain_id: POLYGON_CHAIN_ID,
            gas: None,
        }
    }

    /// Chain id used for EIP-155 replay protection.
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Override the default gas limit and price.
    pub fn gas(mut self, gas: GasSettings) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn build(self, signer: PrivateKeySigner) -> LiquidationSigner {
        let address = signer.address();
        let gas = self.gas.unwrap_or_default();

        info!(
            address = %address,
            contract = %self.contract,
            chain_id = self.chain_id,
            gas_limit = gas.gas_limit,
            gas_price_gwei = gas.gas_price_gwei(),
            max_fee_wei = %gas.max_fee(),
            "Liquidation signer initialized"
        );

        LiquidationSigner {
            reader: self.reader,
            wallet: EthereumWallet::from(signer),
            address,
            contract: self.contract,
            chain_id: self.chain_id,
            gas,
        }
    }
}

/// Owns the liquidation key. One instance per process, used sequentially.
pub struct LiquidationSigner {
    reader: ChainReader,
    wallet: EthereumWallet,
    address: Address,
    contract: Address,
    chain_id: u64,
    gas: GasSettings,
}

impl LiquidationSigner {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn gas(&self) -> GasSettings {
        self.gas
    }

    /// Encode the flash-loan call for a position.
    pub fn encode_call(&self, position: &Position) -> Result<LiquidationCall, BuildError> {
        let user = parse_address("user", &position.account_id)?;
        let debt_asset = parse_address("debt asset", &position.debt_asset_id)?;
        let collateral_asset = parse_address("collateral asset", &position.collateral_asset_id)?;

        let calldata =
            encode_initiate_flash_loan(debt_asset, position.debt_amount, user, collateral_asset);

        Ok(LiquidationCall {
            user,
            debt_asset,
            collateral_asset,
            amount: position.debt_amount,
            calldata,
        })
    }

    /// Sign a call with an explicit nonce.
    pub async fn sign(
        &self,
        call: &LiquidationCall,
        nonce: u64,
    ) -> Result<SignedLiquidation, BuildError> {
        let mut tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(self.contract)
            .with_input(call.calldata.clone())
            .with_value(U256::ZERO)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id);
        self.gas.apply(&mut tx);

        let envelope = tx
            .build(&self.wallet)
            .await
            .map_err(|e| BuildError::Signing(e.to_string()))?;

        let tx_hash = *envelope.tx_hash();
        let raw: Bytes = envelope.encoded_2718().into();

        Ok(SignedLiquidation {
            raw,
            tx_hash,
            nonce,
            user: call.user,
        })
    }

    /// Encode, fetch a fresh nonce, and sign.
    #[instrument(skip(self, position), fields(user = %position.account_id))]
    pub async fn build(&self, position: &Position) -> Result<SignedLiquidation, BuildError> {
        let start = Instant::now();

        let call = self.encode_call(position)?;
        let nonce = self.reader.transaction_count(self.address).await?;
        let signed = self.sign(&call, nonce).await?;

        debug!(
            user = %call.user,
            debt_asset = %call.debt_asset,
            collateral_asset = %call.collateral_asset,
            amount = %call.amount,
            nonce = nonce,
            tx_hash = %signed.tx_hash,
            raw_len = signed.raw.len(),
            build_ms = start.elapsed().as_millis(),
            "Liquidation transaction signed"
        );

        Ok(signed)
    }
}

impl std::fmt::Debug for LiquidationSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiquidationSigner")
            .field("address", &self.address)
            .field("contract", &self.contract)
            .field("chain_id", &self.chain_id)
            .field("gas", &self.gas)
            .finish_non_exhaustive()
    }
}
