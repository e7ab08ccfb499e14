//! Flat legacy gas pricing.
//!
//! Liquidations are signed with a fixed gas limit and a fixed legacy
//! `gas_price`. The fee market is never queried.

use alloy::network::TransactionBuilder;
use alloy::primitives::U256;
use alloy::rpc::types::TransactionRequest;

/// Default gas limit for a flash-loan liquidation.
pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

/// Default legacy gas price in gwei.
pub const DEFAULT_GAS_PRICE_GWEI: f64 = 50.0;

const WEI_PER_GWEI: f64 = 1e9;

/// Gas parameters applied to every liquidation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSettings {
    pub gas_limit: u64,
    /// Legacy gas price in wei
    pub gas_price: u128,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self::from_gwei(DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE_GWEI)
    }
}

impl GasSettings {
    pub fn new(gas_limit: u64, gas_price: u128) -> Self {
        Self {
            gas_limit,
            gas_price,
        }
    }

    /// Build from a gas price expressed in gwei.
    pub fn from_gwei(gas_limit: u64, gas_price_gwei: f64) -> Self {
        Self::new(gas_limit, (gas_price_gwei * WEI_PER_GWEI).round() as u128)
    }

    /// Gas price in gwei, for logging.
    pub fn gas_price_gwei(&self) -> f64 {
        self.gas_price as f64 / WEI_PER_GWEI
    }

    /// Upper bound on the fee paid if the transaction lands.
    pub fn max_fee(&self) -> U256 {
        U256::from(self.gas_limit) * U256::from(self.gas_price)
    }

    /// Write gas limit and legacy gas price into a transaction request.
    pub fn apply(&self, tx: &mut TransactionRequest) {
        tx.set_gas_limit(self.gas_limit);
        tx.set_gas_price(self.gas_price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    #[test]
    fn test_default_settings() {
        let gas = GasSettings::default();
        assert_eq!(gas.gas_limit, 1_000_000);
        assert_eq!(gas.gas_price, 50_000_000_000);
        assert!((gas.gas_price_gwei() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_fee() {
        let gas = GasSettings::new(21_000, 2_000_000_000);
        assert_eq!(gas.max_fee(), U256::from(42_000_000_000_000u64));
    }

    #[test]
    fn test_from_gwei_rounds() {
        assert_eq!(GasSettings::from_gwei(1, 0.3).gas_price, 300_000_000);
        assert_eq!(GasSettings::from_gwei(1, 1e-10).gas_price, 0);
    }

    #[test]
    fn test_apply_gas() {
        let gas = GasSettings::from_gwei(500_000, 30.0);
        let mut tx = TransactionRequest::default().with_to(Address::ZERO);

        gas.apply(&mut tx);
        assert_eq!(tx.gas_price, Some(30_000_000_000));
        assert_eq!(tx.gas, Some(500_000));
        assert_eq!(tx.max_fee_per_gas, None);
    }
}
