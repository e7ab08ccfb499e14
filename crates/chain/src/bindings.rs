//! Liquidation contract binding.
//!
//! The deployed `LiquidationBot` contract takes an Aave flash loan in the
//! debt asset, repays the borrower's debt, seizes the collateral and
//! settles the loan in the same transaction.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    #[derive(Debug)]
    interface ILiquidationBot {
        function initiateFlashLoan(
            address asset,
            uint256 amount,
            address user,
            address debtAsset,
            address collateralAsset,
            bool swapCollateral
        ) external;
    }
}

/// Encode `initiateFlashLoan` calldata.
///
/// The flash-borrowed asset is the debt asset itself; collateral is
/// received directly (`swapCollateral = false`).
pub fn encode_initiate_flash_loan(
    debt_asset: Address,
    amount: U256,
    user: Address,
    collateral_asset: Address,
) -> Bytes {
    ILiquidationBot::initiateFlashLoanCall {
        asset: debt_asset,
        amount,
        user,
        debtAsset: debt_asset,
        collateralAsset: collateral_asset,
        swapCollateral: false,
    }
    .abi_encode()
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, keccak256};

    #[test]
    fn test_selector() {
        let expected =
            keccak256("initiateFlashLoan(address,uint256,address,address,address,bool)");
        assert_eq!(
            ILiquidationBot::initiateFlashLoanCall::SELECTOR,
            expected[..4]
        );
    }

    #[test]
    fn test_encode_layout() {
        let debt = address!("2791bca1f2de4661ed88a30c99a7a9449aa84174");
        let user = address!("00000000000000000000000000000000000000aa");
        let collateral = address!("7ceb23fd6bc0add59e62ac25578270cff1b9f619");

        let data = encode_initiate_flash_loan(debt, U256::from(5000), user, collateral);
        assert_eq!(data.len(), 4 + 6 * 32);

        let decoded = ILiquidationBot::initiateFlashLoanCall::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.asset, debt);
        assert_eq!(decoded.debtAsset, debt);
        assert_eq!(decoded.amount, U256::from(5000));
        assert_eq!(decoded.user, user);
        assert_eq!(decoded.collateralAsset, collateral);
        assert!(!decoded.swapCollateral);
    }
}
