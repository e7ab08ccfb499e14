//! Per-attempt results and the audit record of a successful submission.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use liquidator_api::Position;
use liquidator_chain::SignedLiquidation;

/// Lifecycle of one liquidation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    /// Relay accepted the bundle
    Submitted,
    /// Relay answered with an error object
    RelayRejected,
    /// Relay or head block could not be reached
    RelayFailed,
    /// Encoding, nonce fetch or signing failed
    BuildFailed,
    /// Submitted and persisted to the audit log
    Recorded,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::RelayRejected => "relay_rejected",
            AttemptStatus::RelayFailed => "relay_failed",
            AttemptStatus::BuildFailed => "build_failed",
            AttemptStatus::Recorded => "recorded",
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable fact of a bundle the relay accepted.
///
/// Field names on disk match the historical `liquidations.json` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "userAddress")]
    pub account_id: String,

    #[serde(rename = "amountToRepay")]
    pub debt_amount: String,

    #[serde(rename = "debtAsset")]
    pub debt_asset_id: String,

    #[serde(rename = "collateralAsset")]
    pub collateral_asset_id: String,

    #[serde(rename = "targetBlock", default, skip_serializing_if = "Option::is_none")]
    pub target_block: Option<u64>,

    #[serde(rename = "txHash", default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl AuditRecord {
    pub fn from_submission(
        position: &Position,
        signed: &SignedLiquidation,
        target_block: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            account_id: position.account_id.clone(),
            debt_amount: position.debt_amount.to_string(),
            debt_asset_id: position.debt_asset_id.clone(),
            collateral_asset_id: position.collateral_asset_id.clone(),
            target_block: Some(target_block),
            tx_hash: Some(format!("{:#x}", signed.tx_hash)),
        }
    }

    /// Operator notification text.
    pub fn notification_message(&self) -> String {
        let mut message = format!(
            "Liquidation OK\nUser: {}\nAmount: {}\nDebt asset: {}\nTime: {}",
            self.account_id,
            self.debt_amount,
            self.debt_asset_id,
            self.timestamp_rfc3339()
        );
        if let Some(block) = self.target_block {
            message.push_str(&format!("\nTarget block: {}", block));
        }
        if let Some(hash) = &self.tx_hash {
            message.push_str(&format!("\nTx: {}", hash));
        }
        message
    }

    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Result of one attempt, consumed by the outcome recorder.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Submitted(AuditRecord),
    Rejected {
        account_id: String,
        reason: String,
    },
    Failed {
        account_id: String,
        status: AttemptStatus,
        reason: String,
    },
}

impl AttemptOutcome {
    pub fn status(&self) -> AttemptStatus {
        match self {
            AttemptOutcome::Submitted(_) => AttemptStatus::Submitted,
            AttemptOutcome::Rejected { .. } => AttemptStatus::RelayRejected,
            AttemptOutcome::Failed { status, .. } => *status,
        }
    }

    pub fn account_id(&self) -> &str {
        match self {
            AttemptOutcome::Submitted(record) => &record.account_id,
            AttemptOutcome::Rejected { account_id, .. } => account_id,
            AttemptOutcome::Failed { account_id, .. } => account_id,
        }
    }
}
