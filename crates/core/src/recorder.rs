//! Outcome recording: audit log and operator notifications.
//!
//! Both sinks are best-effort. A failing notifier never prevents the audit
//! append and the reverse; failures are logged and the cycle continues.
//! Only accepted bundles reach the sinks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::outcome::{AttemptOutcome, AttemptStatus, AuditRecord};
use liquidator_api::TelegramClient;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("audit log I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit log encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("notification failed: {0}")]
    Notify(String),
}

/// Append-only store of successful submissions.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<(), SinkError>;
}

/// Operator alert channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), SinkError>;
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn notify(&self, message: &str) -> Result<(), SinkError> {
        self.send_message(message)
            .await
            .map_err(|e| SinkError::Notify(e.to_string()))
    }
}

/// Notifier used when Telegram is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<(), SinkError> {
        info!(message = %message, "Notification (no channel configured)");
        Ok(())
    }
}

/// Audit log kept as a pretty-printed JSON array.
///
/// Each append reads the whole file, pushes the record and writes it back.
/// Appends within the process are serialized by an internal lock.
#[derive(Debug)]
pub struct JsonFileAuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, oldest first. A missing file is an empty log.
    pub async fn read_all(&self) -> Result<Vec<AuditRecord>, SinkError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, records: &[AuditRecord]) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for JsonFileAuditLog {
    async fn append(&self, record: &AuditRecord) -> Result<(), SinkError> {
        let _guard = self.lock.lock().await;

        let mut records = self.read_all().await?;
        records.push(record.clone());
        self.write_all(&records).await?;

        debug!(
            path = %self.path.display(),
            total = records.len(),
            "Audit record appended"
        );
        Ok(())
    }
}

/// Routes attempt outcomes to the audit log, the notifier and the logs.
#[derive(Clone)]
pub struct OutcomeRecorder {
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
}

impl OutcomeRecorder {
    pub fn new(audit: Arc<dyn AuditSink>, notifier: Arc<dyn Notifier>) -> Self {
        Self { audit, notifier }
    }

    /// Handle one outcome and return the attempt's final status.
    ///
    /// A submission becomes `Recorded` once the audit append succeeded.
    pub async fn record(&self, outcome: &AttemptOutcome) -> AttemptStatus {
        match outcome {
            AttemptOutcome::Submitted(record) => self.record_submission(record).await,
            AttemptOutcome::Rejected { account_id, reason } => {
                warn!(user = %account_id, reason = %reason, "Relay rejected liquidation bundle");
                AttemptStatus::RelayRejected
            }
            AttemptOutcome::Failed {
                account_id,
                status,
                reason,
            } => {
                error!(
                    user = %account_id,
                    status = %status,
                    reason = %reason,
                    "Liquidation attempt failed"
                );
                *status
            }
        }
    }

    async fn record_submission(&self, record: &AuditRecord) -> AttemptStatus {
        let message = record.notification_message();
        let (appended, notified) = futures::join!(
            self.audit.append(record),
            self.notifier.notify(&message)
        );

        if let Err(e) = notified {
            warn!(user = %record.account_id, error = %e, "Failed to notify operator");
        }

        match appended {
            Ok(()) => {
                info!(
                    user = %record.account_id,
                    amount = %record.debt_amount,
                    debt_asset = %record.debt_asset_id,
                    collateral_asset = %record.collateral_asset_id,
                    target_block = ?record.target_block,
                    tx_hash = ?record.tx_hash,
                    "Liquidation bundle sent"
                );
                AttemptStatus::Recorded
            }
            Err(e) => {
                error!(user = %record.account_id, error = %e, "Failed to append audit record");
                AttemptStatus::Submitted
            }
        }
    }
}
