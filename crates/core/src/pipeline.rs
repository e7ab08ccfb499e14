//! One liquidation cycle: fetch, rank, then build, submit and record each
//! candidate in order.
//!
//! Candidates are handled strictly one after another. A failure on one
//! candidate is recorded and the cycle moves on to the next.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::outcome::{AttemptOutcome, AttemptStatus, AuditRecord};
use crate::ranker::rank;
use crate::recorder::OutcomeRecorder;
use liquidator_api::{FeedError, Position, SubgraphClient};
use liquidator_chain::{
    BuildError, FlashbotsRelay, LiquidationSigner, RelayError, RelayResponse, SignedLiquidation,
};

/// Source of positions eligible for liquidation.
#[async_trait]
pub trait PositionFeed: Send + Sync {
    async fn fetch_eligible_positions(&self) -> Result<Vec<Position>, FeedError>;
}

/// Turns a position into a signed liquidation transaction.
#[async_trait]
pub trait LiquidationBuilder: Send + Sync {
    async fn build(&self, position: &Position) -> Result<SignedLiquidation, BuildError>;
}

/// Private bundle relay.
#[async_trait]
pub trait BundleRelay: Send + Sync {
    /// Block the next bundle should target (head + 1).
    async fn target_block(&self) -> Result<u64, RelayError>;

    async fn submit(
        &self,
        tx: &SignedLiquidation,
        target_block: u64,
    ) -> Result<RelayResponse, RelayError>;
}

#[async_trait]
impl PositionFeed for SubgraphClient {
    async fn fetch_eligible_positions(&self) -> Result<Vec<Position>, FeedError> {
        SubgraphClient::fetch_eligible_positions(self).await
    }
}

#[async_trait]
impl LiquidationBuilder for LiquidationSigner {
    async fn build(&self, position: &Position) -> Result<SignedLiquidation, BuildError> {
        LiquidationSigner::build(self, position).await
    }
}

#[async_trait]
impl BundleRelay for FlashbotsRelay {
    async fn target_block(&self) -> Result<u64, RelayError> {
        FlashbotsRelay::target_block(self).await
    }

    async fn submit(
        &self,
        tx: &SignedLiquidation,
        target_block: u64,
    ) -> Result<RelayResponse, RelayError> {
        FlashbotsRelay::submit(self, tx, target_block).await
    }
}

/// Per-cycle counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub candidates: usize,
    pub submitted: usize,
    pub recorded: usize,
    pub rejected: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    fn count(&mut self, status: AttemptStatus) {
        match status {
            AttemptStatus::Recorded => {
                self.submitted += 1;
                self.recorded += 1;
            }
            AttemptStatus::Submitted => self.submitted += 1,
            AttemptStatus::RelayRejected => self.rejected += 1,
            AttemptStatus::RelayFailed | AttemptStatus::BuildFailed => self.failed += 1,
        }
    }

    pub fn log(&self) {
        info!(
            candidates = self.candidates,
            submitted = self.submitted,
            recorded = self.recorded,
            rejected = self.rejected,
            failed = self.failed,
            cycle_ms = self.elapsed.as_millis(),
            "Cycle complete"
        );
    }
}

/// Wires feed, ranker, builder, relay and recorder into a cycle.
pub struct LiquidationPipeline {
    feed: Arc<dyn PositionFeed>,
    builder: Arc<dyn LiquidationBuilder>,
    relay: Arc<dyn BundleRelay>,
    recorder: OutcomeRecorder,
}

impl LiquidationPipeline {
    pub fn new(
        feed: Arc<dyn PositionFeed>,
        builder: Arc<dyn LiquidationBuilder>,
        relay: Arc<dyn BundleRelay>,
        recorder: OutcomeRecorder,
    ) -> Self {
        Self {
            feed,
            builder,
            relay,
            recorder,
        }
    }

    /// Run one full cycle.
    ///
    /// Only a feed failure aborts the cycle; it happens before any
    /// candidate is touched.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport, FeedError> {
        let start = Instant::now();
        let positions = self.feed.fetch_eligible_positions().await?;

        let mut report = CycleReport {
            candidates: positions.len(),
            ..Default::default()
        };

        if positions.is_empty() {
            info!("No liquidation opportunities");
            report.elapsed = start.elapsed();
            return Ok(report);
        }

        for (index, position) in rank(positions).into_iter().enumerate() {
            debug!(
                rank = index,
                user = %position.account_id,
                debt = %position.debt_amount,
                hf = position.health_factor,
                "Attempting liquidation"
            );

            let outcome = self.attempt(&position).await;
            let status = self.recorder.record(&outcome).await;
            report.count(status);
        }

        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// Build, target and submit one candidate. Never fails; errors become
    /// outcomes.
    async fn attempt(&self, position: &Position) -> AttemptOutcome {
        let failed = |status: AttemptStatus, reason: String| AttemptOutcome::Failed {
            account_id: position.account_id.clone(),
            status,
            reason,
        };

        let signed = match self.builder.build(position).await {
            Ok(signed) => signed,
            Err(e) => return failed(AttemptStatus::BuildFailed, e.to_string()),
        };

        let target_block = match self.relay.target_block().await {
            Ok(block) => block,
            Err(e) => return failed(AttemptStatus::RelayFailed, e.to_string()),
        };

        match self.relay.submit(&signed, target_block).await {
            Ok(RelayResponse::Accepted { bundle_hash }) => {
                debug!(
                    user = %position.account_id,
                    bundle_hash = ?bundle_hash,
                    target_block = target_block,
                    "Bundle submitted"
                );
                AttemptOutcome::Submitted(AuditRecord::from_submission(
                    position,
                    &signed,
                    target_block,
                ))
            }
            Ok(RelayResponse::Rejected { code, message }) => AttemptOutcome::Rejected {
                account_id: position.account_id.clone(),
                reason: match code {
                    Some(code) => format!("{} ({})", message, code),
                    None => message,
                },
            },
            Err(e) => {
                warn!(user = %position.account_id, error = %e, "Relay submission failed");
                failed(AttemptStatus::RelayFailed, e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for LiquidationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiquidationPipeline").finish_non_exhaustive()
    }
}
