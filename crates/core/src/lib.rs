//! Liquidator core logic.
//!
//! This crate provides the liquidation loop on top of the api and chain
//! crates:
//! - Opportunity ranking by outstanding debt
//! - Per-candidate build, submit and record pipeline
//! - Audit log and operator notifications
//! - Non-overlapping interval scheduler
//! - Bot configuration

pub mod config;
mod outcome;
mod pipeline;
mod ranker;
mod recorder;
mod scheduler;

pub use config::{BotConfig, ConfigError};
pub use outcome::{AttemptOutcome, AttemptStatus, AuditRecord};
pub use pipeline::{BundleRelay, CycleReport, LiquidationBuilder, LiquidationPipeline, PositionFeed};
pub use ranker::rank;
pub use recorder::{AuditSink, JsonFileAuditLog, LogNotifier, Notifier, OutcomeRecorder, SinkError};
pub use scheduler::{Cycle, Scheduler, SchedulerState};
