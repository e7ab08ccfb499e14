//! Fixed-interval cycle scheduler.
//!
//! At most one cycle runs at a time. A firing that arrives while the
//! previous cycle is still in flight is skipped and logged, never queued.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::pipeline::LiquidationPipeline;

/// A unit of periodic work. Errors are handled inside the cycle.
#[async_trait]
pub trait Cycle: Send + 'static {
    async fn run(&mut self);
}

#[async_trait]
impl Cycle for LiquidationPipeline {
    async fn run(&mut self) {
        match self.run_cycle().await {
            Ok(report) => report.log(),
            Err(e) => error!(error = %e, "Cycle aborted: position feed unavailable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RunningCycle,
}

pub struct Scheduler<C: Cycle> {
    cycle: Arc<Mutex<C>>,
    interval: Duration,
    skipped: AtomicU64,
}

impl<C: Cycle> Scheduler<C> {
    pub fn new(cycle: C, interval: Duration) -> Self {
        Self {
            cycle: Arc::new(Mutex::new(cycle)),
            interval,
            skipped: AtomicU64::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        match self.cycle.try_lock() {
            Ok(_) => SchedulerState::Idle,
            Err(_) => SchedulerState::RunningCycle,
        }
    }

    /// Firings dropped because a cycle was still running.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Start a cycle unless one is already running.
    pub fn fire(&self) -> Option<JoinHandle<()>> {
        match self.cycle.clone().try_lock_owned() {
            Ok(mut guard) => Some(tokio::spawn(async move {
                guard.run().await;
            })),
            Err(_) => {
                let skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(skipped = skipped, "Previous cycle still running, skipping");
                None
            }
        }
    }

    /// Fire immediately, then every interval, until `shutdown` resolves.
    /// An in-flight cycle is awaited before returning.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Scheduler started"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut in_flight: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    if let Some(handle) = self.fire() {
                        in_flight = Some(handle);
                    }
                }
            }
        }

        if let Some(handle) = in_flight {
            if !handle.is_finished() {
                info!("Waiting for running cycle to finish");
            }
            if let Err(e) = handle.await {
                error!(error = %e, "Cycle task failed");
            }
        }

        info!(skipped = self.skipped(), "Scheduler stopped");
    }

    /// Run until the process is interrupted.
    pub async fn run(&self) {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

impl<C: Cycle> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("state", &self.state())
            .field("skipped", &self.skipped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{oneshot, Notify};

    struct GatedCycle {
        started: Arc<AtomicUsize>,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Cycle for GatedCycle {
        async fn run(&mut self) {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
        }
    }

    struct CountingCycle {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Cycle for CountingCycle {
        async fn run(&mut self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_overlapping_fire_is_skipped() {
        let started = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let scheduler = Scheduler::new(
            GatedCycle {
                started: started.clone(),
                gate: gate.clone(),
            },
            Duration::from_secs(15),
        );

        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let first = scheduler.fire().expect("first firing runs");
        assert_eq!(scheduler.state(), SchedulerState::RunningCycle);

        assert!(scheduler.fire().is_none());
        assert!(scheduler.fire().is_none());
        assert_eq!(scheduler.skipped(), 2);

        gate.notify_one();
        first.await.unwrap();

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        // Idle again: the next firing runs
        let second = scheduler.fire().expect("idle scheduler runs");
        gate.notify_one();
        second.await.unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_until_fires_immediately_and_stops() {
        let runs = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new(
            CountingCycle { runs: runs.clone() },
            Duration::from_millis(20),
        );

        let (tx, rx) = oneshot::channel::<()>();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(110)).await;
            let _ = tx.send(());
        });

        scheduler
            .run_until(async {
                let _ = rx.await;
            })
            .await;
        stopper.await.unwrap();

        let count = runs.load(Ordering::SeqCst);
        assert!(count >= 2, "expected several cycles, got {count}");
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_running_cycle() {
        let started = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let scheduler = Scheduler::new(
            GatedCycle {
                started: started.clone(),
                gate: gate.clone(),
            },
            Duration::from_secs(60),
        );

        let releaser = {
            let gate = gate.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                gate.notify_one();
            })
        };

        // Shutdown resolves right after the first tick has fired
        scheduler
            .run_until(tokio::time::sleep(Duration::from_millis(10)))
            .await;
        releaser.await.unwrap();

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }
}
