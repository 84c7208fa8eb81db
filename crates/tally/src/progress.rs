//! Periodic throughput reporting.
//!
//! The reporter reads [`SampleCounters`] on a fixed interval from its own task
//! and logs how many posts arrived since the previous tick. It only ever
//! reads; the sampling loop stays the single writer.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::result::SampleCounters;

/// Throughput observed over one reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Posts tracked since the run started
    pub tracked: u64,
    /// Posts tracked during this period
    pub delta: u64,
    /// Events skipped since the run started
    pub skipped: u64,
    /// Posts per second during this period
    pub rate: f64,
}

/// Computes per-period deltas from shared counters.
#[derive(Debug)]
pub struct ProgressReporter {
    counters: SampleCounters,
    period: Duration,
    last_tracked: u64,
}

impl ProgressReporter {
    /// Create a reporter that reports every `period`.
    pub fn new(counters: SampleCounters, period: Duration) -> Self {
        let last_tracked = counters.tracked();
        Self {
            counters,
            period,
            last_tracked,
        }
    }

    /// Reporting period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Take a snapshot and start a new period.
    pub fn observe(&mut self) -> ProgressSnapshot {
        let tracked = self.counters.tracked();
        let delta = tracked.saturating_sub(self.last_tracked);
        self.last_tracked = tracked;

        let secs = self.period.as_secs_f64();
        let rate = if secs > 0.0 { delta as f64 / secs } else { 0.0 };

        ProgressSnapshot {
            tracked,
            delta,
            skipped: self.counters.skipped(),
            rate,
        }
    }

    /// Log a snapshot every period until `cancel` fires.
    ///
    /// The first report comes one full period after the call. A zero period,
    /// or one too long to schedule, never reports.
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let first_tick = tokio::time::Instant::now().checked_add(self.period);
            let start = match first_tick {
                Some(start) if !self.period.is_zero() => start,
                // Never due.
                _ => {
                    cancel.cancelled().await;
                    return;
                }
            };

            let mut ticker = tokio::time::interval_at(start, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,

                    _ = ticker.tick() => {
                        let snapshot = self.observe();
                        info!(
                            tracked = snapshot.tracked,
                            delta = snapshot.delta,
                            skipped = snapshot.skipped,
                            rate = snapshot.rate,
                            "Posts tracked: {:5} (+{}, {:.1}/sec)",
                            snapshot.tracked,
                            snapshot.delta,
                            snapshot.rate,
                        );
                    }
                }
            }
        })
    }
}
