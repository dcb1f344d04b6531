//! Completion tracking and termination
//!
//! Workers report through a channel; the monitor is the only owner of the
//! counters. A periodic tick logs progress and detects stalls.

use crate::report::{FailureRecord, Outcome};
use crate::worker::Completion;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default period between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Default number of silent intervals before a run counts as stalled.
pub const DEFAULT_STALL_INTERVALS: u32 = 6;

/// Counters owned by the monitor
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub failures: Vec<FailureRecord>,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, event: Completion) {
        match event {
            Completion::Done { index, path } => {
                debug!(index, path = %path.display(), "Request completed");
                self.completed += 1;
            }
            Completion::Failed { index, path, error } => {
                self.failed += 1;
                self.failures.push(FailureRecord {
                    index,
                    path,
                    error: error.to_string(),
                });
            }
        }
    }

    /// Requests that reached a final state.
    pub fn settled(&self) -> u64 {
        self.completed + self.failed
    }

    pub fn is_done(&self) -> bool {
        self.settled() >= self.total
    }

    /// Integer-truncated percentage of settled requests.
    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            return 100;
        }
        self.settled() * 100 / self.total
    }
}

pub struct ProgressMonitor {
    total: u64,
    interval: Duration,
    stall_intervals: u32,
}

impl ProgressMonitor {
    /// `stall_intervals == 0` disables stall detection.
    pub fn new(total: u64, interval: Duration, stall_intervals: u32) -> Self {
        Self {
            total,
            interval,
            stall_intervals,
        }
    }

    /// Consume completion events until every request has settled, the run
    /// stalls, or `token` is cancelled.
    pub async fn watch(
        self,
        events: &mut mpsc::UnboundedReceiver<Completion>,
        token: &CancellationToken,
    ) -> (Outcome, Progress) {
        let mut progress = Progress::new(self.total);

        if progress.is_done() {
            info!(total = self.total, "Nothing to generate");
            return (Outcome::Completed, progress);
        }

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut idle_ticks = 0u32;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    warn!(settled = progress.settled(), total = progress.total, "Run cancelled");
                    break Outcome::Aborted;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        progress.record(event);
                        idle_ticks = 0;
                        if progress.is_done() {
                            break Outcome::Completed;
                        }
                    }
                    None => {
                        warn!(settled = progress.settled(), total = progress.total, "All workers stopped before the run finished");
                        break Outcome::Aborted;
                    }
                },
                _ = ticker.tick() => {
                    idle_ticks += 1;
                    info!(
                        completed = progress.completed,
                        failed = progress.failed,
                        total = progress.total,
                        "gen progress {}%",
                        progress.percent()
                    );
                    if self.stall_intervals > 0 && idle_ticks >= self.stall_intervals {
                        warn!(
                            idle_secs = (self.interval * idle_ticks).as_secs(),
                            "No request finished recently, giving up"
                        );
                        break Outcome::Stalled;
                    }
                }
            }
        };

        (outcome, progress)
    }
}
