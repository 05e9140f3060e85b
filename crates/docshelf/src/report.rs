//! Scheduled usage report.
//!
//! Counts documents and sums their stored sizes, then logs both numbers.
//! Read-only: the reporter never mutates records or blobs.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;
use crate::record::{RecordResult, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub total_documents: u64,
    /// Sum of `size_bytes`; documents without content count as zero.
    pub total_bytes: u64,
}

pub struct UsageReporter {
    records: Arc<dyn RecordStore>,
    running: AtomicBool,
    completed_runs: AtomicU64,
}

impl UsageReporter {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            running: AtomicBool::new(false),
            completed_runs: AtomicU64::new(0),
        }
    }

    pub fn summarize(&self) -> RecordResult<UsageSummary> {
        let total_documents = self.records.count()?;
        let total_bytes = self
            .records
            .list_all()?
            .iter()
            .map(|d| d.size_bytes.unwrap_or(0))
            .sum();
        Ok(UsageSummary {
            total_documents,
            total_bytes,
        })
    }

    /// Compute and log the summary.
    ///
    /// Returns `Ok(None)` without touching the store if another run is still
    /// in progress.
    pub fn run(&self) -> RecordResult<Option<UsageSummary>> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("Usage report still running, skipping this run");
            return Ok(None);
        };

        let summary = self.summarize()?;
        info!(
            total_documents = summary.total_documents,
            total_bytes = summary.total_bytes,
            "Usage report"
        );
        self.completed_runs.fetch_add(1, Ordering::Relaxed);
        Ok(Some(summary))
    }

    pub fn completed_runs(&self) -> u64 {
        self.completed_runs.load(Ordering::Relaxed)
    }
}

/// Clears the running flag on drop.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Parse a cron expression with a seconds field.
pub fn parse_schedule(expr: &str) -> Result<Schedule, ConfigError> {
    Schedule::from_str(expr).map_err(|e| ConfigError::Schedule {
        expr: expr.to_string(),
        message: e.to_string(),
    })
}

/// Next fire time strictly after `after`, evaluated in `after`'s time zone.
pub fn next_fire<Tz: TimeZone>(
    schedule: &Schedule,
    after: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    schedule.after(after).next()
}

/// Spawn the periodic report task. Returns its handle for shutdown.
///
/// The schedule is read in the server's local time zone.
///
/// Each run executes on the blocking pool and is not awaited, so a slow run
/// never delays the next tick; the reporter's own guard skips overlaps.
pub fn spawn_report_task(reporter: Arc<UsageReporter>, schedule: Schedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Local::now();
            let Some(next) = next_fire(&schedule, &now) else {
                warn!("Report schedule has no upcoming runs, stopping");
                break;
            };
            debug!(next = %next.to_rfc3339(), "Next usage report scheduled");

            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(delay).await;

            let reporter = Arc::clone(&reporter);
            tokio::task::spawn_blocking(move || {
                if let Err(e) = reporter.run() {
                    error!(error = %e, "Usage report failed");
                }
            });
        }
    })
}
