//! Single-flight controller for background catalogue scrapes.
//!
//! One [`ScrapeJobController`] owns the process-wide [`ScrapeStatus`]. Every
//! read and write of that record goes through one mutex. `trigger` performs its
//! check-and-set and launches the run's supervisor inside that critical
//! section, so two concurrent triggers can never both start a run.
//!
//! A run ends through [`RunOutcome`] only, applied by the supervisor that owns
//! the scrape task's join handle. Task errors, panics and watchdog expiry all
//! become `Failed` outcomes; nothing leaves `running` stuck at `true`.

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use books_scraper::{utils, ScrapeError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_RUN_DURATION: Duration = Duration::from_secs(60 * 60);

/// Error recorded when the watchdog gives up on a run.
pub const TIMEOUT_ERROR: &str = "timeout";

/// Status of the current or last scrape run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScrapeStatus {
    pub running: bool,
    pub started_by: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub books_scraped: usize,
    pub error: Option<String>,
}

/// Terminal result of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Succeeded { books_scraped: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerOutcome {
    pub accepted: bool,
    pub status: ScrapeStatus,
}

/// What a finished scrape hands back: the file it wrote.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub output: PathBuf,
}

/// The unit of work a run executes. Only one call is ever in flight.
#[async_trait]
pub trait ScraperTask: Send + Sync + 'static {
    async fn run(&self) -> Result<ScrapeReport, ScrapeError>;
}

#[derive(Debug, Error, PartialEq)]
pub enum ScrapeJobError {
    #[error("completion for run {run_id} does not match the active run")]
    StaleCompletion { run_id: Uuid },
}

struct JobState {
    status: ScrapeStatus,
    active_run: Option<Uuid>,
}

struct Inner {
    state: Mutex<JobState>,
    updates: watch::Sender<ScrapeStatus>,
    task: Arc<dyn ScraperTask>,
    max_run_duration: Duration,
}

#[derive(Clone)]
pub struct ScrapeJobController {
    inner: Arc<Inner>,
}

impl ScrapeJobController {
    pub fn new(task: Arc<dyn ScraperTask>) -> Self {
        Self::with_max_run_duration(task, DEFAULT_MAX_RUN_DURATION)
    }

    pub fn with_max_run_duration(task: Arc<dyn ScraperTask>, max_run_duration: Duration) -> Self {
        let (updates, _) = watch::channel(ScrapeStatus::default());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(JobState {
                    status: ScrapeStatus::default(),
                    active_run: None,
                }),
                updates,
                task,
                max_run_duration,
            }),
        }
    }

    /// Starts a run unless one is already in flight. Never waits for the run.
    pub async fn trigger(&self, caller: &str) -> TriggerOutcome {
        let mut state = self.inner.state.lock().await;

        if state.status.running {
            info!(
                caller,
                started_by = ?state.status.started_by,
                "scrape already running, trigger rejected"
            );
            return TriggerOutcome {
                accepted: false,
                status: state.status.clone(),
            };
        }

        let run_id = Uuid::new_v4();
        state.status = ScrapeStatus {
            running: true,
            started_by: Some(caller.to_string()),
            start_time: Some(Utc::now()),
            end_time: None,
            books_scraped: 0,
            error: None,
        };
        state.active_run = Some(run_id);

        let status = state.status.clone();
        self.inner.updates.send_replace(status.clone());

        tokio::spawn(self.clone().supervise(run_id));
        info!(%run_id, caller, "scrape run started");

        TriggerOutcome {
            accepted: true,
            status,
        }
    }

    /// Point-in-time copy of the status record.
    pub async fn status(&self) -> ScrapeStatus {
        self.inner.state.lock().await.status.clone()
    }

    /// Receiver that observes every committed status change.
    pub fn subscribe(&self) -> watch::Receiver<ScrapeStatus> {
        self.inner.updates.subscribe()
    }

    pub fn max_run_duration(&self) -> Duration {
        self.inner.max_run_duration
    }

    async fn supervise(self, run_id: Uuid) {
        let outcome = self.execute().await;
        // finish logs a stale completion itself
        let _ = self.finish(run_id, outcome).await;
    }

    async fn execute(&self) -> RunOutcome {
        let task = Arc::clone(&self.inner.task);
        let mut handle = tokio::spawn(async move { task.run().await });

        match tokio::time::timeout(self.inner.max_run_duration, &mut handle).await {
            Ok(Ok(Ok(report))) => match utils::count_records(&report.output).await {
                Ok(books_scraped) => RunOutcome::Succeeded { books_scraped },
                Err(e) => RunOutcome::Failed {
                    error: format!(
                        "could not read scrape output {}: {e}",
                        report.output.display()
                    ),
                },
            },
            Ok(Ok(Err(e))) => RunOutcome::Failed {
                error: e.to_string(),
            },
            Ok(Err(join_error)) => RunOutcome::Failed {
                error: format!("scrape task panicked: {join_error}"),
            },
            Err(_) => {
                handle.abort();
                warn!(
                    limit_secs = self.inner.max_run_duration.as_secs_f64(),
                    "scrape run exceeded its time limit, aborted"
                );
                RunOutcome::Failed {
                    error: TIMEOUT_ERROR.to_string(),
                }
            }
        }
    }

    /// Applies the terminal transition for `run_id`.
    pub(crate) async fn finish(
        &self,
        run_id: Uuid,
        outcome: RunOutcome,
    ) -> Result<ScrapeStatus, ScrapeJobError> {
        let mut state = self.inner.state.lock().await;

        if state.active_run != Some(run_id) {
            error!(
                %run_id,
                active_run = ?state.active_run,
                ?outcome,
                "completion for a run that is not active, ignored"
            );
            return Err(ScrapeJobError::StaleCompletion { run_id });
        }
        state.active_run = None;

        let status = &mut state.status;
        status.running = false;
        status.end_time = Some(Utc::now());
        match outcome {
            RunOutcome::Succeeded { books_scraped } => {
                info!(%run_id, books_scraped, "scrape run completed");
                status.books_scraped = books_scraped;
                status.error = None;
            }
            RunOutcome::Failed { error } => {
                warn!(%run_id, %error, "scrape run failed");
                status.error = Some(error);
            }
        }

        let snapshot = status.clone();
        self.inner.updates.send_replace(snapshot.clone());
        Ok(snapshot)
    }
}
