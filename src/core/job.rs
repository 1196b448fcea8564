//! Background scrape jobs.
//!
//! A submitted job runs on its own tokio task with a fresh browser session.
//! Callers get a [`JobTicket`] to watch, await or cancel it; the trigger also
//! answers status queries at any time.

use crate::core::engine::{RunRequest, ScrapeEngine};
use crate::domain::model::RunSummary;
use crate::domain::ports::{MapPage, PageFactory, RecordSink};
use crate::utils::error::{Result, ScrapeError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running {
        started_at: DateTime<Utc>,
        queries: usize,
        current: Option<String>,
    },
    Completed(RunSummary),
    Failed {
        message: String,
    },
    Cancelled,
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, JobStatus::Running { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed(_) | JobStatus::Failed { .. } | JobStatus::Cancelled
        )
    }
}

/// Handle on one submitted job.
pub struct JobTicket {
    status: watch::Receiver<JobStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl JobTicket {
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the job's task to finish and returns its final status.
    pub async fn wait(self) -> JobStatus {
        if let Err(e) = self.task.await {
            tracing::error!("Scrape task ended abnormally: {}", e);
            return JobStatus::Failed {
                message: e.to_string(),
            };
        }
        let status = self.status.borrow().clone();
        status
    }
}

/// Starts scrape jobs without blocking the caller. One job runs at a time.
pub struct JobTrigger<F: PageFactory, K: RecordSink> {
    factory: Arc<F>,
    engine: Arc<ScrapeEngine<K>>,
    status: watch::Sender<JobStatus>,
    active: Mutex<Option<CancellationToken>>,
}

impl<F, K> JobTrigger<F, K>
where
    F: PageFactory + 'static,
    K: RecordSink + 'static,
{
    pub fn new(factory: F, engine: ScrapeEngine<K>) -> Self {
        let (status, _) = watch::channel(JobStatus::Idle);
        Self {
            factory: Arc::new(factory),
            engine: Arc::new(engine),
            status,
            active: Mutex::new(None),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    /// Cancels the running job, if any. Returns whether there was one.
    pub async fn cancel(&self) -> bool {
        match self.active.lock().await.as_ref() {
            Some(token) if self.status().is_running() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub async fn submit(&self, queries: Vec<String>, max_results: Option<usize>) -> Result<JobTicket> {
        let queries: Vec<String> = queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if queries.is_empty() {
            return Err(ScrapeError::ConfigError {
                message: "No search terms provided".to_string(),
            });
        }

        let mut active = self.active.lock().await;
        if self.status().is_running() {
            return Err(ScrapeError::JobBusy);
        }

        let cancel = CancellationToken::new();
        *active = Some(cancel.clone());

        let request = RunRequest::new(queries).with_max_results(max_results);
        self.status.send_replace(JobStatus::Running {
            started_at: Utc::now(),
            queries: request.queries.len(),
            current: None,
        });
        tracing::info!("Starting scrape job for {} queries", request.queries.len());

        let task = tokio::spawn(run_job(
            Arc::clone(&self.factory),
            Arc::clone(&self.engine),
            request,
            self.status.clone(),
            cancel.clone(),
        ));

        Ok(JobTicket {
            status: self.status.subscribe(),
            cancel,
            task,
        })
    }
}

async fn run_job<F, K>(
    factory: Arc<F>,
    engine: Arc<ScrapeEngine<K>>,
    request: RunRequest,
    status: watch::Sender<JobStatus>,
    cancel: CancellationToken,
) where
    F: PageFactory,
    K: RecordSink,
{
    let outcome = async {
        let mut page = factory.launch().await?;
        let result = engine
            .run_with_progress(&mut page, &request, &cancel, |_, query| {
                status.send_modify(|s| {
                    if let JobStatus::Running { current, .. } = s {
                        *current = Some(query.to_string());
                    }
                });
            })
            .await;

        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close browser session: {}", e);
        }
        result
    }
    .await;

    let final_status = match outcome {
        Ok(summary) => {
            tracing::info!(
                "Scrape job finished: {} records, {} failed listings",
                summary.total_records(),
                summary.total_failed()
            );
            JobStatus::Completed(summary)
        }
        Err(ScrapeError::Cancelled) => {
            tracing::info!("Scrape job cancelled");
            JobStatus::Cancelled
        }
        Err(e) => {
            tracing::error!("Scrape job failed: {}", e);
            JobStatus::Failed {
                message: e.user_friendly_message(),
            }
        }
    };
    status.send_replace(final_status);
}
