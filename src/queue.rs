//! Queue Inspector
//!
//! Read and retry access to the application's job queues through an opaque
//! [`QueueBackend`]. The inspector never lets a backend failure escape as a
//! fault: reads degrade to `None` / [`QueueError::Unavailable`], retries come
//! back as unsuccessful results. Exception text is truncated and scrubbed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::scrubber::PiiScrubber;

/// Longest exception text returned per job, before the ellipsis
pub const MAX_EXCEPTION_LENGTH: usize = 500;

/// Default and maximum page size for failed job listings
pub const DEFAULT_FAILED_LIMIT: usize = 50;
pub const MAX_FAILED_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The backend cannot be asked at all
    #[error("Queue backend unavailable: {0}")]
    Unavailable(String),

    /// The backend was asked and failed
    #[error("{0}")]
    Backend(String),
}

/// A job that exhausted its attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedJob {
    pub id: String,
    pub connection: String,
    pub queue: String,
    pub failed_at: String,
    pub exception: String,
}

/// Provider of queue state
#[async_trait]
pub trait QueueBackend: std::fmt::Debug + Send + Sync {
    /// Name of the connection being inspected
    fn connection(&self) -> String;

    /// Queues worth reporting on
    fn queues(&self) -> Vec<String>;

    /// Pending jobs on `queue`
    async fn size(&self, queue: &str) -> Result<u64, QueueError>;

    async fn failed_count(&self) -> Result<u64, QueueError>;

    /// Up to `limit` failed jobs, most recent first
    async fn failed_jobs(&self, limit: usize) -> Result<Vec<FailedJob>, QueueError>;

    /// Push one failed job back onto its queue; `Ok(false)` if no such job
    async fn retry(&self, id: &str) -> Result<bool, QueueError>;

    /// Push every failed job back onto its queue
    async fn retry_all(&self) -> Result<(), QueueError>;
}

/// Backend used when no queue is wired in; every call is unavailable
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableQueue;

impl UnavailableQueue {
    fn error() -> QueueError {
        QueueError::Unavailable("no queue backend configured".to_string())
    }
}

#[async_trait]
impl QueueBackend for UnavailableQueue {
    fn connection(&self) -> String {
        "none".to_string()
    }

    fn queues(&self) -> Vec<String> {
        vec!["default".to_string()]
    }

    async fn size(&self, _queue: &str) -> Result<u64, QueueError> {
        Err(Self::error())
    }

    async fn failed_count(&self) -> Result<u64, QueueError> {
        Err(Self::error())
    }

    async fn failed_jobs(&self, _limit: usize) -> Result<Vec<FailedJob>, QueueError> {
        Err(Self::error())
    }

    async fn retry(&self, _id: &str) -> Result<bool, QueueError> {
        Err(Self::error())
    }

    async fn retry_all(&self) -> Result<(), QueueError> {
        Err(Self::error())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// `None` when the size could not be read
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueOverview {
    pub connection: String,
    pub queues: BTreeMap<String, QueueStats>,
    /// `None` when the count could not be read
    pub failed_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryAllResult {
    pub success: bool,
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct QueueInspector {
    backend: Arc<dyn QueueBackend>,
    scrubber: Arc<PiiScrubber>,
}

impl QueueInspector {
    pub fn new(backend: Arc<dyn QueueBackend>, scrubber: Arc<PiiScrubber>) -> Self {
        Self { backend, scrubber }
    }

    pub async fn overview(&self) -> QueueOverview {
        let mut queues = BTreeMap::new();
        for name in self.backend.queues() {
            let size = match self.backend.size(&name).await {
                Ok(size) => Some(size),
                Err(e) => {
                    warn!(queue = %name, "Unable to read queue size: {}", e);
                    None
                }
            };
            queues.insert(name, QueueStats { size });
        }

        let failed_count = match self.backend.failed_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Unable to count failed jobs: {}", e);
                None
            }
        };

        QueueOverview {
            connection: self.backend.connection(),
            queues,
            failed_count,
        }
    }

    /// Failed jobs with truncated, scrubbed exception text.
    ///
    /// Any backend failure is reported as [`QueueError::Unavailable`], so an
    /// empty list always means there are no failed jobs.
    pub async fn failed_jobs(&self, limit: usize) -> Result<Vec<FailedJob>, QueueError> {
        let jobs = self.backend.failed_jobs(limit).await.map_err(|e| {
            warn!("Unable to list failed jobs: {}", e);
            let (QueueError::Unavailable(message) | QueueError::Backend(message)) = e;
            QueueError::Unavailable(self.scrubber.scrub(&message))
        })?;

        Ok(jobs
            .into_iter()
            .take(limit)
            .map(|job| FailedJob {
                exception: self
                    .scrubber
                    .scrub(&truncate_exception(job.exception)),
                ..job
            })
            .collect())
    }

    pub async fn retry_job(&self, id: &str) -> RetryResult {
        match self.backend.retry(id).await {
            Ok(true) => RetryResult {
                success: true,
                message: format!("Job {} has been pushed back onto the queue.", id),
            },
            Ok(false) => RetryResult {
                success: false,
                message: "Failed to retry job. It may not exist or has already been retried."
                    .to_string(),
            },
            Err(e) => RetryResult {
                success: false,
                message: format!("Failed to retry job: {}", self.scrubber.scrub(&e.to_string())),
            },
        }
    }

    pub async fn retry_all(&self) -> RetryAllResult {
        let failure = |e: QueueError| RetryAllResult {
            success: false,
            message: format!("Failed to retry jobs: {}", self.scrubber.scrub(&e.to_string())),
            count: 0,
        };

        let count = match self.backend.failed_count().await {
            Ok(count) => count,
            Err(e) => return failure(e),
        };

        if count == 0 {
            return RetryAllResult {
                success: true,
                message: "No failed jobs to retry.".to_string(),
                count: 0,
            };
        }

        match self.backend.retry_all().await {
            Ok(()) => RetryAllResult {
                success: true,
                message: format!("All {} failed jobs have been pushed back onto the queue.", count),
                count,
            },
            Err(e) => failure(e),
        }
    }
}

fn truncate_exception(mut exception: String) -> String {
    if exception.len() <= MAX_EXCEPTION_LENGTH {
        return exception;
    }
    let mut cut = MAX_EXCEPTION_LENGTH;
    while !exception.is_char_boundary(cut) {
        cut -= 1;
    }
    exception.truncate(cut);
    exception.push_str("...");
    exception
}
