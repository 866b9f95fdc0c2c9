//! Detached background indexing with a completion channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, oneshot, Semaphore};
use uuid::Uuid;

use super::error::RagErrorKind;
use super::indexer::FileDescriptor;
use super::service::{RagService, RunStatus};

const REPORT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub job_id: Uuid,
    pub context_id: String,
    pub file_id: String,
    pub result: RunStatus,
    pub finished_at: DateTime<Utc>,
}

/// Handle returned to the caller that triggered a run.
pub struct IndexTicket {
    pub job_id: Uuid,
    pub done: oneshot::Receiver<IndexReport>,
}

/// Runs indexing jobs in the background, at most `max_concurrent_runs` at
/// a time. Jobs for the same file additionally queue behind each other
/// inside the indexer.
#[derive(Clone)]
pub struct IndexScheduler {
    service: Arc<RagService>,
    permits: Arc<Semaphore>,
    reports: broadcast::Sender<IndexReport>,
}

impl IndexScheduler {
    pub fn new(service: Arc<RagService>, max_concurrent_runs: usize) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            service,
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            reports,
        }
    }

    /// Every finished run, in completion order.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexReport> {
        self.reports.subscribe()
    }

    /// Start indexing `file` and return immediately.
    pub fn submit(&self, file: FileDescriptor, text: String) -> IndexTicket {
        let job_id = Uuid::new_v4();
        let (done_tx, done_rx) = oneshot::channel();
        let service = self.service.clone();
        let permits = self.permits.clone();
        let reports = self.reports.clone();

        tracing::info!(
            "Queued indexing job {} for file {} in context {}",
            job_id,
            file.file_id,
            file.context_id
        );

        tokio::spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => service.index_file(&file, &text).await,
                // The semaphore is never closed.
                Err(err) => RunStatus::Failed {
                    kind: RagErrorKind::Configuration,
                    message: err.to_string(),
                },
            };

            let report = IndexReport {
                job_id,
                context_id: file.context_id,
                file_id: file.file_id,
                result,
                finished_at: Utc::now(),
            };
            tracing::debug!("Indexing job {} finished", job_id);

            // No subscribers or a dropped ticket are both fine.
            let _ = reports.send(report.clone());
            let _ = done_tx.send(report);
        });

        IndexTicket {
            job_id,
            done: done_rx,
        }
    }
}
