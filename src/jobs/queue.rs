use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{error, info};

use super::{JobQueue, MaintenanceJob, run_job};
use crate::error::{Error, Result};
use crate::store::SharedStore;

/// Sending half of the maintenance channel.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: UnboundedSender<MaintenanceJob>,
}

impl JobQueue for ChannelQueue {
    fn enqueue(&self, job: MaintenanceJob) -> Result<()> {
        self.sender.send(job).map_err(|_| Error::QueueClosed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub records_updated: u64,
}

/// Receiving half of the maintenance channel; applies jobs to the store.
pub struct MaintenanceWorker {
    store: SharedStore,
    receiver: UnboundedReceiver<MaintenanceJob>,
    queue_name: String,
    stats: WorkerStats,
}

/// Creates a connected queue and worker for the named queue.
pub fn channel(store: SharedStore, queue_name: impl Into<String>) -> (ChannelQueue, MaintenanceWorker) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let worker = MaintenanceWorker {
        store,
        receiver,
        queue_name: queue_name.into(),
        stats: WorkerStats::default(),
    };
    (ChannelQueue { sender }, worker)
}

impl MaintenanceWorker {
    /// Processes jobs until every queue handle has been dropped.
    /// A failed job is logged and skipped; retrying is left to the caller.
    pub async fn run(mut self) -> WorkerStats {
        info!(queue = %self.queue_name, "Maintenance worker started");

        while let Some(job) = self.receiver.recv().await {
            let store = self.store.clone();
            let kind = job.kind();
            let result = tokio::task::spawn_blocking(move || run_job(store.as_ref(), &job))
                .await
                .unwrap_or_else(|e| Err(Error::Internal(format!("maintenance job panicked: {e}"))));
            self.record(kind, result);
        }

        info!(
            queue = %self.queue_name,
            completed = self.stats.jobs_completed,
            failed = self.stats.jobs_failed,
            "Maintenance worker stopped"
        );
        self.stats
    }

    /// Processes whatever is already queued, without waiting for more.
    pub fn run_pending(&mut self) -> WorkerStats {
        loop {
            match self.receiver.try_recv() {
                Ok(job) => {
                    let result = run_job(self.store.as_ref(), &job);
                    self.record(job.kind(), result);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        self.stats
    }

    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    fn record(&mut self, kind: &'static str, result: Result<usize>) {
        match result {
            Ok(records) => {
                self.stats.jobs_completed += 1;
                self.stats.records_updated += records as u64;
            }
            Err(e) => {
                self.stats.jobs_failed += 1;
                error!(queue = %self.queue_name, job = kind, "Maintenance job failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::{SqliteStore, Store};
    use crate::types::{CustomFieldData, Record};
    use serde_json::json;
    use tempfile::TempDir;

    fn shared_store(temp: &TempDir) -> SharedStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        Arc::new(store)
    }

    #[test]
    fn test_run_pending_applies_queued_jobs() {
        let temp = TempDir::new().unwrap();
        let store = shared_store(&temp);
        let device = store.get_or_create_content_type("dcim", "device").unwrap();
        let data: CustomFieldData = [("gone", json!("x"))].into_iter().collect();
        let record = Record::new(device.id, data);
        store.create_record(&record).unwrap();

        let (queue, mut worker) = channel(store.clone(), "custom_fields");
        queue
            .enqueue(MaintenanceJob::PurgeField {
                field_name: "gone".to_string(),
                content_types: vec![device.id],
            })
            .unwrap();
        queue
            .enqueue(MaintenanceJob::RenameChoiceValue {
                field_id: "no-such-field".to_string(),
                old_value: "a".to_string(),
                new_value: "b".to_string(),
            })
            .unwrap();

        let stats = worker.run_pending();
        assert_eq!(stats.jobs_completed, 1);
        assert_eq!(stats.jobs_failed, 1);
        assert_eq!(stats.records_updated, 1);

        let record = store.get_record(&record.id).unwrap().unwrap();
        assert!(record.cf().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_when_queue_dropped() {
        let temp = TempDir::new().unwrap();
        let store = shared_store(&temp);
        let (queue, worker) = channel(store, "custom_fields");
        let handle = tokio::spawn(worker.run());

        queue
            .enqueue(MaintenanceJob::PurgeField {
                field_name: "unused".to_string(),
                content_types: vec![],
            })
            .unwrap();
        drop(queue);

        let stats = handle.await.unwrap();
        assert_eq!(stats.jobs_completed, 1);
        assert_eq!(stats.records_updated, 0);
    }

    #[test]
    fn test_enqueue_after_worker_dropped_fails() {
        let temp = TempDir::new().unwrap();
        let (queue, worker) = channel(shared_store(&temp), "custom_fields");
        drop(worker);

        let result = queue.enqueue(MaintenanceJob::PurgeField {
            field_name: "x".to_string(),
            content_types: vec![],
        });
        assert!(matches!(result, Err(Error::QueueClosed)));
    }
}
