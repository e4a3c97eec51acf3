//! Background housekeeping for custom field data.
//!
//! Schema edits that would leave stored data stale (deleting a field,
//! renaming a choice) enqueue a [`MaintenanceJob`] after their own
//! transaction commits. A [`MaintenanceWorker`] applies the jobs later, so
//! stored data converges on the schema eventually rather than immediately.

mod queue;
mod tasks;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

pub use queue::{ChannelQueue, MaintenanceWorker, WorkerStats, channel};
pub use tasks::{purge_field_data, rename_choice_data, run_job};

use crate::error::Result;
use crate::types::ContentTypeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaintenanceJob {
    /// Remove `field_name` from the data of every record of these types.
    PurgeField {
        field_name: String,
        content_types: Vec<ContentTypeId>,
    },
    /// Replace `old_value` with `new_value` wherever the field stores it.
    RenameChoiceValue {
        field_id: String,
        old_value: String,
        new_value: String,
    },
}

impl MaintenanceJob {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PurgeField { .. } => "purge_field",
            Self::RenameChoiceValue { .. } => "rename_choice_value",
        }
    }
}

/// Fire-and-forget sink for maintenance jobs.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: MaintenanceJob) -> Result<()>;
}

/// Queue that only records what was enqueued. Useful in tests and for
/// callers that run jobs themselves.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<MaintenanceJob>>,
}

impl RecordingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every job enqueued so far.
    #[must_use]
    pub fn jobs(&self) -> Vec<MaintenanceJob> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Removes and returns every job enqueued so far.
    pub fn take(&self) -> Vec<MaintenanceJob> {
        std::mem::take(&mut *self.jobs.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl JobQueue for RecordingQueue {
    fn enqueue(&self, job: MaintenanceJob) -> Result<()> {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(job);
        Ok(())
    }
}
