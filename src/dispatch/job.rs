//! In-memory correlation of enqueued requests with their eventual outcome.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Finished jobs are kept around until the registry reaches this size.
const RETAIN_LIMIT: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub topic: &'static str,
    pub status: JobStatus,
    /// The driver's outcome message once the job settles.
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl JobRegistry {
    pub fn enqueue(&self, topic: &'static str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let job = Job {
            id,
            topic,
            status: JobStatus::Queued,
            detail: None,
            created_at: now,
            updated_at: now,
        };

        let mut jobs = self.jobs.lock().expect("job registry poisoned");
        if jobs.len() >= RETAIN_LIMIT {
            jobs.retain(|_, job| {
                matches!(job.status, JobStatus::Queued | JobStatus::Running)
            });
        }
        jobs.insert(id, job);
        id
    }

    pub fn running(&self, id: Uuid) {
        self.update(id, JobStatus::Running, None);
    }

    pub fn finish(&self, id: Uuid, outcome: Result<String, String>) {
        match outcome {
            Ok(detail) => self.update(id, JobStatus::Done, Some(detail)),
            Err(detail) => self.update(id, JobStatus::Failed, Some(detail)),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs
            .lock()
            .expect("job registry poisoned")
            .get(&id)
            .cloned()
    }

    fn update(&self, id: Uuid, status: JobStatus, detail: Option<String>) {
        let mut jobs = self.jobs.lock().expect("job registry poisoned");
        if let Some(job) = jobs.get_mut(&id) {
            job.status = status;
            if detail.is_some() {
                job.detail = detail;
            }
            job.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_move_through_their_lifecycle() {
        let registry = JobRegistry::default();
        let id = registry.enqueue("create-vm");
        assert_eq!(registry.get(id).unwrap().status, JobStatus::Queued);

        registry.running(id);
        assert_eq!(registry.get(id).unwrap().status, JobStatus::Running);

        registry.finish(id, Ok("Màquina virtual creada con èxito".into()));
        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.detail.as_deref(), Some("Màquina virtual creada con èxito"));
    }

    #[test]
    fn failures_record_the_driver_message() {
        let registry = JobRegistry::default();
        let id = registry.enqueue("manage-vm");
        registry.running(id);
        registry.finish(id, Err("Nombre de la MV no disponible".into()));
        let job = registry.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.detail.as_deref(), Some("Nombre de la MV no disponible"));
    }

    #[test]
    fn unknown_ids_are_absent() {
        let registry = JobRegistry::default();
        assert!(registry.get(Uuid::new_v4()).is_none());
    }
}
