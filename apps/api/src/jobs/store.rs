//! In-process job store for background generations.
//!
//! One instance is built at startup and shared through `AppState`. Expired jobs are
//! swept on every `create`; there is no timer.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Fetching,
    Analyzing,
    Generating,
    Formatting,
    Completed,
    Error,
}

impl JobStatus {
    /// Position along the success path. Both terminal states share the last rank.
    fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Fetching => 1,
            JobStatus::Analyzing => 2,
            JobStatus::Generating => 3,
            JobStatus::Formatting => 4,
            JobStatus::Completed | JobStatus::Error => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial fields merged into a job by `JobStore::update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn phase(status: JobStatus, progress: u8) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn completed(result: Value) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            progress: None,
            result: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Clone)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    retention: Duration,
}

impl JobStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// `job_<unix-millis>_<6 base36 chars>`
    pub fn new_id() -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();
        format!("job_{}_{}", Utc::now().timestamp_millis(), suffix)
    }

    pub fn create(&self, id: &str) -> Job {
        self.create_at(id, Utc::now())
    }

    /// Inserts a pending job stamped with `now` and evicts every job older than
    /// the retention window relative to `now`.
    pub fn create_at(&self, id: &str, now: DateTime<Utc>) -> Job {
        let job = Job {
            id: id.to_string(),
            status: JobStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            created_at: now,
        };

        let retention = chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(retention).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|_, existing| existing.created_at >= cutoff);
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!("Evicted {evicted} expired jobs");
        }
        jobs.insert(job.id.clone(), job.clone());
        job
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.read().get(id).cloned()
    }

    /// Merges `update` into the job if it exists; unknown ids are ignored.
    ///
    /// Terminal jobs are frozen, status only moves forward, progress never drops,
    /// and `result`/`error` are only stored alongside their terminal status.
    pub fn update(&self, id: &str, update: JobUpdate) {
        let mut jobs = self.write();
        let Some(job) = jobs.get_mut(id) else {
            return;
        };
        if job.status.is_terminal() {
            debug!("Ignoring update to finished job {id}");
            return;
        }

        if let Some(status) = update.status {
            if status.rank() >= job.status.rank() {
                job.status = status;
            }
        }
        if let Some(progress) = update.progress {
            job.progress = job.progress.max(progress.min(100));
        }
        match job.status {
            JobStatus::Completed => {
                job.result = update.result;
                job.progress = 100;
            }
            JobStatus::Error => {
                job.error = Some(
                    update
                        .error
                        .unwrap_or_else(|| "Generation failed".to_string()),
                );
            }
            _ => {}
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.read().len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> JobStore {
        JobStore::new(Duration::from_secs(3600))
    }

    #[test]
    fn test_unknown_job_is_absent_and_update_is_noop() {
        let store = store();
        assert!(store.get("job_missing").is_none());
        store.update("job_missing", JobUpdate::phase(JobStatus::Fetching, 10));
        assert!(store.get("job_missing").is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_create_starts_pending_at_zero() {
        let store = store();
        let id = JobStore::new_id();
        store.create(&id);
        let job = store.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.result.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_create_evicts_expired_jobs() {
        let store = store();
        let now = Utc::now();
        store.create_at("old", now - chrono::Duration::seconds(3601));
        store.create_at("recent", now - chrono::Duration::seconds(60));
        assert_eq!(store.len(), 2);

        store.create_at("new", now);
        assert!(store.get("old").is_none());
        assert!(store.get("recent").is_some());
        assert!(store.get("new").is_some());
    }

    #[test]
    fn test_update_moves_forward_and_keeps_progress_monotonic() {
        let store = store();
        store.create("job");
        store.update("job", JobUpdate::phase(JobStatus::Analyzing, 40));
        store.update("job", JobUpdate::phase(JobStatus::Fetching, 10));

        let job = store.get("job").unwrap();
        assert_eq!(job.status, JobStatus::Analyzing);
        assert_eq!(job.progress, 40);
    }

    #[test]
    fn test_completed_job_is_frozen() {
        let store = store();
        store.create("job");
        store.update("job", JobUpdate::completed(json!({"personas": []})));
        store.update("job", JobUpdate::phase(JobStatus::Generating, 50));
        store.update("job", JobUpdate::failed("late failure"));

        let job = store.get("job").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.result, Some(json!({"personas": []})));
        assert!(job.error.is_none());
    }

    #[test]
    fn test_error_reachable_from_any_phase_and_absorbing() {
        let store = store();
        store.create("job");
        store.update("job", JobUpdate::phase(JobStatus::Generating, 50));
        store.update("job", JobUpdate::failed("No valid JSON found in response"));
        store.update("job", JobUpdate::completed(json!({})));

        let job = store.get("job").unwrap();
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.progress, 50);
        assert_eq!(job.error.as_deref(), Some("No valid JSON found in response"));
        assert!(job.result.is_none());
    }

    #[test]
    fn test_result_ignored_without_completed_status() {
        let store = store();
        store.create("job");
        store.update(
            "job",
            JobUpdate {
                status: Some(JobStatus::Formatting),
                progress: Some(95),
                result: Some(json!({"personas": []})),
                error: Some("stray".to_string()),
            },
        );
        let job = store.get("job").unwrap();
        assert_eq!(job.status, JobStatus::Formatting);
        assert!(job.result.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_new_id_shape() {
        let id = JobStore::new_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "job");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(JobStore::new_id(), JobStore::new_id());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(JobStatus::Analyzing).unwrap(), "analyzing");
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Formatting.is_terminal());
    }
}
