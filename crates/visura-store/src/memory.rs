//! In-memory store and job queue.
//!
//! Interior mutability through `Arc<Mutex<_>>`; locks are never held
//! across await points, so the async trait methods stay trivially Send.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use visura_core::error::AppError;
use visura_core::job::{CreateJobRequest, FetchJob, JobStatus, RetryConfig};
use visura_core::job_queue::JobQueue;
use visura_core::models::{MarketAttribute, MarketAttributeResponse, ResponseWrite};
use visura_core::status::{ProviderFetchState, SyncStatus};
use visura_core::traits::{ApplicationStore, ResponseStore};

// =============================================================================
// MemoryStore
// =============================================================================

#[derive(Default)]
struct StoreInner {
    attributes: Vec<MarketAttribute>,
    responses: HashMap<(Uuid, String), MarketAttributeResponse>,
    fetch_status: HashMap<(Uuid, String), ProviderFetchState>,
    completed: HashSet<Uuid>,
    sync_status: HashMap<Uuid, SyncStatus>,
}

/// In-memory [`ResponseStore`] + [`ApplicationStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with the attribute catalog.
    pub fn with_attributes(attributes: Vec<MarketAttribute>) -> Self {
        let store = Self::new();
        store.inner.lock().unwrap().attributes = attributes;
        store
    }

    /// Replaces the attribute catalog.
    pub fn set_attributes(&self, attributes: Vec<MarketAttribute>) {
        self.inner.lock().unwrap().attributes = attributes;
    }

    /// Marks an application as finalized.
    pub fn mark_completed(&self, application_id: Uuid) {
        self.inner.lock().unwrap().completed.insert(application_id);
    }

    /// Overrides an application's sync status (test/seed helper).
    pub fn set_sync_status(&self, application_id: Uuid, status: SyncStatus) {
        self.inner
            .lock()
            .unwrap()
            .sync_status
            .insert(application_id, status);
    }

    /// Returns one response row, if present.
    pub fn response(
        &self,
        application_id: Uuid,
        attribute_key: &str,
    ) -> Option<MarketAttributeResponse> {
        self.inner
            .lock()
            .unwrap()
            .responses
            .get(&(application_id, attribute_key.to_string()))
            .cloned()
    }

    /// Returns all response rows for an application.
    pub fn responses_for(&self, application_id: Uuid) -> Vec<MarketAttributeResponse> {
        self.inner
            .lock()
            .unwrap()
            .responses
            .values()
            .filter(|r| r.application_id == application_id)
            .cloned()
            .collect()
    }
}

impl ResponseStore for MemoryStore {
    async fn attributes_for_provider(
        &self,
        provider: &str,
    ) -> Result<Vec<MarketAttribute>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .attributes
            .iter()
            .filter(|a| a.api_name.as_deref() == Some(provider))
            .cloned()
            .collect())
    }

    async fn find_response(
        &self,
        application_id: Uuid,
        attribute_key: &str,
    ) -> Result<Option<MarketAttributeResponse>, AppError> {
        Ok(self.response(application_id, attribute_key))
    }

    async fn upsert_response(
        &self,
        application_id: Uuid,
        attribute_key: &str,
        write: ResponseWrite,
    ) -> Result<(), AppError> {
        self.inner.lock().unwrap().responses.insert(
            (application_id, attribute_key.to_string()),
            MarketAttributeResponse {
                application_id,
                attribute_key: attribute_key.to_string(),
                value: write.value,
                source: write.source,
                documents: write.documents,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}

impl ApplicationStore for MemoryStore {
    async fn read_fetch_status(
        &self,
        application_id: Uuid,
        provider: &str,
    ) -> Result<Option<ProviderFetchState>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .fetch_status
            .get(&(application_id, provider.to_string()))
            .copied())
    }

    async fn set_fetch_status(
        &self,
        application_id: Uuid,
        provider: &str,
        state: ProviderFetchState,
    ) -> Result<(), AppError> {
        self.inner
            .lock()
            .unwrap()
            .fetch_status
            .insert((application_id, provider.to_string()), state);
        Ok(())
    }

    async fn is_completed(&self, application_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .completed
            .contains(&application_id))
    }

    async fn sync_status(&self, application_id: Uuid) -> Result<SyncStatus, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sync_status
            .get(&application_id)
            .copied()
            .unwrap_or(SyncStatus::Pending))
    }

    async fn transition_sync_status(
        &self,
        application_id: Uuid,
        from: SyncStatus,
        to: SyncStatus,
    ) -> Result<bool, AppError> {
        if !from.can_transition(to) {
            return Err(AppError::StoreError(format!(
                "illegal sync transition {} -> {}",
                from, to
            )));
        }

        let mut inner = self.inner.lock().unwrap();
        let current = inner
            .sync_status
            .get(&application_id)
            .copied()
            .unwrap_or(SyncStatus::Pending);

        if current != from {
            return Ok(false);
        }

        inner.sync_status.insert(application_id, to);
        Ok(true)
    }
}

// =============================================================================
// MemoryJobQueue
// =============================================================================

/// In-memory [`JobQueue`].
#[derive(Clone, Default)]
pub struct MemoryJobQueue {
    jobs: Arc<Mutex<HashMap<Uuid, FetchJob>>>,
}

impl MemoryJobQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobQueue for MemoryJobQueue {
    async fn create_job(&self, request: CreateJobRequest) -> Result<FetchJob, AppError> {
        let now = Utc::now();
        let job = FetchJob {
            id: Uuid::new_v4(),
            application_id: request.application_id,
            company_ref: request.company_ref,
            provider: request.provider,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries: request
                .max_retries
                .unwrap_or(RetryConfig::default().max_retries),
            next_retry_at: None,
            error_message: None,
            fields_filled: None,
            worker_id: None,
        };
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(job)
    }

    async fn claim_job(&self, worker_id: &str) -> Result<Option<FetchJob>, AppError> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();

        // Non-retry jobs first, then retry-ready jobs, oldest first.
        let candidate = jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Pending
                    && j.next_retry_at.is_none_or(|retry_at| retry_at <= now)
            })
            .min_by_key(|j| (j.next_retry_at.is_some(), j.created_at))
            .map(|j| j.id);

        match candidate.and_then(|id| jobs.get_mut(&id)) {
            Some(job) => {
                job.status = JobStatus::Running;
                job.worker_id = Some(worker_id.to_string());
                job.started_at = Some(now);
                job.updated_at = now;
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn complete_job(&self, job_id: Uuid, fields_filled: usize) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::StoreError(format!("job not found: {}", job_id)))?;
        let now = Utc::now();
        job.status = JobStatus::Completed;
        job.fields_filled = Some(fields_filled);
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(())
    }

    async fn fail_job(
        &self,
        job_id: Uuid,
        error: &str,
        next_retry_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::StoreError(format!("job not found: {}", job_id)))?;
        let now = Utc::now();
        job.error_message = Some(error.to_string());
        job.updated_at = now;

        match next_retry_at {
            Some(retry_at) => {
                job.status = JobStatus::Pending;
                job.retry_count += 1;
                job.next_retry_at = Some(retry_at);
                job.worker_id = None;
            }
            None => {
                job.status = JobStatus::Failed;
                job.completed_at = Some(now);
            }
        }
        Ok(())
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::StoreError(format!("job not found: {}", job_id)))?;
        let now = Utc::now();
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<FetchJob>, AppError> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<FetchJob>, AppError> {
        let jobs = self.jobs.lock().unwrap();
        let mut listed: Vec<FetchJob> = jobs
            .values()
            .filter(|j| status.is_none_or(|s| j.status == s))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.truncate(limit);
        Ok(listed)
    }

    async fn release_worker_jobs(&self, worker_id: &str) -> Result<u64, AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let mut released = 0;
        for job in jobs.values_mut() {
            if job.status == JobStatus::Running && job.worker_id.as_deref() == Some(worker_id) {
                job.status = JobStatus::Pending;
                job.worker_id = None;
                job.started_at = None;
                job.updated_at = Utc::now();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64, AppError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == status)
            .count() as i64)
    }
}
