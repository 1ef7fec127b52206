//! Job queue trait for abstracting fetch-job persistence.
//!
//! This module provides the [`JobQueue`] trait that abstracts job queue
//! operations, enabling different storage backends (a database table, the
//! in-memory queue used by tests and the CLI) and facilitating dependency
//! injection in the worker service.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{CreateJobRequest, FetchJob, JobStatus};

/// Trait for job queue persistence operations.
///
/// # Implementation Notes
///
/// Implementations should ensure:
/// - Atomic job claiming so two workers never process the same job
/// - Proper handling of retry scheduling (`next_retry_at`)
/// - Safe concurrent access from multiple workers
pub trait JobQueue: Send + Sync + Clone {
    /// Create a new job in the queue.
    ///
    /// Returns the created job with generated ID and timestamps.
    fn create_job(
        &self,
        request: CreateJobRequest,
    ) -> impl Future<Output = Result<FetchJob, AppError>> + Send;

    /// Claim the next available pending job for processing.
    ///
    /// Jobs are claimed in order of:
    /// 1. Non-retry jobs first (next_retry_at is unset)
    /// 2. Then retry-ready jobs (next_retry_at <= now)
    /// 3. Oldest first within each category
    ///
    /// Returns `None` if no jobs are available.
    fn claim_job(
        &self,
        worker_id: &str,
    ) -> impl Future<Output = Result<Option<FetchJob>, AppError>> + Send;

    /// Mark a job as completed with the number of fields filled.
    fn complete_job(
        &self,
        job_id: Uuid,
        fields_filled: usize,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Mark a job as failed with error message.
    ///
    /// If `next_retry_at` is provided, the job is reset to pending for
    /// retry with an incremented retry count. Otherwise, the job is marked
    /// as permanently failed.
    fn fail_job(
        &self,
        job_id: Uuid,
        error: &str,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Mark a job as cancelled.
    fn cancel_job(&self, job_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Get a job by ID.
    fn get_job(
        &self,
        job_id: Uuid,
    ) -> impl Future<Output = Result<Option<FetchJob>, AppError>> + Send;

    /// List jobs with optional status filter.
    ///
    /// Results are ordered by creation time (newest first).
    fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<FetchJob>, AppError>> + Send;

    /// Release all jobs claimed by a specific worker.
    ///
    /// Used for graceful shutdown to return all claimed jobs to the queue.
    /// Returns the number of jobs released.
    fn release_worker_jobs(
        &self,
        worker_id: &str,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;

    /// Get count of jobs by status.
    fn count_by_status(
        &self,
        status: JobStatus,
    ) -> impl Future<Output = Result<i64, AppError>> + Send;
}
