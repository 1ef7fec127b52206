//! Job queue types for per-provider fetch jobs.
//!
//! One job exists per provider per application. Jobs flow through these
//! states:
//! ```text
//! pending → running → completed
//!              ↓
//!           failed (if retries exhausted or the error is fatal)
//!              ↓
//!           pending (if retries available, with next_retry_at)
//! ```
//!
//! # Retry Strategy
//!
//! Retries are job-level re-enqueues with exponential backoff, never
//! in-process loops:
//! - Attempt 1: 1 minute
//! - Attempt 2: 5 minutes
//! - Attempt 3: 30 minutes
//! - After max retries: permanently failed

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Job Status
// =============================================================================

/// Status of a fetch job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is waiting to be processed.
    Pending,
    /// Job is currently being processed by a worker.
    Running,
    /// Job completed successfully.
    Completed,
    /// Job failed fatally or after exhausting all retries.
    Failed,
    /// Job was cancelled (e.g. the application was finalized first).
    Cancelled,
}

impl JobStatus {
    /// Returns the string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Error type for parsing JobStatus from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseJobStatusError(String);

impl std::fmt::Display for ParseJobStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid job status: {}", self.0)
    }
}

impl std::error::Error for ParseJobStatusError {}

impl std::str::FromStr for JobStatus {
    type Err = ParseJobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(ParseJobStatusError(s.to_string())),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Retry Configuration
// =============================================================================

/// Configuration for job retry behavior with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Maximum delay cap.
    pub max_delay: TimeDelta,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_delay: TimeDelta::minutes(60),
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given retry attempt using exponential backoff.
    ///
    /// - Attempt 1: 1 minute
    /// - Attempt 2: 5 minutes
    /// - Attempt 3: 30 minutes
    /// - Attempt 4+: 60 minutes (capped)
    pub fn delay_for_attempt(&self, attempt: u32) -> TimeDelta {
        if attempt == 0 {
            return TimeDelta::zero();
        }

        let minutes = match attempt {
            1 => 1,
            2 => 5,
            3 => 30,
            _ => 60,
        };

        let delay = TimeDelta::minutes(minutes);
        std::cmp::min(delay, self.max_delay)
    }
}

// =============================================================================
// Fetch Job
// =============================================================================

/// A per-provider fetch job in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchJob {
    /// Unique job identifier.
    pub id: Uuid,

    /// Owning application.
    pub application_id: Uuid,

    /// The company's tax/social-security reference number.
    pub company_ref: String,

    /// Canonical provider name this job fetches from.
    pub provider: String,

    /// Current job status.
    pub status: JobStatus,

    /// When the job was created.
    pub created_at: DateTime<Utc>,

    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,

    /// When the job started processing.
    pub started_at: Option<DateTime<Utc>>,

    /// When the job completed (success or failure).
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of retry attempts made.
    pub retry_count: u32,

    /// Maximum retries allowed.
    pub max_retries: u32,

    /// When to attempt the next retry.
    pub next_retry_at: Option<DateTime<Utc>>,

    /// Error message if failed.
    pub error_message: Option<String>,

    /// Fields filled by the last successful run.
    pub fields_filled: Option<usize>,

    /// ID of the worker processing this job.
    pub worker_id: Option<String>,
}

impl FetchJob {
    /// Check if the job can be retried.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Calculate the next retry time based on current retry count.
    pub fn calculate_next_retry(&self, config: &RetryConfig) -> DateTime<Utc> {
        let delay = config.delay_for_attempt(self.retry_count + 1);
        Utc::now() + delay
    }
}

// =============================================================================
// Job Creation Request
// =============================================================================

/// Request to create a new fetch job.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    /// Owning application.
    pub application_id: Uuid,
    /// Company reference number.
    pub company_ref: String,
    /// Canonical provider name.
    pub provider: String,
    /// Maximum retries (uses default if None).
    pub max_retries: Option<u32>,
}

impl CreateJobRequest {
    /// Create a new job request.
    pub fn new(
        application_id: Uuid,
        company_ref: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            application_id,
            company_ref: company_ref.into(),
            provider: provider.into(),
            max_retries: None,
        }
    }

    /// Set maximum retries.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }
}

// =============================================================================
// Worker Configuration
// =============================================================================

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Unique worker identifier.
    pub worker_id: String,
    /// How often to poll for new jobs.
    pub poll_interval: std::time::Duration,
    /// Retry configuration.
    pub retry_config: RetryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", Uuid::new_v4()),
            poll_interval: std::time::Duration::from_secs(5),
            retry_config: RetryConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Set the worker ID.
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the retry configuration.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
