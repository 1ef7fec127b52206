//! Worker service for processing fetch jobs from the queue.
//!
//! This module provides the [`WorkerService`] that polls for pending jobs
//! and runs the claimed provider's pipeline.
//!
//! # Architecture
//!
//! The worker follows a poll-based model:
//! ```text
//! loop {
//!     1. Check for cancellation
//!     2. Claim next available job
//!     3. Run the provider pipeline for the job's application
//!     4. Update the fetch-status map and job status
//!     5. If no jobs available, sleep for poll_interval
//! }
//! ```
//!
//! # Failure handling
//!
//! A failed pipeline run either reschedules the job (retryable error with
//! retries left) or degrades the provider's fields: pipeline-owned rows
//! are cleared and transitioned to `manual_after_api_failure`, the fetch
//! status becomes `failed`, and — when retries were exhausted — the event
//! is reported to the error-tracking collaborator.
//!
//! # Graceful Shutdown
//!
//! On cancellation token trigger:
//! - Stops claiming new jobs
//! - Allows the current job to complete
//! - Releases any claimed jobs back to the queue

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{FetchJob, WorkerConfig};
use crate::job_queue::JobQueue;
use crate::mapper::DataMapper;
use crate::pipeline::PipelineInput;
use crate::progress::PipelineReporter;
use crate::status::ProviderFetchState;
use crate::traits::{
    ApplicationStore, ErrorReport, ErrorTracker, PipelineFactory, ProviderPipeline, ResponseStore,
};

/// Job name reported to the error tracker.
const JOB_NAME: &str = "provider_fetch";

// =============================================================================
// Worker Events
// =============================================================================

/// Events emitted by the worker during operation.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    /// Worker started and is ready to process jobs.
    Started { worker_id: &'a str },
    /// Worker is polling for new jobs.
    Polling,
    /// Worker claimed a job.
    JobClaimed { job: &'a FetchJob },
    /// Job processing started.
    JobStarted {
        job_id: Uuid,
        provider: &'a str,
        application_id: Uuid,
    },
    /// Job completed successfully.
    JobCompleted { job_id: Uuid, fields_filled: usize },
    /// Job failed with error.
    JobFailed {
        job_id: Uuid,
        error: &'a str,
        will_retry: bool,
    },
    /// Job skipped because the application was already finalized.
    JobSkipped { job_id: Uuid, application_id: Uuid },
    /// Worker is shutting down.
    ShuttingDown {
        worker_id: &'a str,
        jobs_released: u64,
    },
    /// Worker stopped.
    Stopped { worker_id: &'a str },
}

// =============================================================================
// Worker Reporter Trait
// =============================================================================

/// Trait for reporting worker events.
pub trait WorkerReporter: Send + Sync {
    /// Called when a worker event occurs.
    ///
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Silent worker reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentWorkerReporter;

impl WorkerReporter for SilentWorkerReporter {}

/// Tracing-based worker reporter for CLI logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id } => {
                info!(worker_id, "Worker started");
            }
            WorkerEvent::Polling => {
                tracing::debug!("Polling for jobs...");
            }
            WorkerEvent::JobClaimed { job } => {
                info!(job_id = %job.id, provider = %job.provider, "Job claimed");
            }
            WorkerEvent::JobStarted {
                job_id,
                provider,
                application_id,
            } => {
                info!(%job_id, provider, %application_id, "Processing job");
            }
            WorkerEvent::JobCompleted {
                job_id,
                fields_filled,
            } => {
                info!(%job_id, fields_filled, "Job completed");
            }
            WorkerEvent::JobFailed {
                job_id,
                error,
                will_retry,
            } => {
                if will_retry {
                    warn!(%job_id, %error, "Job failed, will retry");
                } else {
                    error!(%job_id, %error, "Job permanently failed");
                }
            }
            WorkerEvent::JobSkipped {
                job_id,
                application_id,
            } => {
                info!(%job_id, %application_id, "Application finalized, job skipped");
            }
            WorkerEvent::ShuttingDown {
                worker_id,
                jobs_released,
            } => {
                info!(worker_id, jobs_released, "Worker shutting down");
            }
            WorkerEvent::Stopped { worker_id } => {
                info!(worker_id, "Worker stopped");
            }
        }
    }
}

// =============================================================================
// Worker Service
// =============================================================================

/// Worker service that processes fetch jobs from the queue.
///
/// # Type Parameters
///
/// * `Q` - Job queue implementation
/// * `F` - Pipeline factory (the provider registry)
/// * `A` - Application store (fetch-status map, completion flag)
/// * `S` - Response store (used for rollback on failure)
/// * `T` - Error-tracking collaborator
pub struct WorkerService<Q, F, A, S, T>
where
    Q: JobQueue,
    F: PipelineFactory,
    A: ApplicationStore,
    S: ResponseStore,
    T: ErrorTracker,
{
    queue: Q,
    factory: F,
    applications: A,
    mapper: DataMapper<S>,
    tracker: T,
    config: WorkerConfig,
}

impl<Q, F, A, S, T> WorkerService<Q, F, A, S, T>
where
    Q: JobQueue,
    F: PipelineFactory,
    A: ApplicationStore,
    S: ResponseStore,
    T: ErrorTracker,
{
    /// Create a new worker service.
    pub fn new(
        queue: Q,
        factory: F,
        applications: A,
        mapper: DataMapper<S>,
        tracker: T,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            factory,
            applications,
            mapper,
            tracker,
            config,
        }
    }

    /// Run the worker until cancelled.
    pub async fn run<WR, PR>(
        &self,
        cancel_token: CancellationToken,
        worker_reporter: &WR,
        pipeline_reporter: &PR,
    ) -> Result<(), AppError>
    where
        WR: WorkerReporter,
        PR: PipelineReporter,
    {
        worker_reporter.report(WorkerEvent::Started {
            worker_id: &self.config.worker_id,
        });

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            worker_reporter.report(WorkerEvent::Polling);

            match self.queue.claim_job(&self.config.worker_id).await {
                Ok(Some(job)) => {
                    worker_reporter.report(WorkerEvent::JobClaimed { job: &job });
                    self.process_job(&job, worker_reporter, pipeline_reporter)
                        .await;
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = cancel_token.cancelled() => break,
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to claim job");
                    // Back off on queue errors
                    tokio::time::sleep(self.config.poll_interval * 2).await;
                }
            }
        }

        let released = self
            .queue
            .release_worker_jobs(&self.config.worker_id)
            .await
            .unwrap_or(0);

        worker_reporter.report(WorkerEvent::ShuttingDown {
            worker_id: &self.config.worker_id,
            jobs_released: released,
        });

        worker_reporter.report(WorkerEvent::Stopped {
            worker_id: &self.config.worker_id,
        });

        Ok(())
    }

    /// Process a single job.
    pub async fn process_job<WR, PR>(
        &self,
        job: &FetchJob,
        worker_reporter: &WR,
        pipeline_reporter: &PR,
    ) where
        WR: WorkerReporter,
        PR: PipelineReporter,
    {
        // Finalized applications are never mutated; the job no-ops.
        match self.applications.is_completed(job.application_id).await {
            Ok(true) => {
                worker_reporter.report(WorkerEvent::JobSkipped {
                    job_id: job.id,
                    application_id: job.application_id,
                });
                if let Err(e) = self.queue.cancel_job(job.id).await {
                    error!(job_id = %job.id, error = %e, "Failed to cancel job");
                }
                return;
            }
            Ok(false) => {}
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to read application state");
                if let Err(e) = self.queue.fail_job(job.id, &e.to_string(), None).await {
                    error!(job_id = %job.id, error = %e, "Failed to mark job as failed");
                }
                return;
            }
        }

        worker_reporter.report(WorkerEvent::JobStarted {
            job_id: job.id,
            provider: &job.provider,
            application_id: job.application_id,
        });

        if let Err(e) = self
            .applications
            .set_fetch_status(
                job.application_id,
                &job.provider,
                ProviderFetchState::processing(),
            )
            .await
        {
            error!(job_id = %job.id, error = %e, "Failed to mark fetch status processing");
        }

        let input = PipelineInput::new(job.application_id, job.company_ref.clone());

        let outcome = match self.factory.create(&job.provider) {
            Ok(pipeline) => pipeline
                .call(&input, pipeline_reporter)
                .await
                .map_err(|e| e.error),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                worker_reporter.report(WorkerEvent::JobCompleted {
                    job_id: job.id,
                    fields_filled: result.fields_filled,
                });

                if let Err(e) = self
                    .applications
                    .set_fetch_status(
                        job.application_id,
                        &job.provider,
                        ProviderFetchState::completed(result.fields_filled),
                    )
                    .await
                {
                    error!(job_id = %job.id, error = %e, "Failed to mark fetch status completed");
                }

                if let Err(e) = self.queue.complete_job(job.id, result.fields_filled).await {
                    error!(job_id = %job.id, error = %e, "Failed to mark job as completed");
                }
            }
            Err(e) => {
                let error_msg = e.to_string();
                let retryable = e.is_retryable();
                let will_retry = job.can_retry() && retryable;

                worker_reporter.report(WorkerEvent::JobFailed {
                    job_id: job.id,
                    error: &error_msg,
                    will_retry,
                });

                if will_retry {
                    // Transient fault with retries left: back to pending,
                    // no rollback yet.
                    let next_retry = job.calculate_next_retry(&self.config.retry_config);
                    if let Err(e) = self
                        .applications
                        .set_fetch_status(
                            job.application_id,
                            &job.provider,
                            ProviderFetchState::pending(),
                        )
                        .await
                    {
                        error!(job_id = %job.id, error = %e, "Failed to reset fetch status");
                    }
                    if let Err(e) = self
                        .queue
                        .fail_job(job.id, &error_msg, Some(next_retry))
                        .await
                    {
                        error!(job_id = %job.id, error = %e, "Failed to schedule retry");
                    }
                    return;
                }

                self.degrade(job, &error_msg).await;

                if retryable {
                    // Transient error with no retries left: exhaustion.
                    self.tracker.report(&ErrorReport {
                        job: JOB_NAME,
                        provider: job.provider.clone(),
                        application_id: job.application_id,
                        error: error_msg.clone(),
                        retries: job.retry_count,
                    });
                } else if matches!(e, AppError::MappingError { .. }) {
                    // Code/schema bug, not routine degradation.
                    self.tracker.report(&ErrorReport {
                        job: JOB_NAME,
                        provider: job.provider.clone(),
                        application_id: job.application_id,
                        error: error_msg.clone(),
                        retries: job.retry_count,
                    });
                }

                if let Err(e) = self.queue.fail_job(job.id, &error_msg, None).await {
                    error!(job_id = %job.id, error = %e, "Failed to mark job as failed");
                }
            }
        }
    }

    /// Terminal-failure path: clear pipeline-owned answers, degrade the
    /// provider's fields to manual entry and mark the fetch status failed.
    async fn degrade(&self, job: &FetchJob, error_msg: &str) {
        if let Err(e) = self
            .mapper
            .rollback(job.application_id, &job.provider)
            .await
        {
            error!(
                job_id = %job.id,
                provider = %job.provider,
                error = %e,
                "Rollback after pipeline failure failed"
            );
        }

        if let Err(e) = self
            .applications
            .set_fetch_status(
                job.application_id,
                &job.provider,
                ProviderFetchState::failed(),
            )
            .await
        {
            error!(job_id = %job.id, error = %e, "Failed to mark fetch status failed");
        }

        info!(
            job_id = %job.id,
            provider = %job.provider,
            application_id = %job.application_id,
            error = error_msg,
            "Provider fields degraded to manual entry"
        );
    }

    /// Process a single job by ID (for one-off execution, e.g., CLI).
    pub async fn process_single_job<WR, PR>(
        &self,
        job_id: Uuid,
        worker_reporter: &WR,
        pipeline_reporter: &PR,
    ) -> Result<(), AppError>
    where
        WR: WorkerReporter,
        PR: PipelineReporter,
    {
        let job = self
            .queue
            .get_job(job_id)
            .await?
            .ok_or_else(|| AppError::Generic(format!("Job not found: {}", job_id)))?;

        self.process_job(&job, worker_reporter, pipeline_reporter)
            .await;

        Ok(())
    }
}
