//! Progress reporting for pipeline runs.
//!
//! Decouples pipeline logic from logging/UI concerns: stages emit events
//! through a [`PipelineReporter`], and frontends decide how to render
//! them. The worker uses [`TracingReporter`]; tests usually pass
//! [`SilentReporter`].

use uuid::Uuid;

use crate::pipeline::Stage;

/// Events emitted during a pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    /// A stage is about to run.
    StageStarted {
        provider: &'a str,
        stage: Stage,
        application_id: Uuid,
    },
    /// One document was downloaded and validated.
    DocumentFetched {
        provider: &'a str,
        filename: &'a str,
    },
    /// One document failed and was skipped (best-effort providers only).
    DocumentSkipped { provider: &'a str, error: &'a str },
    /// The mapping stage wrote this many fields.
    FieldsMapped { provider: &'a str, count: usize },
    /// The pipeline failed at a stage.
    PipelineFailed {
        provider: &'a str,
        stage: Stage,
        error: &'a str,
    },
}

/// Trait for reporting pipeline events.
pub trait PipelineReporter: Send + Sync {
    /// Called when a pipeline event occurs.
    ///
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Silent reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl PipelineReporter for SilentReporter {}

/// Tracing-based reporter for CLI/worker logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::StageStarted {
                provider,
                stage,
                application_id,
            } => {
                tracing::debug!(provider, %stage, %application_id, "Stage started");
            }
            PipelineEvent::DocumentFetched { provider, filename } => {
                tracing::info!(provider, filename, "Document fetched");
            }
            PipelineEvent::DocumentSkipped { provider, error } => {
                tracing::warn!(provider, error, "Document skipped");
            }
            PipelineEvent::FieldsMapped { provider, count } => {
                tracing::info!(provider, count, "Fields mapped");
            }
            PipelineEvent::PipelineFailed {
                provider,
                stage,
                error,
            } => {
                tracing::warn!(provider, %stage, error, "Pipeline failed");
            }
        }
    }
}
