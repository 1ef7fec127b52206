//! Visura Core - Domain types, business logic, and services.
//!
//! This crate provides the core functionality for Visura, including:
//!
//! - **Domain models**: [`MarketAttribute`], [`MarketAttributeResponse`],
//!   [`Resource`], [`BundledData`]
//! - **The aggregation pipeline**: [`Pipeline`] composing
//!   Requester → ResourceBuilder → DocumentFetch → [`DataMapper`]
//! - **Multi-source merge**: [`MergedPipeline`] for logical fields
//!   answered by more than one registry
//! - **State machines**: per-provider [`FetchStatus`] tracking and the
//!   webhook [`SyncStatus`] machine
//! - **Jobs**: [`JobQueue`] trait, [`WorkerService`] with bounded
//!   job-level retries and rollback-on-failure
//! - **Webhook delivery**: [`WebhookService`] with HMAC-signed payloads
//! - **Traits**: [`Requester`], [`ResourceBuilder`], [`DocumentSource`],
//!   [`ResponseStore`], [`ApplicationStore`] for dependency injection
//!
//! # Architecture
//!
//! Business logic is decoupled from I/O concerns through traits; the
//! `visura-client` crate supplies HTTP implementations and the
//! `visura-store` crate supplies store implementations. This crate never
//! talks to the network or a database directly.

pub mod config;
pub mod error;
pub mod job;
pub mod job_queue;
pub mod mapper;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod resource;
pub mod status;
pub mod traits;
pub mod webhook;
pub mod worker;

// Configuration
pub use config::{
    default_config_path, load_providers_config, DocumentConfig, FetchPolicy, HttpConfig,
    ProviderEntry, ProvidersConfig, WebhookConfig,
};

// Error handling
pub use error::{is_retryable, AppError, ErrorKind};

// Domain models
pub use models::{MarketAttribute, MarketAttributeResponse, ResponseSource, ResponseWrite};

// Resources
pub use resource::{
    BundledData, DocumentKind, DocumentPayload, DocumentRef, DocumentSlot, FieldValue,
    ProviderRecord, Resource,
};

// Pipeline
pub use pipeline::{
    run_document_stage, DocumentStageStats, Pipeline, PipelineError, PipelineInput,
    PipelineResult, Stage,
};

// Multi-source merge
pub use merge::{combine, MergeStatus, MergedPipeline};

// Data mapper
pub use mapper::DataMapper;

// Status machines
pub use status::{FetchStatus, ProviderFetchState, SyncStatus};

// Progress reporting
pub use progress::{PipelineEvent, PipelineReporter, SilentReporter, TracingReporter};

// Traits for dependency injection
pub use traits::{
    ApplicationStore, DocumentSource, ErrorReport, ErrorTracker, PipelineFactory,
    ProviderPipeline, RawResponse, Requester, ResourceBuilder, ResponseStore,
    TracingErrorTracker, TransportResponse, WebhookTransport,
};

// Job queue types
pub use job::{CreateJobRequest, FetchJob, JobStatus, RetryConfig, WorkerConfig};
pub use job_queue::JobQueue;

// Worker service
pub use worker::{
    SilentWorkerReporter, TracingWorkerReporter, WorkerEvent, WorkerReporter, WorkerService,
};

// Webhook delivery
pub use webhook::{
    sign_payload, DeliveryFailure, DeliveryOutcome, FieldCounts, WebhookPayload, WebhookService,
    SIGNATURE_HEADER,
};
