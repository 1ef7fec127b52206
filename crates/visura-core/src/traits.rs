//! Trait definitions for external dependencies.
//!
//! This module defines traits that abstract over external dependencies
//! (provider HTTP access, document downloads, persistence, webhook
//! transport, error tracking), enabling:
//!
//! - **Testability**: Mock implementations for unit testing
//! - **Flexibility**: Different backends (in-memory store, database store)
//! - **Decoupling**: Core pipeline logic doesn't depend on specific
//!   implementations

use std::collections::HashMap;
use std::future::Future;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{MarketAttribute, MarketAttributeResponse, ResponseWrite};
use crate::pipeline::PipelineInput;
use crate::resource::{BundledData, DocumentPayload, DocumentRef};
use crate::status::{ProviderFetchState, SyncStatus};

// =============================================================================
// Pipeline stage traits
// =============================================================================

/// Raw HTTP response handed from the requester to the resource builder.
///
/// Headers are carried along because one provider class threads a
/// pagination cursor through response headers into its parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RawResponse {
    /// Convenience constructor for a bodied 200 response.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: body.into(),
        }
    }
}

/// Builds and issues one authenticated request against a provider.
///
/// Implementations classify transport failures into the error taxonomy
/// (timeout, connection refused/reset, TLS, non-2xx status) and fail fast
/// with a missing-credentials error before any call is made.
pub trait Requester: Send + Sync {
    /// Fetches the provider's answer for one company identifier.
    fn fetch(
        &self,
        company_ref: &str,
    ) -> impl Future<Output = Result<RawResponse, AppError>> + Send;
}

/// Pure function from a raw response body to bundled data.
///
/// Each provider has its own instance implementing a validity predicate
/// over the parsed body and an extraction routine. Identical response
/// bodies always yield an identical resource.
pub trait ResourceBuilder: Send + Sync {
    /// Parses and validates the response into a bundle.
    ///
    /// Malformed JSON or a body missing the provider's expected top-level
    /// key is a fatal, non-retryable contract violation.
    fn build(&self, response: &RawResponse) -> Result<BundledData, AppError>;
}

/// Downloads one referenced document with per-call timeouts.
///
/// The policy decision (all-or-nothing vs best-effort) lives in the
/// pipeline's document stage, not in implementations of this trait; an
/// implementation only retrieves and validates a single payload.
pub trait DocumentSource: Send + Sync {
    /// Downloads and validates the payload behind one reference.
    fn download(
        &self,
        reference: &DocumentRef,
        company_ref: &str,
    ) -> impl Future<Output = Result<DocumentPayload, AppError>> + Send;
}

// =============================================================================
// Pipeline factory
// =============================================================================

/// Creates provider pipelines by canonical name.
///
/// The registry of known providers implements this; new providers register
/// there instead of subclassing anything.
pub trait PipelineFactory: Send + Sync + Clone {
    /// The pipeline type this factory creates.
    type Pipeline: ProviderPipeline;

    /// Creates the pipeline for the given canonical provider name.
    fn create(&self, provider: &str) -> Result<Self::Pipeline, AppError>;
}

/// A runnable provider pipeline with a single entry point.
///
/// Implemented by the plain four-stage organizer and by the multi-source
/// merge organizer alike, so the worker can treat both uniformly.
pub trait ProviderPipeline: Send + Sync {
    /// Canonical provider identifier used in status maps and logs.
    fn provider(&self) -> &'static str;

    /// Runs the pipeline for one application/company pair.
    fn call<P: crate::progress::PipelineReporter>(
        &self,
        input: &PipelineInput,
        reporter: &P,
    ) -> impl Future<Output = Result<crate::pipeline::PipelineResult, crate::pipeline::PipelineError>>
           + Send;
}

// =============================================================================
// Store traits
// =============================================================================

/// Store for form-field definitions and persisted answers.
///
/// Implementations must apply [`ResponseStore::upsert_response`] keyed by
/// `(application, attribute_key)` so the latest write wins under
/// concurrent user edits.
pub trait ResponseStore: Send + Sync + Clone {
    /// Returns the attributes that declare the given provider as their
    /// automatic source (`api_name`).
    fn attributes_for_provider(
        &self,
        provider: &str,
    ) -> impl Future<Output = Result<Vec<MarketAttribute>, AppError>> + Send;

    /// Finds the persisted response row, if one exists.
    fn find_response(
        &self,
        application_id: Uuid,
        attribute_key: &str,
    ) -> impl Future<Output = Result<Option<MarketAttributeResponse>, AppError>> + Send;

    /// Creates or updates the response row for
    /// `(application, attribute_key)`.
    fn upsert_response(
        &self,
        application_id: Uuid,
        attribute_key: &str,
        write: ResponseWrite,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Store for per-application state: the fetch-status map, the completion
/// flag, and the webhook sync status.
pub trait ApplicationStore: Send + Sync + Clone {
    /// Reads one provider's fetch state on an application.
    fn read_fetch_status(
        &self,
        application_id: Uuid,
        provider: &str,
    ) -> impl Future<Output = Result<Option<ProviderFetchState>, AppError>> + Send;

    /// Writes one provider's fetch state. Only the job orchestrating that
    /// provider's run may call this.
    fn set_fetch_status(
        &self,
        application_id: Uuid,
        provider: &str,
        state: ProviderFetchState,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// True once the application has been finalized. Fetch and retry jobs
    /// for a finalized application no-op instead of mutating it.
    fn is_completed(
        &self,
        application_id: Uuid,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Reads the webhook sync status.
    fn sync_status(
        &self,
        application_id: Uuid,
    ) -> impl Future<Output = Result<SyncStatus, AppError>> + Send;

    /// Atomically transitions the sync status from `from` to `to`.
    ///
    /// Returns `false` (without writing) when the stored status no longer
    /// equals `from`, which makes the `failed → processing` guard safe
    /// under concurrent delivery attempts.
    fn transition_sync_status(
        &self,
        application_id: Uuid,
        from: SyncStatus,
        to: SyncStatus,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;
}

// =============================================================================
// Collaborators
// =============================================================================

/// Context reported alongside a retry-exhaustion event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// Job name, e.g. `provider_fetch`.
    pub job: &'static str,
    /// Canonical provider name.
    pub provider: String,
    /// Owning application.
    pub application_id: Uuid,
    /// Rendered error.
    pub error: String,
    /// Retries attempted before giving up.
    pub retries: u32,
}

/// Error-tracking collaborator notified when retries are exhausted.
pub trait ErrorTracker: Send + Sync {
    /// Reports one event. Implementations must not fail.
    fn report(&self, report: &ErrorReport);
}

/// Tracker that logs reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorTracker;

impl ErrorTracker for TracingErrorTracker {
    fn report(&self, report: &ErrorReport) {
        tracing::error!(
            job = report.job,
            provider = %report.provider,
            application_id = %report.application_id,
            retries = report.retries,
            error = %report.error,
            "Retries exhausted"
        );
    }
}

// =============================================================================
// Webhook transport
// =============================================================================

/// Response captured from a webhook delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Raw response body, recorded for diagnostics.
    pub body: String,
}

/// Outbound HTTP transport for webhook deliveries.
///
/// Implementations return `Ok` for any completed HTTP exchange regardless
/// of status code; transport-level failures (timeout, connection) map to
/// the error taxonomy.
pub trait WebhookTransport: Send + Sync {
    /// Posts the signed JSON payload to the endpoint.
    fn post(
        &self,
        endpoint: &str,
        body: &str,
        signature: &str,
    ) -> impl Future<Output = Result<TransportResponse, AppError>> + Send;
}
