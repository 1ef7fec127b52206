//! The four-stage external-data-aggregation pipeline.
//!
//! Composes Requester → ResourceBuilder → DocumentFetch → DataMapper as an
//! ordered chain; each stage consumes the previous stage's success value
//! and short-circuits the chain with a terminal [`PipelineError`] on
//! failure, skipping the remaining stages. Short-circuiting is ordinary
//! `Result` propagation; there is no mutable context object with failure
//! flags.
//!
//! The organizer's name doubles as the canonical provider identifier used
//! in status maps and logs.

use uuid::Uuid;

use crate::config::FetchPolicy;
use crate::error::AppError;
use crate::mapper::DataMapper;
use crate::progress::{PipelineEvent, PipelineReporter};
use crate::resource::{BundledData, ProviderRecord, Resource};
use crate::traits::{DocumentSource, Requester, ResourceBuilder, ResponseStore};

// =============================================================================
// Inputs and outcomes
// =============================================================================

/// Input parameters threaded through all stages of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineInput {
    /// The owning application.
    pub application_id: Uuid,
    /// The company's tax/social-security reference number.
    pub company_ref: String,
}

impl PipelineInput {
    pub fn new(application_id: Uuid, company_ref: impl Into<String>) -> Self {
        Self {
            application_id,
            company_ref: company_ref.into(),
        }
    }
}

/// Pipeline stage identifiers, used in failure diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Request,
    Parse,
    FetchDocuments,
    Merge,
    Map,
}

impl Stage {
    /// Returns the string representation for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Request => "request",
            Stage::Parse => "parse",
            Stage::FetchDocuments => "fetch_documents",
            Stage::Merge => "merge",
            Stage::Map => "map",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal failure of a pipeline run: the originating stage plus the
/// underlying error.
#[derive(Debug, thiserror::Error)]
#[error("Pipeline for '{provider}' failed at {stage}: {error}")]
pub struct PipelineError {
    pub provider: &'static str,
    pub stage: Stage,
    #[source]
    pub error: AppError,
}

impl PipelineError {
    pub fn new(provider: &'static str, stage: Stage, error: AppError) -> Self {
        Self {
            provider,
            stage,
            error,
        }
    }

    /// Delegates retryability to the underlying error.
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Successful pipeline outcome.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub bundled: BundledData,
    /// Number of form fields the mapping stage wrote.
    pub fields_filled: usize,
}

// =============================================================================
// Document stage
// =============================================================================

/// Statistics from the document-fetch stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentStageStats {
    pub requested: usize,
    pub fetched: usize,
    pub skipped: usize,
}

/// Resolves all document references on a resource, in place.
///
/// Applies the provider's configured [`FetchPolicy`] uniformly:
///
/// - `AllOrNothing`: the first download failure fails the stage.
/// - `BestEffort`: per-document failures are reported and skipped; the
///   stage fails only when zero documents were retrieved out of a
///   non-empty reference set. An explicitly empty reference set is not a
///   failure.
pub async fn run_document_stage<D, P>(
    source: &D,
    policy: FetchPolicy,
    resource: &mut Resource,
    company_ref: &str,
    reporter: &P,
) -> Result<DocumentStageStats, AppError>
where
    D: DocumentSource,
    P: PipelineReporter,
{
    let provider = resource.provider();
    let refs = resource.document_refs();
    let mut stats = DocumentStageStats {
        requested: refs.len(),
        ..Default::default()
    };

    if refs.is_empty() {
        return Ok(stats);
    }

    let mut last_error: Option<AppError> = None;

    for reference in refs {
        match source.download(&reference, company_ref).await {
            Ok(payload) => {
                reporter.report(PipelineEvent::DocumentFetched {
                    provider,
                    filename: &payload.filename,
                });
                resource.attach_document(&reference.id, payload);
                stats.fetched += 1;
            }
            Err(e) => match policy {
                FetchPolicy::AllOrNothing => return Err(e),
                FetchPolicy::BestEffort => {
                    reporter.report(PipelineEvent::DocumentSkipped {
                        provider,
                        error: &e.to_string(),
                    });
                    stats.skipped += 1;
                    last_error = Some(e);
                }
            },
        }
    }

    if stats.fetched == 0 {
        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no downloads attempted".to_string());
        return Err(AppError::DocumentInvalid {
            reason: format!(
                "none of {} referenced documents could be retrieved: {}",
                stats.requested, detail
            ),
        });
    }

    Ok(stats)
}

// =============================================================================
// Organizer
// =============================================================================

/// The per-provider pipeline organizer.
///
/// # Type Parameters
///
/// * `R` - Requester implementation
/// * `B` - Resource builder implementation
/// * `D` - Document source implementation
/// * `S` - Response store used by the mapping stage
pub struct Pipeline<R, B, D, S>
where
    R: Requester,
    B: ResourceBuilder,
    D: DocumentSource,
    S: ResponseStore,
{
    provider: &'static str,
    requester: R,
    builder: B,
    documents: D,
    policy: FetchPolicy,
    mapper: DataMapper<S>,
}

impl<R, B, D, S> Pipeline<R, B, D, S>
where
    R: Requester,
    B: ResourceBuilder,
    D: DocumentSource,
    S: ResponseStore,
{
    /// Creates an organizer for the given canonical provider name.
    pub fn new(
        provider: &'static str,
        requester: R,
        builder: B,
        documents: D,
        policy: FetchPolicy,
        mapper: DataMapper<S>,
    ) -> Self {
        Self {
            provider,
            requester,
            builder,
            documents,
            policy,
            mapper,
        }
    }

    /// Canonical provider identifier.
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// The configured document-fetch policy.
    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    fn fail(&self, stage: Stage, error: AppError) -> PipelineError {
        PipelineError::new(self.provider, stage, error)
    }

    /// Runs request → parse → fetch-documents, without mapping.
    ///
    /// This is the sub-pipeline shape the multi-source merge composes; a
    /// failure here must not leak provider internals to users.
    pub async fn collect<P: PipelineReporter>(
        &self,
        input: &PipelineInput,
        reporter: &P,
    ) -> Result<BundledData, PipelineError> {
        reporter.report(PipelineEvent::StageStarted {
            provider: self.provider,
            stage: Stage::Request,
            application_id: input.application_id,
        });
        let response = self
            .requester
            .fetch(&input.company_ref)
            .await
            .map_err(|e| self.fail(Stage::Request, e))?;

        reporter.report(PipelineEvent::StageStarted {
            provider: self.provider,
            stage: Stage::Parse,
            application_id: input.application_id,
        });
        let mut bundled = self
            .builder
            .build(&response)
            .map_err(|e| self.fail(Stage::Parse, e))?;

        reporter.report(PipelineEvent::StageStarted {
            provider: self.provider,
            stage: Stage::FetchDocuments,
            application_id: input.application_id,
        });
        run_document_stage(
            &self.documents,
            self.policy,
            &mut bundled.resource,
            &input.company_ref,
            reporter,
        )
        .await
        .map_err(|e| self.fail(Stage::FetchDocuments, e))?;

        Ok(bundled)
    }

    /// Single entry point: runs all four stages and returns the outcome.
    ///
    /// This is also exposed through the [`ProviderPipeline`] trait (with
    /// an explicit reporter), which is what the worker programs against.
    ///
    /// [`ProviderPipeline`]: crate::traits::ProviderPipeline
    pub async fn call_with_reporter<P: PipelineReporter>(
        &self,
        input: &PipelineInput,
        reporter: &P,
    ) -> Result<PipelineResult, PipelineError> {
        let result = self.run_inner(input, reporter).await;
        if let Err(e) = &result {
            reporter.report(PipelineEvent::PipelineFailed {
                provider: self.provider,
                stage: e.stage,
                error: &e.error.to_string(),
            });
        }
        result
    }

    async fn run_inner<P: PipelineReporter>(
        &self,
        input: &PipelineInput,
        reporter: &P,
    ) -> Result<PipelineResult, PipelineError> {
        let bundled = self.collect(input, reporter).await?;

        reporter.report(PipelineEvent::StageStarted {
            provider: self.provider,
            stage: Stage::Map,
            application_id: input.application_id,
        });
        let fields_filled = self
            .mapper
            .apply(input.application_id, &bundled)
            .await
            .map_err(|e| self.fail(Stage::Map, e))?;

        reporter.report(PipelineEvent::FieldsMapped {
            provider: self.provider,
            count: fields_filled,
        });

        Ok(PipelineResult {
            bundled,
            fields_filled,
        })
    }
}

impl<R, B, D, S> crate::traits::ProviderPipeline for Pipeline<R, B, D, S>
where
    R: Requester,
    B: ResourceBuilder,
    D: DocumentSource,
    S: ResponseStore,
{
    fn provider(&self) -> &'static str {
        self.provider
    }

    async fn call<P: PipelineReporter>(
        &self,
        input: &PipelineInput,
        reporter: &P,
    ) -> Result<PipelineResult, PipelineError> {
        self.call_with_reporter(input, reporter).await
    }
}
