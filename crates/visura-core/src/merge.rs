//! Multi-source merge for logical fields answerable by more than one
//! independent provider.
//!
//! The canonical case is retirement-contribution proof, answered by both
//! the state and the industry retirement fund. Each source runs its own
//! request → parse → fetch-documents sub-pipeline; failures are isolated
//! so one provider erroring never prevents the other's result from being
//! used. Only the case where neither source produced a document fails the
//! merge stage itself.

use serde_json::Value;

use crate::error::AppError;
use crate::mapper::DataMapper;
use crate::pipeline::{Pipeline, PipelineError, PipelineInput, PipelineResult, Stage};
use crate::progress::{PipelineEvent, PipelineReporter};
use crate::resource::{
    BundledData, DocumentPayload, ProviderRecord, Resource, RetirementProof, CONTEXT_MERGE_STATUS,
};
use crate::traits::{DocumentSource, Requester, ResourceBuilder, ResponseStore};

/// Outcome of combining two independently-run sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    /// Both sources returned a document.
    SuccessBoth,
    /// Exactly one source returned a document.
    SuccessPartial,
}

impl MergeStatus {
    /// Returns the string representation stored in the bundle context.
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStatus::SuccessBoth => "success_both",
            MergeStatus::SuccessPartial => "success_partial",
        }
    }
}

impl std::fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A source's contribution to the merge: its tagged documents, or the
/// reason it contributed nothing.
fn side_documents(
    provider: &'static str,
    outcome: Result<BundledData, PipelineError>,
) -> Result<Vec<DocumentPayload>, String> {
    match outcome {
        Ok(bundled) => {
            let documents: Vec<DocumentPayload> = bundled
                .resource
                .field("retirement_contribution_document")
                .map(|v| v.documents())
                .unwrap_or_default()
                .into_iter()
                .map(|d| d.tagged_with_provider(provider))
                .collect();
            if documents.is_empty() {
                Err(format!("{}: no document in answer", provider))
            } else {
                Ok(documents)
            }
        }
        Err(e) => Err(format!("{}: {}", provider, e)),
    }
}

/// Combines the two sides' outcomes into a merged resource.
///
/// Pure; exercised directly by tests. Returns the merged record, the
/// merge status, or — when neither side produced a document — an error
/// surfacing both sides' failures.
pub fn combine(
    left_provider: &'static str,
    left: Result<BundledData, PipelineError>,
    right_provider: &'static str,
    right: Result<BundledData, PipelineError>,
) -> Result<(RetirementProof, MergeStatus), AppError> {
    let left_docs = side_documents(left_provider, left);
    let right_docs = side_documents(right_provider, right);

    let (documents, status) = match (left_docs, right_docs) {
        (Ok(mut l), Ok(r)) => {
            l.extend(r);
            (l, MergeStatus::SuccessBoth)
        }
        (Ok(docs), Err(reason)) | (Err(reason), Ok(docs)) => {
            tracing::warn!(reason, "One merge source contributed nothing");
            (docs, MergeStatus::SuccessPartial)
        }
        (Err(left_reason), Err(right_reason)) => {
            return Err(AppError::Generic(format!(
                "both sources failed: {}; {}",
                left_reason, right_reason
            )));
        }
    };

    Ok((RetirementProof { documents }, status))
}

/// Organizer for a merged two-source pipeline.
///
/// Runs both sub-pipelines concurrently with isolated failures, combines
/// their documents, records the merge status in the bundle context and
/// maps the merged resource like any other provider result.
pub struct MergedPipeline<LR, LB, LD, RR, RB, RD, S>
where
    LR: Requester,
    LB: ResourceBuilder,
    LD: DocumentSource,
    RR: Requester,
    RB: ResourceBuilder,
    RD: DocumentSource,
    S: ResponseStore,
{
    provider: &'static str,
    left: Pipeline<LR, LB, LD, S>,
    right: Pipeline<RR, RB, RD, S>,
    mapper: DataMapper<S>,
}

impl<LR, LB, LD, RR, RB, RD, S> MergedPipeline<LR, LB, LD, RR, RB, RD, S>
where
    LR: Requester,
    LB: ResourceBuilder,
    LD: DocumentSource,
    RR: Requester,
    RB: ResourceBuilder,
    RD: DocumentSource,
    S: ResponseStore,
{
    pub fn new(
        provider: &'static str,
        left: Pipeline<LR, LB, LD, S>,
        right: Pipeline<RR, RB, RD, S>,
        mapper: DataMapper<S>,
    ) -> Self {
        Self {
            provider,
            left,
            right,
            mapper,
        }
    }

    /// Canonical identifier of the merged logical provider.
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// Single entry point for the merged pipeline.
    pub async fn call_with_reporter<P: PipelineReporter>(
        &self,
        input: &PipelineInput,
        reporter: &P,
    ) -> Result<PipelineResult, PipelineError> {
        reporter.report(PipelineEvent::StageStarted {
            provider: self.provider,
            stage: Stage::Merge,
            application_id: input.application_id,
        });

        // Both sources run concurrently; an error on one side is data for
        // the combine step, not a short-circuit.
        let (left, right) = futures::join!(
            self.left.collect(input, reporter),
            self.right.collect(input, reporter)
        );

        let (record, status) = combine(
            self.left.provider(),
            left,
            self.right.provider(),
            right,
        )
        .map_err(|e| PipelineError::new(self.provider, Stage::Merge, e))?;

        let bundled = BundledData::new(Resource::RetirementProof(record)).with_context(
            CONTEXT_MERGE_STATUS,
            Value::String(status.as_str().to_string()),
        );

        reporter.report(PipelineEvent::StageStarted {
            provider: self.provider,
            stage: Stage::Map,
            application_id: input.application_id,
        });
        let fields_filled = self
            .mapper
            .apply(input.application_id, &bundled)
            .await
            .map_err(|e| PipelineError::new(self.provider, Stage::Map, e))?;

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

impl<LR, LB, LD, RR, RB, RD, S> crate::traits::ProviderPipeline
    for MergedPipeline<LR, LB, LD, RR, RB, RD, S>
where
    LR: Requester,
    LB: ResourceBuilder,
    LD: DocumentSource,
    RR: Requester,
    RB: ResourceBuilder,
    RD: DocumentSource,
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
