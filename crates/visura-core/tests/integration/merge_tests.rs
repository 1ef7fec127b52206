//! Multi-source merge tests: two registries answering one question.

use serde_json::Value;
use uuid::Uuid;

use visura_core::config::FetchPolicy;
use visura_core::mapper::DataMapper;
use visura_core::merge::MergedPipeline;
use visura_core::models::{MarketAttribute, ResponseSource};
use visura_core::pipeline::{Pipeline, PipelineInput, Stage};
use visura_core::progress::SilentReporter;
use visura_core::resource::{
    BundledData, DocumentKind, DocumentRef, DocumentSlot, Resource, RetirementStatement,
    CONTEXT_MERGE_STATUS,
};
use visura_core::traits::{ProviderPipeline, RawResponse, ResourceBuilder};
use visura_core::AppError;

use crate::integration::common::{
    pdf_bytes, CannedResponse, MockDocumentSource, MockRequester, MockStore,
};

const MERGED_PROVIDER: &str = "retirement_fund";

/// Parses `{"proof_url": ...}` into a retirement statement for one fund.
#[derive(Clone)]
struct StubFundBuilder {
    provider: &'static str,
}

impl ResourceBuilder for StubFundBuilder {
    fn build(&self, response: &RawResponse) -> Result<BundledData, AppError> {
        let value: serde_json::Value =
            serde_json::from_str(&response.body).map_err(|e| AppError::ContractViolation {
                provider: self.provider.to_string(),
                detail: e.to_string(),
            })?;

        let proof = value.get("proof_url").and_then(|u| u.as_str()).map(|url| {
            DocumentSlot::Reference(DocumentRef {
                id: "proof".to_string(),
                url: url.to_string(),
                name_hint: Some(format!("{}-proof", self.provider)),
                expected: DocumentKind::Pdf,
            })
        });

        Ok(BundledData::new(Resource::RetirementStatement(
            RetirementStatement {
                provider: self.provider,
                proof,
            },
        )))
    }
}

fn retirement_attributes() -> Vec<MarketAttribute> {
    vec![MarketAttribute::automatic(
        "retirement_proof",
        MERGED_PROVIDER,
        "retirement_contribution_documents",
    )]
}

fn fund_pipeline(
    provider: &'static str,
    requester: MockRequester,
    documents: MockDocumentSource,
    store: MockStore,
) -> Pipeline<MockRequester, StubFundBuilder, MockDocumentSource, MockStore> {
    Pipeline::new(
        provider,
        requester,
        StubFundBuilder { provider },
        documents,
        FetchPolicy::AllOrNothing,
        DataMapper::new(store),
    )
}

fn merged(
    left: Pipeline<MockRequester, StubFundBuilder, MockDocumentSource, MockStore>,
    right: Pipeline<MockRequester, StubFundBuilder, MockDocumentSource, MockStore>,
    store: MockStore,
) -> MergedPipeline<
    MockRequester,
    StubFundBuilder,
    MockDocumentSource,
    MockRequester,
    StubFundBuilder,
    MockDocumentSource,
    MockStore,
> {
    MergedPipeline::new(MERGED_PROVIDER, left, right, DataMapper::new(store))
}

#[tokio::test]
async fn test_both_sources_succeed() {
    let store = MockStore::with_attributes(retirement_attributes());
    let left = fund_pipeline(
        "retirement_state_fund",
        MockRequester::ok(r#"{"proof_url":"https://state/proof.pdf"}"#),
        MockDocumentSource::new().with_document("https://state/proof.pdf", pdf_bytes(1500)),
        store.clone(),
    );
    let right = fund_pipeline(
        "retirement_industry_fund",
        MockRequester::ok(r#"{"proof_url":"https://industry/proof.pdf"}"#),
        MockDocumentSource::new().with_document("https://industry/proof.pdf", pdf_bytes(1600)),
        store.clone(),
    );

    let pipeline = merged(left, right, store.clone());
    let input = PipelineInput::new(Uuid::new_v4(), "DE123456789");

    let result = pipeline.call(&input, &SilentReporter).await.unwrap();

    assert_eq!(
        result.bundled.context_value(CONTEXT_MERGE_STATUS),
        Some(&Value::String("success_both".to_string()))
    );
    let row = store.row(input.application_id, "retirement_proof").unwrap();
    assert_eq!(row.source, ResponseSource::Auto);
    assert_eq!(row.documents.len(), 2);
}

/// Scenario C: source A returns a valid document, source B raises a
/// connection-refused error. The merge is partial, one document is
/// present, and no pipeline-level error escapes.
#[tokio::test]
async fn test_one_source_failing_yields_partial_success() {
    let store = MockStore::with_attributes(retirement_attributes());
    let left = fund_pipeline(
        "retirement_state_fund",
        MockRequester::ok(r#"{"proof_url":"https://state/proof.pdf"}"#),
        MockDocumentSource::new().with_document("https://state/proof.pdf", pdf_bytes(1500)),
        store.clone(),
    );
    let right = fund_pipeline(
        "retirement_industry_fund",
        MockRequester::new(CannedResponse::ConnectionRefused),
        MockDocumentSource::new(),
        store.clone(),
    );

    let pipeline = merged(left, right, store.clone());
    let input = PipelineInput::new(Uuid::new_v4(), "DE123456789");

    let result = pipeline.call(&input, &SilentReporter).await.unwrap();

    assert_eq!(
        result.bundled.context_value(CONTEXT_MERGE_STATUS),
        Some(&Value::String("success_partial".to_string()))
    );
    let row = store.row(input.application_id, "retirement_proof").unwrap();
    assert_eq!(row.documents.len(), 1);
    assert_eq!(
        row.documents[0].metadata["provider"],
        "retirement_state_fund"
    );
}

#[tokio::test]
async fn test_both_sources_failing_fails_the_merge_with_both_errors() {
    let store = MockStore::with_attributes(retirement_attributes());
    let left = fund_pipeline(
        "retirement_state_fund",
        MockRequester::new(CannedResponse::Timeout),
        MockDocumentSource::new(),
        store.clone(),
    );
    let right = fund_pipeline(
        "retirement_industry_fund",
        MockRequester::new(CannedResponse::ConnectionRefused),
        MockDocumentSource::new(),
        store.clone(),
    );

    let pipeline = merged(left, right, store.clone());
    let input = PipelineInput::new(Uuid::new_v4(), "DE123456789");

    let err = pipeline.call(&input, &SilentReporter).await.unwrap_err();

    assert_eq!(err.stage, Stage::Merge);
    assert_eq!(err.provider, MERGED_PROVIDER);
    let msg = err.to_string();
    assert!(msg.contains("retirement_state_fund"));
    assert!(msg.contains("retirement_industry_fund"));
    assert_eq!(store.row_count(), 0);
}
