//! End-to-end pipeline tests over mock providers.

use uuid::Uuid;

use visura_core::config::FetchPolicy;
use visura_core::mapper::DataMapper;
use visura_core::models::ResponseSource;
use visura_core::pipeline::{Pipeline, PipelineInput, Stage};
use visura_core::progress::SilentReporter;
use visura_core::traits::ProviderPipeline;
use visura_core::AppError;

use crate::integration::common::{
    pdf_bytes, test_attributes, CannedResponse, MockDocumentSource, MockRequester, MockStore,
    StubClearanceBuilder, TEST_PROVIDER,
};

const COMPANY_REF: &str = "DE123456789";

fn pipeline(
    requester: MockRequester,
    documents: MockDocumentSource,
    store: MockStore,
    policy: FetchPolicy,
) -> Pipeline<MockRequester, StubClearanceBuilder, MockDocumentSource, MockStore> {
    Pipeline::new(
        TEST_PROVIDER,
        requester,
        StubClearanceBuilder,
        documents,
        policy,
        DataMapper::new(store),
    )
}

/// Scenario A: the provider answers with a document URL, the download is
/// a well-formed 2,000-byte PDF. The field response is written with
/// `source=auto` and one attached document named deterministically from
/// the company identifier.
#[tokio::test]
async fn test_successful_run_fills_field_with_document() {
    let store = MockStore::with_attributes(test_attributes());
    let requester = MockRequester::ok(r#"{"data":{"document_url":"https://x/cert.pdf"}}"#);
    let documents =
        MockDocumentSource::new().with_document("https://x/cert.pdf", pdf_bytes(2000));

    let pipeline = pipeline(
        requester,
        documents,
        store.clone(),
        FetchPolicy::AllOrNothing,
    );
    let input = PipelineInput::new(Uuid::new_v4(), COMPANY_REF);

    let result = pipeline.call(&input, &SilentReporter).await.unwrap();

    assert_eq!(result.fields_filled, 1);
    let row = store.row(input.application_id, "tax_clearance").unwrap();
    assert_eq!(row.source, ResponseSource::Auto);
    assert_eq!(row.documents.len(), 1);
    assert_eq!(row.documents[0].filename, "de123456789-tax-clearance.pdf");
    assert_eq!(row.documents[0].bytes.len(), 2000);
}

/// Scenario B: the provider answers HTTP 404. The pipeline fails at the
/// request stage and the mapper is never invoked (no rows are written).
#[tokio::test]
async fn test_http_404_fails_at_request_stage() {
    let store = MockStore::with_attributes(test_attributes());
    let requester = MockRequester::new(CannedResponse::Status {
        status: 404,
        body: "company not found".to_string(),
    });

    let pipeline = pipeline(
        requester,
        MockDocumentSource::new(),
        store.clone(),
        FetchPolicy::AllOrNothing,
    );
    let input = PipelineInput::new(Uuid::new_v4(), COMPANY_REF);

    let err = pipeline.call(&input, &SilentReporter).await.unwrap_err();

    assert_eq!(err.stage, Stage::Request);
    assert_eq!(err.provider, TEST_PROVIDER);
    assert!(!err.is_retryable());
    assert_eq!(store.row_count(), 0, "mapper must never have been invoked");
}

#[tokio::test]
async fn test_malformed_body_fails_at_parse_stage() {
    let store = MockStore::with_attributes(test_attributes());
    let requester = MockRequester::ok("<html>maintenance</html>");

    let pipeline = pipeline(
        requester,
        MockDocumentSource::new(),
        store.clone(),
        FetchPolicy::AllOrNothing,
    );
    let input = PipelineInput::new(Uuid::new_v4(), COMPANY_REF);

    let err = pipeline.call(&input, &SilentReporter).await.unwrap_err();

    assert_eq!(err.stage, Stage::Parse);
    assert!(matches!(err.error, AppError::ContractViolation { .. }));
    assert_eq!(store.row_count(), 0);
}

#[tokio::test]
async fn test_all_or_nothing_fails_on_single_bad_download() {
    let store = MockStore::with_attributes(test_attributes());
    let requester = MockRequester::ok(r#"{"data":{"document_url":"https://x/cert.pdf"}}"#);
    // Too small to pass validation.
    let documents = MockDocumentSource::new().with_document("https://x/cert.pdf", pdf_bytes(100));

    let pipeline = pipeline(
        requester,
        documents,
        store.clone(),
        FetchPolicy::AllOrNothing,
    );
    let input = PipelineInput::new(Uuid::new_v4(), COMPANY_REF);

    let err = pipeline.call(&input, &SilentReporter).await.unwrap_err();

    assert_eq!(err.stage, Stage::FetchDocuments);
    assert!(matches!(err.error, AppError::DocumentInvalid { .. }));
    assert_eq!(store.row_count(), 0);
}

/// A provider answering without any document reference is a valid result:
/// the document stage has nothing to do and mapping proceeds.
#[tokio::test]
async fn test_empty_reference_set_is_not_a_failure() {
    let store = MockStore::with_attributes(test_attributes());
    let requester = MockRequester::ok(r#"{"data":{"tax_office":"Finanzamt Mitte"}}"#);

    let pipeline = pipeline(
        requester,
        MockDocumentSource::new(),
        store.clone(),
        FetchPolicy::BestEffort,
    );
    let input = PipelineInput::new(Uuid::new_v4(), COMPANY_REF);

    let result = pipeline.call(&input, &SilentReporter).await.unwrap();

    assert_eq!(result.fields_filled, 1);
    let row = store.row(input.application_id, "tax_office").unwrap();
    assert_eq!(row.value, Some(serde_json::json!("Finanzamt Mitte")));
    // No document row was manufactured for the absent certificate.
    assert!(store.row(input.application_id, "tax_clearance").is_none());
}

mod document_stage {
    //! Policy behavior of the document-fetch stage in isolation.

    use visura_core::pipeline::run_document_stage;
    use visura_core::resource::{
        CertificateSlot, DocumentKind, DocumentRef, DocumentSlot, ProfessionalCertificates,
        ProviderRecord, Resource,
    };

    use super::*;

    fn certificates(urls: &[&str]) -> Resource {
        Resource::ProfessionalCertificates(ProfessionalCertificates {
            certificates: urls
                .iter()
                .enumerate()
                .map(|(index, url)| CertificateSlot {
                    name: format!("Certificate {}", index),
                    slot: DocumentSlot::Reference(DocumentRef {
                        id: format!("cert-{}", index),
                        url: url.to_string(),
                        name_hint: None,
                        expected: DocumentKind::Pdf,
                    }),
                })
                .collect(),
        })
    }

    #[tokio::test]
    async fn test_best_effort_skips_broken_documents() {
        let documents =
            MockDocumentSource::new().with_document("https://c/0.pdf", pdf_bytes(1500));
        let mut resource = certificates(&["https://c/0.pdf", "https://c/broken.pdf"]);

        let stats = run_document_stage(
            &documents,
            FetchPolicy::BestEffort,
            &mut resource,
            COMPANY_REF,
            &SilentReporter,
        )
        .await
        .unwrap();

        assert_eq!(stats.requested, 2);
        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.skipped, 1);
        // The broken reference stays unfetched; the good one is attached.
        assert_eq!(resource.document_refs().len(), 1);
    }

    #[tokio::test]
    async fn test_best_effort_fails_when_nothing_retrieved() {
        let documents = MockDocumentSource::new();
        let mut resource = certificates(&["https://c/0.pdf", "https://c/1.pdf"]);

        let err = run_document_stage(
            &documents,
            FetchPolicy::BestEffort,
            &mut resource,
            COMPANY_REF,
            &SilentReporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::DocumentInvalid { .. }));
    }

    #[tokio::test]
    async fn test_all_or_nothing_stops_at_first_failure() {
        let documents =
            MockDocumentSource::new().with_document("https://c/0.pdf", pdf_bytes(1500));
        let mut resource = certificates(&["https://c/broken.pdf", "https://c/0.pdf"]);

        let err = run_document_stage(
            &documents,
            FetchPolicy::AllOrNothing,
            &mut resource,
            COMPANY_REF,
            &SilentReporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::HttpStatus { status: 404, .. }));
        // Nothing was attached.
        assert_eq!(resource.document_refs().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_reference_set_counts_nothing() {
        let documents = MockDocumentSource::new();
        let mut resource = certificates(&[]);

        let stats = run_document_stage(
            &documents,
            FetchPolicy::BestEffort,
            &mut resource,
            COMPANY_REF,
            &SilentReporter,
        )
        .await
        .unwrap();

        assert_eq!(stats.requested, 0);
        assert_eq!(stats.fetched, 0);
    }
}

/// Running the same pipeline twice writes the same rows (idempotent
/// upsert keyed by application and attribute).
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let store = MockStore::with_attributes(test_attributes());
    let requester = MockRequester::ok(
        r#"{"data":{"document_url":"https://x/cert.pdf","tax_office":"Finanzamt Mitte"}}"#,
    );
    let probe = requester.clone();
    let documents =
        MockDocumentSource::new().with_document("https://x/cert.pdf", pdf_bytes(2000));

    let pipeline = pipeline(
        requester,
        documents,
        store.clone(),
        FetchPolicy::AllOrNothing,
    );
    let input = PipelineInput::new(Uuid::new_v4(), COMPANY_REF);

    let first = pipeline.call(&input, &SilentReporter).await.unwrap();
    let second = pipeline.call(&input, &SilentReporter).await.unwrap();

    assert_eq!(probe.calls(), 2);
    assert_eq!(first.fields_filled, second.fields_filled);
    assert_eq!(store.row_count(), 2);
    let row = store.row(input.application_id, "tax_clearance").unwrap();
    assert_eq!(row.documents.len(), 1);
}
