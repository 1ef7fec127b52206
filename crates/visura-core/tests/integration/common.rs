//! Test utilities and mock implementations for integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use visura_core::config::FetchPolicy;
use visura_core::error::AppError;
use visura_core::job::{CreateJobRequest, FetchJob, JobStatus, RetryConfig};
use visura_core::job_queue::JobQueue;
use visura_core::mapper::DataMapper;
use visura_core::models::{MarketAttribute, MarketAttributeResponse, ResponseWrite};
use visura_core::pipeline::Pipeline;
use visura_core::resource::{
    BundledData, DocumentKind, DocumentPayload, DocumentRef, DocumentSlot, Resource, TaxClearance,
};
use visura_core::status::{ProviderFetchState, SyncStatus};
use visura_core::traits::{
    ApplicationStore, DocumentSource, ErrorReport, ErrorTracker, PipelineFactory, RawResponse,
    Requester, ResourceBuilder, ResponseStore, TransportResponse, WebhookTransport,
};

pub const TEST_PROVIDER: &str = "tax_registry";

/// Default attribute catalog used by most tests.
pub fn test_attributes() -> Vec<MarketAttribute> {
    vec![
        MarketAttribute::automatic("tax_clearance", TEST_PROVIDER, "tax_clearance_document"),
        MarketAttribute::automatic("tax_office", TEST_PROVIDER, "tax_office"),
        MarketAttribute::manual("stand_size"),
    ]
}

// =============================================================================
// MockRequester
// =============================================================================

/// Scripted provider answer.
#[derive(Clone)]
pub enum CannedResponse {
    Ok { body: String },
    Status { status: u16, body: String },
    Timeout,
    ConnectionRefused,
}

/// Mock requester returning a scripted answer and counting calls.
#[derive(Clone)]
pub struct MockRequester {
    canned: CannedResponse,
    calls: Arc<AtomicUsize>,
}

impl MockRequester {
    pub fn new(canned: CannedResponse) -> Self {
        Self {
            canned,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn ok(body: &str) -> Self {
        Self::new(CannedResponse::Ok {
            body: body.to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Requester for MockRequester {
    async fn fetch(&self, _company_ref: &str) -> Result<RawResponse, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.canned {
            CannedResponse::Ok { body } => Ok(RawResponse::ok(body.clone())),
            CannedResponse::Status { status, body } => Err(AppError::HttpStatus {
                status: *status,
                body: body.clone(),
            }),
            CannedResponse::Timeout => Err(AppError::Timeout(30)),
            CannedResponse::ConnectionRefused => {
                Err(AppError::NetworkError("connection refused".to_string()))
            }
        }
    }
}

// =============================================================================
// StubClearanceBuilder
// =============================================================================

/// Minimal clearance parser: `{"data": {"document_url": ...}}`.
#[derive(Clone, Default)]
pub struct StubClearanceBuilder;

impl ResourceBuilder for StubClearanceBuilder {
    fn build(&self, response: &RawResponse) -> Result<BundledData, AppError> {
        let value: serde_json::Value =
            serde_json::from_str(&response.body).map_err(|e| AppError::ContractViolation {
                provider: TEST_PROVIDER.to_string(),
                detail: e.to_string(),
            })?;
        let data = value.get("data").ok_or_else(|| AppError::ContractViolation {
            provider: TEST_PROVIDER.to_string(),
            detail: "missing 'data' key".to_string(),
        })?;

        let clearance = data
            .get("document_url")
            .and_then(|u| u.as_str())
            .map(|url| {
                DocumentSlot::Reference(DocumentRef {
                    id: "clearance".to_string(),
                    url: url.to_string(),
                    name_hint: Some("tax-clearance".to_string()),
                    expected: DocumentKind::Pdf,
                })
            });

        Ok(BundledData::new(Resource::TaxClearance(TaxClearance {
            clearance,
            issued_on: None,
            tax_office: data
                .get("tax_office")
                .and_then(|o| o.as_str())
                .map(String::from),
        })))
    }
}

// =============================================================================
// MockDocumentSource
// =============================================================================

const MIN_DOCUMENT_BYTES: usize = 1024;

/// Mock document host: URL -> payload bytes. Unknown URLs answer 404.
/// Downloads enforce the same minimum-size and `%PDF-` signature rules as
/// the HTTP implementation.
#[derive(Clone, Default)]
pub struct MockDocumentSource {
    documents: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, url: &str, bytes: Vec<u8>) -> Self {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes);
        self
    }
}

/// A well-formed PDF payload of the given total length.
pub fn pdf_bytes(len: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(len, b'x');
    bytes
}

impl DocumentSource for MockDocumentSource {
    async fn download(
        &self,
        reference: &DocumentRef,
        company_ref: &str,
    ) -> Result<DocumentPayload, AppError> {
        let bytes = self
            .documents
            .lock()
            .unwrap()
            .get(&reference.url)
            .cloned()
            .ok_or(AppError::HttpStatus {
                status: 404,
                body: "not found".to_string(),
            })?;

        if bytes.len() < MIN_DOCUMENT_BYTES {
            return Err(AppError::DocumentInvalid {
                reason: format!("payload is {} bytes", bytes.len()),
            });
        }
        if !bytes.starts_with(b"%PDF-") {
            return Err(AppError::DocumentInvalid {
                reason: "missing %PDF- signature".to_string(),
            });
        }

        let hint = reference.name_hint.as_deref().unwrap_or(&reference.id);
        Ok(DocumentPayload {
            bytes,
            filename: format!("{}-{}.pdf", company_ref.to_lowercase(), hint),
            content_type: "application/pdf".to_string(),
            metadata: serde_json::json!({ "source_url": reference.url }),
        })
    }
}

// =============================================================================
// MockStore (ResponseStore + ApplicationStore)
// =============================================================================

#[derive(Default)]
struct MockStoreInner {
    attributes: Vec<MarketAttribute>,
    responses: HashMap<(Uuid, String), MarketAttributeResponse>,
    fetch_status: HashMap<(Uuid, String), ProviderFetchState>,
    completed: HashSet<Uuid>,
    sync_status: HashMap<Uuid, SyncStatus>,
}

/// In-memory store mock with seed and inspection helpers.
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<MockStoreInner>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attributes(attributes: Vec<MarketAttribute>) -> Self {
        let store = Self::new();
        store.inner.lock().unwrap().attributes = attributes;
        store
    }

    pub fn insert_row(
        &self,
        application_id: Uuid,
        key: &str,
        value: Option<serde_json::Value>,
        source: visura_core::models::ResponseSource,
    ) {
        self.inner.lock().unwrap().responses.insert(
            (application_id, key.to_string()),
            MarketAttributeResponse {
                application_id,
                attribute_key: key.to_string(),
                value,
                source,
                documents: Vec::new(),
                updated_at: Utc::now(),
            },
        );
    }

    pub fn row(&self, application_id: Uuid, key: &str) -> Option<MarketAttributeResponse> {
        self.inner
            .lock()
            .unwrap()
            .responses
            .get(&(application_id, key.to_string()))
            .cloned()
    }

    pub fn row_count(&self) -> usize {
        self.inner.lock().unwrap().responses.len()
    }

    pub fn mark_completed(&self, application_id: Uuid) {
        self.inner.lock().unwrap().completed.insert(application_id);
    }

    pub fn fetch_state(&self, application_id: Uuid, provider: &str) -> Option<ProviderFetchState> {
        self.inner
            .lock()
            .unwrap()
            .fetch_status
            .get(&(application_id, provider.to_string()))
            .copied()
    }

    pub fn set_sync(&self, application_id: Uuid, status: SyncStatus) {
        self.inner
            .lock()
            .unwrap()
            .sync_status
            .insert(application_id, status);
    }

    pub fn sync(&self, application_id: Uuid) -> SyncStatus {
        self.inner
            .lock()
            .unwrap()
            .sync_status
            .get(&application_id)
            .copied()
            .unwrap_or(SyncStatus::Pending)
    }
}

impl ResponseStore for MockStore {
    async fn attributes_for_provider(
        &self,
        provider: &str,
    ) -> Result<Vec<MarketAttribute>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .attributes
            .iter()
            .filter(|a| a.api_name.as_deref() == Some(provider))
            .cloned()
            .collect())
    }

    async fn find_response(
        &self,
        application_id: Uuid,
        attribute_key: &str,
    ) -> Result<Option<MarketAttributeResponse>, AppError> {
        Ok(self.row(application_id, attribute_key))
    }

    async fn upsert_response(
        &self,
        application_id: Uuid,
        attribute_key: &str,
        write: ResponseWrite,
    ) -> Result<(), AppError> {
        self.inner.lock().unwrap().responses.insert(
            (application_id, attribute_key.to_string()),
            MarketAttributeResponse {
                application_id,
                attribute_key: attribute_key.to_string(),
                value: write.value,
                source: write.source,
                documents: write.documents,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }
}

impl ApplicationStore for MockStore {
    async fn read_fetch_status(
        &self,
        application_id: Uuid,
        provider: &str,
    ) -> Result<Option<ProviderFetchState>, AppError> {
        Ok(self.fetch_state(application_id, provider))
    }

    async fn set_fetch_status(
        &self,
        application_id: Uuid,
        provider: &str,
        state: ProviderFetchState,
    ) -> Result<(), AppError> {
        self.inner
            .lock()
            .unwrap()
            .fetch_status
            .insert((application_id, provider.to_string()), state);
        Ok(())
    }

    async fn is_completed(&self, application_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .completed
            .contains(&application_id))
    }

    async fn sync_status(&self, application_id: Uuid) -> Result<SyncStatus, AppError> {
        Ok(self.sync(application_id))
    }

    async fn transition_sync_status(
        &self,
        application_id: Uuid,
        from: SyncStatus,
        to: SyncStatus,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let current = inner
            .sync_status
            .get(&application_id)
            .copied()
            .unwrap_or(SyncStatus::Pending);
        if current != from {
            return Ok(false);
        }
        inner.sync_status.insert(application_id, to);
        Ok(true)
    }
}

// =============================================================================
// MockJobQueue
// =============================================================================

/// Minimal in-memory job queue for worker tests.
#[derive(Clone, Default)]
pub struct MockJobQueue {
    jobs: Arc<Mutex<HashMap<Uuid, FetchJob>>>,
}

impl MockJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self, job_id: Uuid) -> Option<FetchJob> {
        self.jobs.lock().unwrap().get(&job_id).cloned()
    }
}

impl JobQueue for MockJobQueue {
    async fn create_job(&self, request: CreateJobRequest) -> Result<FetchJob, AppError> {
        let now = Utc::now();
        let job = FetchJob {
            id: Uuid::new_v4(),
            application_id: request.application_id,
            company_ref: request.company_ref,
            provider: request.provider,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries: request
                .max_retries
                .unwrap_or(RetryConfig::default().max_retries),
            next_retry_at: None,
            error_message: None,
            fields_filled: None,
            worker_id: None,
        };
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(job)
    }

    async fn claim_job(&self, worker_id: &str) -> Result<Option<FetchJob>, AppError> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let candidate = jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Pending
                    && j.next_retry_at.is_none_or(|retry_at| retry_at <= now)
            })
            .min_by_key(|j| (j.next_retry_at.is_some(), j.created_at))
            .map(|j| j.id);

        match candidate.and_then(|id| jobs.get_mut(&id)) {
            Some(job) => {
                job.status = JobStatus::Running;
                job.worker_id = Some(worker_id.to_string());
                job.started_at = Some(now);
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn complete_job(&self, job_id: Uuid, fields_filled: usize) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::StoreError("job not found".to_string()))?;
        job.status = JobStatus::Completed;
        job.fields_filled = Some(fields_filled);
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail_job(
        &self,
        job_id: Uuid,
        error: &str,
        next_retry_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::StoreError("job not found".to_string()))?;
        job.error_message = Some(error.to_string());
        match next_retry_at {
            Some(retry_at) => {
                job.status = JobStatus::Pending;
                job.retry_count += 1;
                job.next_retry_at = Some(retry_at);
                job.worker_id = None;
            }
            None => {
                job.status = JobStatus::Failed;
                job.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<(), AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::StoreError("job not found".to_string()))?;
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<FetchJob>, AppError> {
        Ok(self.job(job_id))
    }

    async fn list_jobs(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<FetchJob>, AppError> {
        let jobs = self.jobs.lock().unwrap();
        let mut listed: Vec<FetchJob> = jobs
            .values()
            .filter(|j| status.is_none_or(|s| j.status == s))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.truncate(limit);
        Ok(listed)
    }

    async fn release_worker_jobs(&self, worker_id: &str) -> Result<u64, AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let mut released = 0;
        for job in jobs.values_mut() {
            if job.status == JobStatus::Running && job.worker_id.as_deref() == Some(worker_id) {
                job.status = JobStatus::Pending;
                job.worker_id = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64, AppError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == status)
            .count() as i64)
    }
}

// =============================================================================
// MockErrorTracker
// =============================================================================

/// Error tracker that records reports for inspection.
#[derive(Clone, Default)]
pub struct MockErrorTracker {
    reports: Arc<Mutex<Vec<ErrorReport>>>,
}

impl MockErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorTracker for MockErrorTracker {
    fn report(&self, report: &ErrorReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

// =============================================================================
// MockPipelineFactory
// =============================================================================

/// Factory producing the stub clearance pipeline for [`TEST_PROVIDER`].
#[derive(Clone)]
pub struct MockPipelineFactory {
    pub requester: MockRequester,
    pub documents: MockDocumentSource,
    pub store: MockStore,
    pub policy: FetchPolicy,
}

impl MockPipelineFactory {
    pub fn new(requester: MockRequester, documents: MockDocumentSource, store: MockStore) -> Self {
        Self {
            requester,
            documents,
            store,
            policy: FetchPolicy::AllOrNothing,
        }
    }
}

impl PipelineFactory for MockPipelineFactory {
    type Pipeline = Pipeline<MockRequester, StubClearanceBuilder, MockDocumentSource, MockStore>;

    fn create(&self, provider: &str) -> Result<Self::Pipeline, AppError> {
        if provider != TEST_PROVIDER {
            return Err(AppError::ConfigError(format!(
                "provider not configured: {}",
                provider
            )));
        }
        Ok(Pipeline::new(
            TEST_PROVIDER,
            self.requester.clone(),
            StubClearanceBuilder,
            self.documents.clone(),
            self.policy,
            DataMapper::new(self.store.clone()),
        ))
    }
}

// =============================================================================
// MockWebhookTransport
// =============================================================================

/// Scripted webhook endpoint answer.
#[derive(Clone)]
pub enum CannedDelivery {
    Status { status: u16, body: String },
    Timeout,
}

/// Transport replaying a scripted sequence of outcomes.
#[derive(Clone, Default)]
pub struct MockWebhookTransport {
    script: Arc<Mutex<Vec<CannedDelivery>>>,
    requests: Arc<AtomicUsize>,
}

impl MockWebhookTransport {
    pub fn new(script: Vec<CannedDelivery>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of HTTP requests actually attempted.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl WebhookTransport for MockWebhookTransport {
    async fn post(
        &self,
        _endpoint: &str,
        _body: &str,
        _signature: &str,
    ) -> Result<TransportResponse, AppError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                CannedDelivery::Status {
                    status: 200,
                    body: "ok".to_string(),
                }
            } else {
                script.remove(0)
            }
        };
        match next {
            CannedDelivery::Status { status, body } => Ok(TransportResponse { status, body }),
            CannedDelivery::Timeout => Err(AppError::Timeout(15)),
        }
    }
}
