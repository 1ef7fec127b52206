//! Professional-certification body client: certificate lists.
//!
//! The body answers with a certificate array:
//!
//! ```json
//! {
//!     "certificates": [
//!         {"name": "Master Craftsman", "download_url": "https://.../0.pdf"},
//!         {"name": "Safety Training", "download_url": "https://.../1.pdf"}
//!     ]
//! }
//! ```
//!
//! An empty array is a valid empty result, not an error. The body also
//! paginates large answers and signals truncation through the
//! `x-more-results` response header, which the builder records as a
//! context flag — this is why the builder receives the prior HTTP
//! response's headers, not just the body.
//!
//! This is the slowest provider and uses the generous document timeouts;
//! its fetch policy is best-effort: individual broken certificates are
//! skipped, and the stage only fails when none could be retrieved.

use serde::Deserialize;
use serde_json::Value;

use visura_core::config::ProviderEntry;
use visura_core::error::AppError;
use visura_core::mapper::DataMapper;
use visura_core::pipeline::Pipeline;
use visura_core::resource::{
    BundledData, CertificateSlot, DocumentKind, DocumentRef, DocumentSlot,
    ProfessionalCertificates, Resource,
};
use visura_core::traits::{RawResponse, ResourceBuilder, ResponseStore};
use visura_core::DocumentConfig;

use crate::document::HttpDocumentSource;
use crate::http::ProviderHttp;

/// Canonical provider name.
pub const PROVIDER: &str = "professional_certs";

/// Pagination-truncation response header.
pub const MORE_RESULTS_HEADER: &str = "x-more-results";

/// Context key recording that the certificate list was truncated.
pub const CONTEXT_CERTIFICATES_TRUNCATED: &str = "certificates_truncated";

#[derive(Deserialize, Debug)]
struct Envelope {
    certificates: Vec<Certificate>,
}

#[derive(Deserialize, Debug)]
struct Certificate {
    name: String,
    download_url: String,
}

/// Parses a certification-body answer into [`ProfessionalCertificates`].
#[derive(Debug, Clone, Default)]
pub struct ProfessionalCertsBuilder;

impl ResourceBuilder for ProfessionalCertsBuilder {
    fn build(&self, response: &RawResponse) -> Result<BundledData, AppError> {
        let envelope: Envelope =
            serde_json::from_str(&response.body).map_err(|e| AppError::ContractViolation {
                provider: PROVIDER.to_string(),
                detail: format!("expected a 'certificates' array: {}", e),
            })?;

        let certificates = envelope
            .certificates
            .into_iter()
            .enumerate()
            .map(|(index, certificate)| CertificateSlot {
                name: certificate.name.clone(),
                slot: DocumentSlot::Reference(DocumentRef {
                    id: format!("cert-{}", index),
                    url: certificate.download_url,
                    name_hint: Some(certificate.name),
                    expected: DocumentKind::Pdf,
                }),
            })
            .collect();

        let truncated = response
            .headers
            .get(MORE_RESULTS_HEADER)
            .is_some_and(|v| v == "true");

        Ok(BundledData::new(Resource::ProfessionalCertificates(
            ProfessionalCertificates { certificates },
        ))
        .with_context(CONTEXT_CERTIFICATES_TRUNCATED, Value::Bool(truncated)))
    }
}

/// Builds the certification-body pipeline from its configuration entry.
pub fn pipeline<S: ResponseStore>(
    entry: &ProviderEntry,
    store: S,
) -> Result<Pipeline<ProviderHttp, ProfessionalCertsBuilder, HttpDocumentSource, S>, AppError> {
    let http = entry.http_config();
    let requester = ProviderHttp::new(
        PROVIDER,
        &entry.base_url,
        &entry.path_template,
        entry.credentials_env.clone(),
        http,
    )?;
    let documents = HttpDocumentSource::new(
        PROVIDER,
        entry.credentials_env.clone(),
        http,
        DocumentConfig::default(),
    )?;

    Ok(Pipeline::new(
        PROVIDER,
        requester,
        ProfessionalCertsBuilder,
        documents,
        entry.fetch_policy,
        DataMapper::new(store),
    ))
}
