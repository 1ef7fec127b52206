//! Tax registry client: tax clearance certificates.
//!
//! The registry answers with a `data` envelope:
//!
//! ```json
//! {
//!     "data": {
//!         "document_url": "https://.../cert.pdf",
//!         "issued_on": "2026-01-05",
//!         "tax_office": "Finanzamt Mitte"
//!     }
//! }
//! ```
//!
//! A body without the `data` key is a contract violation. An answer
//! without `document_url` is valid (no certificate on file yet).

use chrono::NaiveDate;
use serde::Deserialize;

use visura_core::config::ProviderEntry;
use visura_core::error::AppError;
use visura_core::mapper::DataMapper;
use visura_core::pipeline::Pipeline;
use visura_core::resource::{
    BundledData, DocumentKind, DocumentRef, DocumentSlot, Resource, TaxClearance,
};
use visura_core::traits::{RawResponse, ResourceBuilder, ResponseStore};
use visura_core::DocumentConfig;

use crate::document::HttpDocumentSource;
use crate::http::ProviderHttp;

/// Canonical provider name.
pub const PROVIDER: &str = "tax_registry";

#[derive(Deserialize, Debug)]
struct Envelope {
    data: Answer,
}

#[derive(Deserialize, Debug)]
struct Answer {
    document_url: Option<String>,
    issued_on: Option<NaiveDate>,
    tax_office: Option<String>,
}

/// Parses a tax-registry response into a [`TaxClearance`] record.
#[derive(Debug, Clone, Default)]
pub struct TaxClearanceBuilder;

impl TaxClearanceBuilder {
    fn parse(&self, response: &RawResponse) -> Result<Envelope, AppError> {
        serde_json::from_str(&response.body).map_err(|e| AppError::ContractViolation {
            provider: PROVIDER.to_string(),
            detail: format!("expected a 'data' envelope: {}", e),
        })
    }
}

impl ResourceBuilder for TaxClearanceBuilder {
    fn build(&self, response: &RawResponse) -> Result<BundledData, AppError> {
        let envelope = self.parse(response)?;

        let clearance = envelope.data.document_url.map(|url| {
            DocumentSlot::Reference(DocumentRef {
                id: "clearance".to_string(),
                url,
                name_hint: Some("tax-clearance".to_string()),
                expected: DocumentKind::Pdf,
            })
        });

        Ok(BundledData::new(Resource::TaxClearance(TaxClearance {
            clearance,
            issued_on: envelope.data.issued_on,
            tax_office: envelope.data.tax_office,
        })))
    }
}

/// Builds the tax-registry pipeline from its configuration entry.
pub fn pipeline<S: ResponseStore>(
    entry: &ProviderEntry,
    store: S,
) -> Result<Pipeline<ProviderHttp, TaxClearanceBuilder, HttpDocumentSource, S>, AppError> {
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
        TaxClearanceBuilder,
        documents,
        entry.fetch_policy,
        DataMapper::new(store),
    ))
}
