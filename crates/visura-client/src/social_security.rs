//! Social-security fund client: employer clearance certificates.
//!
//! The fund wraps every answer in a success envelope:
//!
//! ```json
//! {
//!     "success": true,
//!     "result": {
//!         "certificate_url": "https://.../certificate.pdf",
//!         "debt_free": true
//!     }
//! }
//! ```
//!
//! `success: false` and a missing `result` key are contract violations.

use serde::Deserialize;

use visura_core::config::ProviderEntry;
use visura_core::error::AppError;
use visura_core::mapper::DataMapper;
use visura_core::pipeline::Pipeline;
use visura_core::resource::{
    BundledData, DocumentKind, DocumentRef, DocumentSlot, Resource, SocialSecurityClearance,
};
use visura_core::traits::{RawResponse, ResourceBuilder, ResponseStore};
use visura_core::DocumentConfig;

use crate::document::HttpDocumentSource;
use crate::http::ProviderHttp;

/// Canonical provider name.
pub const PROVIDER: &str = "social_security";

#[derive(Deserialize, Debug)]
struct Envelope {
    success: bool,
    result: Option<Answer>,
}

#[derive(Deserialize, Debug)]
struct Answer {
    certificate_url: Option<String>,
    debt_free: Option<bool>,
}

/// Parses a social-security answer into a [`SocialSecurityClearance`].
#[derive(Debug, Clone, Default)]
pub struct SocialSecurityBuilder;

impl ResourceBuilder for SocialSecurityBuilder {
    fn build(&self, response: &RawResponse) -> Result<BundledData, AppError> {
        let envelope: Envelope =
            serde_json::from_str(&response.body).map_err(|e| AppError::ContractViolation {
                provider: PROVIDER.to_string(),
                detail: format!("expected a success envelope: {}", e),
            })?;

        if !envelope.success {
            return Err(AppError::ContractViolation {
                provider: PROVIDER.to_string(),
                detail: "fund answered success: false".to_string(),
            });
        }

        let answer = envelope.result.ok_or_else(|| AppError::ContractViolation {
            provider: PROVIDER.to_string(),
            detail: "missing 'result' key".to_string(),
        })?;

        let certificate = answer.certificate_url.map(|url| {
            DocumentSlot::Reference(DocumentRef {
                id: "certificate".to_string(),
                url,
                name_hint: Some("social-security-certificate".to_string()),
                expected: DocumentKind::Pdf,
            })
        });

        Ok(BundledData::new(Resource::SocialSecurityClearance(
            SocialSecurityClearance {
                certificate,
                debt_free: answer.debt_free,
            },
        )))
    }
}

/// Builds the social-security pipeline from its configuration entry.
pub fn pipeline<S: ResponseStore>(
    entry: &ProviderEntry,
    store: S,
) -> Result<Pipeline<ProviderHttp, SocialSecurityBuilder, HttpDocumentSource, S>, AppError> {
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
        SocialSecurityBuilder,
        documents,
        entry.fetch_policy,
        DataMapper::new(store),
    ))
}
