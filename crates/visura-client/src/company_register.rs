//! Commercial register client: company master data.
//!
//! Answers carry a `company` object:
//!
//! ```json
//! {
//!     "company": {
//!         "legal_name": "Muster GmbH",
//!         "legal_form": "GmbH",
//!         "registration_number": "HRB 1234",
//!         "seat": "Berlin",
//!         "founded_on": "2012-04-01",
//!         "status": {
//!             "insolvency_proceedings": true,
//!             "insolvency_details": "opened 2024-01-15",
//!             "in_liquidation": false
//!         }
//!     }
//! }
//! ```
//!
//! No documents are involved. Insolvency or liquidation markers surface
//! as a `legal_risk` flag in the bundle context so downstream processing
//! can react without treating the flag as a form field.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use visura_core::config::ProviderEntry;
use visura_core::error::AppError;
use visura_core::mapper::DataMapper;
use visura_core::pipeline::Pipeline;
use visura_core::resource::{BundledData, CompanyProfile, Resource, CONTEXT_LEGAL_RISK};
use visura_core::traits::{RawResponse, ResourceBuilder, ResponseStore};
use visura_core::DocumentConfig;

use crate::document::HttpDocumentSource;
use crate::http::ProviderHttp;

/// Canonical provider name.
pub const PROVIDER: &str = "company_register";

#[derive(Deserialize, Debug)]
struct Envelope {
    company: Answer,
}

#[derive(Deserialize, Debug, Default)]
struct Answer {
    legal_name: Option<String>,
    legal_form: Option<String>,
    registration_number: Option<String>,
    seat: Option<String>,
    founded_on: Option<NaiveDate>,
    #[serde(default)]
    status: StatusBlock,
}

#[derive(Deserialize, Debug, Default)]
struct StatusBlock {
    #[serde(default)]
    insolvency_proceedings: bool,
    insolvency_details: Option<String>,
    #[serde(default)]
    in_liquidation: bool,
}

/// Parses a register answer into a [`CompanyProfile`].
#[derive(Debug, Clone, Default)]
pub struct CompanyRegisterBuilder;

impl ResourceBuilder for CompanyRegisterBuilder {
    fn build(&self, response: &RawResponse) -> Result<BundledData, AppError> {
        let envelope: Envelope =
            serde_json::from_str(&response.body).map_err(|e| AppError::ContractViolation {
                provider: PROVIDER.to_string(),
                detail: format!("expected a 'company' envelope: {}", e),
            })?;

        let answer = envelope.company;
        let profile = CompanyProfile {
            legal_name: answer.legal_name,
            legal_form: answer.legal_form,
            registration_number: answer.registration_number,
            seat: answer.seat,
            founded_on: answer.founded_on,
            insolvency_proceedings: answer.status.insolvency_proceedings,
            insolvency_details: answer.status.insolvency_details,
            in_liquidation: answer.status.in_liquidation,
        };

        let legal_risk = profile.has_legal_risk();
        if legal_risk {
            tracing::warn!(provider = PROVIDER, "Legal-risk marker in register answer");
        }

        Ok(BundledData::new(Resource::CompanyProfile(profile))
            .with_context(CONTEXT_LEGAL_RISK, Value::Bool(legal_risk)))
    }
}

/// Builds the company-register pipeline from its configuration entry.
pub fn pipeline<S: ResponseStore>(
    entry: &ProviderEntry,
    store: S,
) -> Result<Pipeline<ProviderHttp, CompanyRegisterBuilder, HttpDocumentSource, S>, AppError> {
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
        CompanyRegisterBuilder,
        documents,
        entry.fetch_policy,
        DataMapper::new(store),
    ))
}
