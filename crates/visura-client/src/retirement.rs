//! Retirement fund clients: contribution proof from two registries.
//!
//! The same logical question — proof of retirement contributions — is
//! answerable by two independently-versioned registries with different
//! response shapes:
//!
//! State fund:
//! ```json
//! {"data": {"proof_url": "https://.../proof.pdf"}}
//! ```
//!
//! Industry fund:
//! ```json
//! {"member": {"attestation_url": "https://.../attestation.pdf"}}
//! ```
//!
//! Both parse into [`RetirementStatement`]; the merged pipeline combines
//! whatever documents were obtained (see `visura_core::merge`).

use serde::Deserialize;

use visura_core::config::ProviderEntry;
use visura_core::error::AppError;
use visura_core::mapper::DataMapper;
use visura_core::merge::MergedPipeline;
use visura_core::pipeline::Pipeline;
use visura_core::resource::{
    BundledData, DocumentKind, DocumentRef, DocumentSlot, Resource, RetirementStatement,
};
use visura_core::traits::{RawResponse, ResourceBuilder, ResponseStore};
use visura_core::DocumentConfig;

use crate::document::HttpDocumentSource;
use crate::http::ProviderHttp;

/// Canonical name of the merged logical provider.
pub const PROVIDER: &str = "retirement_fund";

/// Canonical name of the state fund source.
pub const STATE_FUND: &str = "retirement_state_fund";

/// Canonical name of the industry fund source.
pub const INDUSTRY_FUND: &str = "retirement_industry_fund";

fn proof_slot(provider: &'static str, url: Option<String>) -> Option<DocumentSlot> {
    url.map(|url| {
        DocumentSlot::Reference(DocumentRef {
            id: "proof".to_string(),
            url,
            name_hint: Some(format!("{}-proof", provider.replace('_', "-"))),
            expected: DocumentKind::Pdf,
        })
    })
}

// =============================================================================
// State fund
// =============================================================================

#[derive(Deserialize, Debug)]
struct StateEnvelope {
    data: StateAnswer,
}

#[derive(Deserialize, Debug)]
struct StateAnswer {
    proof_url: Option<String>,
}

/// Parses a state-fund answer into a [`RetirementStatement`].
#[derive(Debug, Clone, Default)]
pub struct StateFundBuilder;

impl ResourceBuilder for StateFundBuilder {
    fn build(&self, response: &RawResponse) -> Result<BundledData, AppError> {
        let envelope: StateEnvelope =
            serde_json::from_str(&response.body).map_err(|e| AppError::ContractViolation {
                provider: STATE_FUND.to_string(),
                detail: format!("expected a 'data' envelope: {}", e),
            })?;

        Ok(BundledData::new(Resource::RetirementStatement(
            RetirementStatement {
                provider: STATE_FUND,
                proof: proof_slot(STATE_FUND, envelope.data.proof_url),
            },
        )))
    }
}

// =============================================================================
// Industry fund
// =============================================================================

#[derive(Deserialize, Debug)]
struct IndustryEnvelope {
    member: IndustryAnswer,
}

#[derive(Deserialize, Debug)]
struct IndustryAnswer {
    attestation_url: Option<String>,
}

/// Parses an industry-fund answer into a [`RetirementStatement`].
#[derive(Debug, Clone, Default)]
pub struct IndustryFundBuilder;

impl ResourceBuilder for IndustryFundBuilder {
    fn build(&self, response: &RawResponse) -> Result<BundledData, AppError> {
        let envelope: IndustryEnvelope =
            serde_json::from_str(&response.body).map_err(|e| AppError::ContractViolation {
                provider: INDUSTRY_FUND.to_string(),
                detail: format!("expected a 'member' envelope: {}", e),
            })?;

        Ok(BundledData::new(Resource::RetirementStatement(
            RetirementStatement {
                provider: INDUSTRY_FUND,
                proof: proof_slot(INDUSTRY_FUND, envelope.member.attestation_url),
            },
        )))
    }
}

// =============================================================================
// Pipelines
// =============================================================================

fn source_pipeline<B, S>(
    provider: &'static str,
    builder: B,
    entry: &ProviderEntry,
    store: S,
) -> Result<Pipeline<ProviderHttp, B, HttpDocumentSource, S>, AppError>
where
    B: ResourceBuilder,
    S: ResponseStore,
{
    let http = entry.http_config();
    let requester = ProviderHttp::new(
        provider,
        &entry.base_url,
        &entry.path_template,
        entry.credentials_env.clone(),
        http,
    )?;
    let documents = HttpDocumentSource::new(
        provider,
        entry.credentials_env.clone(),
        http,
        DocumentConfig::default(),
    )?;

    Ok(Pipeline::new(
        provider,
        requester,
        builder,
        documents,
        entry.fetch_policy,
        DataMapper::new(store),
    ))
}

/// The merged retirement pipeline type.
pub type RetirementPipeline<S> = MergedPipeline<
    ProviderHttp,
    StateFundBuilder,
    HttpDocumentSource,
    ProviderHttp,
    IndustryFundBuilder,
    HttpDocumentSource,
    S,
>;

/// Builds the merged retirement pipeline from both fund entries.
pub fn merged_pipeline<S: ResponseStore>(
    state_entry: &ProviderEntry,
    industry_entry: &ProviderEntry,
    store: S,
) -> Result<RetirementPipeline<S>, AppError> {
    let left = source_pipeline(STATE_FUND, StateFundBuilder, state_entry, store.clone())?;
    let right = source_pipeline(
        INDUSTRY_FUND,
        IndustryFundBuilder,
        industry_entry,
        store.clone(),
    )?;

    Ok(MergedPipeline::new(
        PROVIDER,
        left,
        right,
        DataMapper::new(store),
    ))
}
