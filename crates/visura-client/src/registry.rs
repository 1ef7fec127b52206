//! Provider registry: canonical name → runnable pipeline.
//!
//! New providers register here instead of subclassing anything: add a
//! module with a builder and a `pipeline` constructor, then a match arm.
//! The registry implements [`PipelineFactory`], which is what the worker
//! service programs against.

use visura_core::config::ProvidersConfig;
use visura_core::error::AppError;
use visura_core::pipeline::{Pipeline, PipelineError, PipelineInput, PipelineResult};
use visura_core::progress::PipelineReporter;
use visura_core::traits::{PipelineFactory, ProviderPipeline, ResponseStore};

use crate::document::HttpDocumentSource;
use crate::http::ProviderHttp;
use crate::{company_register, professional_certs, retirement, social_security, tax_registry};

/// All canonical provider names the registry can create pipelines for.
pub const KNOWN_PROVIDERS: &[&str] = &[
    tax_registry::PROVIDER,
    social_security::PROVIDER,
    company_register::PROVIDER,
    professional_certs::PROVIDER,
    retirement::PROVIDER,
];

/// A pipeline for any known provider.
pub enum ProviderPipelineKind<S: ResponseStore> {
    TaxRegistry(
        Pipeline<ProviderHttp, tax_registry::TaxClearanceBuilder, HttpDocumentSource, S>,
    ),
    SocialSecurity(
        Pipeline<ProviderHttp, social_security::SocialSecurityBuilder, HttpDocumentSource, S>,
    ),
    CompanyRegister(
        Pipeline<ProviderHttp, company_register::CompanyRegisterBuilder, HttpDocumentSource, S>,
    ),
    ProfessionalCerts(
        Pipeline<ProviderHttp, professional_certs::ProfessionalCertsBuilder, HttpDocumentSource, S>,
    ),
    RetirementFund(retirement::RetirementPipeline<S>),
}

impl<S: ResponseStore> ProviderPipeline for ProviderPipelineKind<S> {
    fn provider(&self) -> &'static str {
        match self {
            Self::TaxRegistry(p) => p.provider(),
            Self::SocialSecurity(p) => p.provider(),
            Self::CompanyRegister(p) => p.provider(),
            Self::ProfessionalCerts(p) => p.provider(),
            Self::RetirementFund(p) => p.provider(),
        }
    }

    async fn call<P: PipelineReporter>(
        &self,
        input: &PipelineInput,
        reporter: &P,
    ) -> Result<PipelineResult, PipelineError> {
        match self {
            Self::TaxRegistry(p) => p.call_with_reporter(input, reporter).await,
            Self::SocialSecurity(p) => p.call_with_reporter(input, reporter).await,
            Self::CompanyRegister(p) => p.call_with_reporter(input, reporter).await,
            Self::ProfessionalCerts(p) => p.call_with_reporter(input, reporter).await,
            Self::RetirementFund(p) => p.call_with_reporter(input, reporter).await,
        }
    }
}

/// Registry mapping canonical provider names to pipelines.
#[derive(Clone)]
pub struct ProviderRegistry<S: ResponseStore> {
    config: ProvidersConfig,
    store: S,
}

impl<S: ResponseStore> ProviderRegistry<S> {
    /// Creates a registry over the given configuration and store.
    pub fn new(config: ProvidersConfig, store: S) -> Self {
        Self { config, store }
    }

    fn entry(&self, name: &str) -> Result<&visura_core::config::ProviderEntry, AppError> {
        self.config
            .find_by_name(name)
            .ok_or_else(|| AppError::ConfigError(format!("provider not configured: {}", name)))
    }
}

impl<S: ResponseStore> PipelineFactory for ProviderRegistry<S> {
    type Pipeline = ProviderPipelineKind<S>;

    fn create(&self, provider: &str) -> Result<Self::Pipeline, AppError> {
        match provider {
            tax_registry::PROVIDER => Ok(ProviderPipelineKind::TaxRegistry(
                tax_registry::pipeline(self.entry(provider)?, self.store.clone())?,
            )),
            social_security::PROVIDER => Ok(ProviderPipelineKind::SocialSecurity(
                social_security::pipeline(self.entry(provider)?, self.store.clone())?,
            )),
            company_register::PROVIDER => Ok(ProviderPipelineKind::CompanyRegister(
                company_register::pipeline(self.entry(provider)?, self.store.clone())?,
            )),
            professional_certs::PROVIDER => Ok(ProviderPipelineKind::ProfessionalCerts(
                professional_certs::pipeline(self.entry(provider)?, self.store.clone())?,
            )),
            retirement::PROVIDER => Ok(ProviderPipelineKind::RetirementFund(
                retirement::merged_pipeline(
                    self.entry(retirement::STATE_FUND)?,
                    self.entry(retirement::INDUSTRY_FUND)?,
                    self.store.clone(),
                )?,
            )),
            other => Err(AppError::ConfigError(format!(
                "Unknown provider: '{}'. Known providers: {}",
                other,
                KNOWN_PROVIDERS.join(", ")
            ))),
        }
    }
}
