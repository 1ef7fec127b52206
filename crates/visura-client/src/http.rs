//! Shared HTTP machinery for provider requesters.
//!
//! Every provider issues one authenticated GET against a fixed endpoint
//! template (path built from the company identifier). Retries are
//! job-level re-enqueues, never in-process loops, so this module only
//! classifies transport failures into the error taxonomy and returns.

use reqwest::Client;
use url::Url;

use visura_core::config::HttpConfig;
use visura_core::error::AppError;
use visura_core::traits::{RawResponse, Requester};

/// User agent sent on all provider calls.
const USER_AGENT: &str = "Visura/0.3 (registry-aggregation)";

/// Builds a reqwest client with the given per-provider timeouts.
pub fn build_client(http: HttpConfig) -> Result<Client, AppError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(http.read_timeout)
        .connect_timeout(http.connect_timeout)
        .build()
        .map_err(|e| AppError::Generic(e.to_string()))
}

/// Classifies a reqwest transport error into the error taxonomy.
pub fn classify_transport_error(error: reqwest::Error, read_timeout_secs: u64) -> AppError {
    if error.is_timeout() {
        return AppError::Timeout(read_timeout_secs);
    }
    let detail = error.to_string();
    if detail.contains("tls") || detail.contains("certificate") || detail.contains("handshake") {
        return AppError::TlsError(detail);
    }
    if error.is_connect() {
        return AppError::NetworkError(format!("Connection failed: {}", detail));
    }
    AppError::NetworkError(detail)
}

/// One provider's authenticated requester.
///
/// Validates credential presence before making the call: a provider whose
/// `credentials_env` is configured but unset in the environment fails
/// fast with a missing-credentials error, which is never retried.
#[derive(Clone)]
pub struct ProviderHttp {
    provider: &'static str,
    client: Client,
    base_url: Url,
    path_template: String,
    credentials_env: Option<String>,
    read_timeout_secs: u64,
}

impl ProviderHttp {
    /// Creates a requester for one provider endpoint.
    pub fn new(
        provider: &'static str,
        base_url: &str,
        path_template: &str,
        credentials_env: Option<String>,
        http: HttpConfig,
    ) -> Result<Self, AppError> {
        let base_url =
            Url::parse(base_url).map_err(|_| AppError::InvalidUrl(base_url.to_string()))?;
        let client = build_client(http)?;

        Ok(Self {
            provider,
            client,
            base_url,
            path_template: path_template.to_string(),
            credentials_env,
            read_timeout_secs: http.read_timeout.as_secs(),
        })
    }

    /// Resolves the bearer token, failing fast when configured but absent.
    fn bearer_token(&self) -> Result<Option<String>, AppError> {
        match &self.credentials_env {
            None => Ok(None),
            Some(var) => match std::env::var(var) {
                Ok(token) if !token.is_empty() => Ok(Some(token)),
                _ => Err(AppError::MissingCredentials(self.provider.to_string())),
            },
        }
    }

    /// Builds the endpoint URL with the company identifier substituted
    /// verbatim into the path template.
    pub fn endpoint_url(&self, company_ref: &str) -> Result<Url, AppError> {
        let path = self.path_template.replace("{company_ref}", company_ref);
        self.base_url
            .join(&path)
            .map_err(|e| AppError::InvalidUrl(format!("{}: {}", self.path_template, e)))
    }

    /// The canonical provider name this requester serves.
    pub fn provider(&self) -> &'static str {
        self.provider
    }
}

impl Requester for ProviderHttp {
    async fn fetch(&self, company_ref: &str) -> Result<RawResponse, AppError> {
        let token = self.bearer_token()?;
        let url = self.endpoint_url(company_ref)?;

        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.read_timeout_secs))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(e, self.read_timeout_secs))?;

        if !(200..300).contains(&status) {
            return Err(AppError::HttpStatus { status, body });
        }

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
