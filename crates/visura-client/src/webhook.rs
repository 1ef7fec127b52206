//! Reqwest-backed webhook transport.

use reqwest::Client;

use visura_core::config::WebhookConfig;
use visura_core::error::AppError;
use visura_core::traits::{TransportResponse, WebhookTransport};
use visura_core::webhook::SIGNATURE_HEADER;
use visura_core::HttpConfig;

use crate::http::{build_client, classify_transport_error};

/// HTTP transport for outbound webhook deliveries.
///
/// Returns a [`TransportResponse`] for any completed exchange regardless
/// of status code; the delivery service owns the 2xx decision and the
/// sync-status transitions.
#[derive(Clone)]
pub struct ReqwestWebhookTransport {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestWebhookTransport {
    /// Creates a transport with the configured delivery timeout.
    pub fn new(config: &WebhookConfig) -> Result<Self, AppError> {
        let timeout = config.timeout();
        let client = build_client(HttpConfig {
            read_timeout: timeout,
            connect_timeout: std::cmp::min(timeout, HttpConfig::default().connect_timeout),
        })?;
        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

impl WebhookTransport for ReqwestWebhookTransport {
    async fn post(
        &self,
        endpoint: &str,
        body: &str,
        signature: &str,
    ) -> Result<TransportResponse, AppError> {
        let response = self
            .client
            .post(endpoint)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout_secs))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(TransportResponse { status, body })
    }
}
