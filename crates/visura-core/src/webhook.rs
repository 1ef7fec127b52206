//! Webhook delivery with a strict sync-status state machine.
//!
//! "Application completed" events are synchronized to the integrating
//! system via an outbound HTTP POST. The entity's [`SyncStatus`] guards
//! every delivery attempt:
//!
//! - already `completed`: idempotent no-op, no HTTP request is made;
//! - before sending: `pending → processing` (atomically, so concurrent
//!   attempts cannot double-send);
//! - HTTP 2xx: `processing → completed`;
//! - anything else: `processing → failed`, recording the status code and
//!   raw response body for diagnostics.
//!
//! `failed` is not terminal: an operator or a scheduled retry job calls
//! [`WebhookService::reset_for_retry`] to re-enter `pending`. Whether
//! that happens automatically depends on the failure classification:
//! 5xx and transport failures are retryable, 4xx is left for manual
//! retry.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::error::AppError;
use crate::status::SyncStatus;
use crate::traits::{ApplicationStore, WebhookTransport};

type HmacSha256 = Hmac<Sha256>;

/// Signature header name on outbound deliveries.
pub const SIGNATURE_HEADER: &str = "X-Visura-Signature";

// =============================================================================
// Payload
// =============================================================================

/// Field-count summary included in the completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldCounts {
    pub total: usize,
    pub auto: usize,
    pub manual: usize,
}

/// JSON payload of the "application completed" event.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub event: &'static str,
    pub application_id: Uuid,
    pub market: String,
    pub completed_at: DateTime<Utc>,
    pub fields: FieldCounts,
}

impl WebhookPayload {
    /// Builds a completion event payload.
    pub fn application_completed(
        application_id: Uuid,
        market: impl Into<String>,
        completed_at: DateTime<Utc>,
        fields: FieldCounts,
    ) -> Self {
        Self {
            event: "application.completed",
            application_id,
            market: market.into(),
            completed_at,
            fields,
        }
    }
}

// =============================================================================
// Signing
// =============================================================================

/// Computes the hex-encoded HMAC-SHA256 signature of a payload body.
///
/// The per-integrator secret comes from configuration; the receiving
/// system recomputes the same MAC to authenticate the delivery.
pub fn sign_payload(secret: &str, body: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::ConfigError(format!("invalid webhook secret: {}", e)))?;
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

// =============================================================================
// Outcomes
// =============================================================================

/// Diagnostics captured from a failed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    /// HTTP status, if the exchange completed.
    pub status: Option<u16>,
    /// Raw response body or transport error description.
    pub detail: String,
    /// True for 5xx and transport failures; false for 4xx, which is left
    /// for manual retry.
    pub retryable: bool,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The entity was already completed; no HTTP request was made.
    Skipped,
    /// Delivered; sync status is now `completed`.
    Delivered,
    /// Delivery failed; sync status is now `failed`.
    Failed(DeliveryFailure),
}

// =============================================================================
// Service
// =============================================================================

/// Delivers completion events and advances the sync-status machine.
///
/// # Type Parameters
///
/// * `A` - Application store holding the sync status
/// * `T` - Outbound HTTP transport
pub struct WebhookService<A, T>
where
    A: ApplicationStore,
    T: WebhookTransport,
{
    store: A,
    transport: T,
    config: WebhookConfig,
}

impl<A, T> WebhookService<A, T>
where
    A: ApplicationStore,
    T: WebhookTransport,
{
    pub fn new(store: A, transport: T, config: WebhookConfig) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    /// Attempts one delivery of the given payload.
    ///
    /// Returns `Err` only for configuration and store failures; a failed
    /// HTTP exchange is an `Ok(DeliveryOutcome::Failed)` with diagnostics,
    /// since the state machine has already recorded it.
    pub async fn deliver(
        &self,
        application_id: Uuid,
        payload: &WebhookPayload,
    ) -> Result<DeliveryOutcome, AppError> {
        let current = self.store.sync_status(application_id).await?;
        if current == SyncStatus::Completed {
            tracing::debug!(%application_id, "Sync already completed, skipping delivery");
            return Ok(DeliveryOutcome::Skipped);
        }

        // Atomic guard: only one attempt may move pending → processing.
        let claimed = self
            .store
            .transition_sync_status(application_id, SyncStatus::Pending, SyncStatus::Processing)
            .await?;
        if !claimed {
            let status = self.store.sync_status(application_id).await?;
            return Err(AppError::Generic(format!(
                "cannot deliver webhook for {} in sync status '{}'",
                application_id, status
            )));
        }

        let body = serde_json::to_string(payload)?;
        let secret = self.config.secret()?;
        let signature = sign_payload(&secret, &body)?;

        let attempt = self
            .transport
            .post(&self.config.endpoint, &body, &signature)
            .await;

        match attempt {
            Ok(response) if (200..300).contains(&response.status) => {
                self.store
                    .transition_sync_status(
                        application_id,
                        SyncStatus::Processing,
                        SyncStatus::Completed,
                    )
                    .await?;
                tracing::info!(%application_id, status = response.status, "Webhook delivered");
                Ok(DeliveryOutcome::Delivered)
            }
            Ok(response) => {
                let failure = DeliveryFailure {
                    status: Some(response.status),
                    detail: response.body,
                    retryable: response.status >= 500,
                };
                self.record_failure(application_id, &failure).await?;
                Ok(DeliveryOutcome::Failed(failure))
            }
            Err(e) => {
                let failure = DeliveryFailure {
                    status: None,
                    detail: e.to_string(),
                    retryable: e.is_retryable(),
                };
                self.record_failure(application_id, &failure).await?;
                Ok(DeliveryOutcome::Failed(failure))
            }
        }
    }

    async fn record_failure(
        &self,
        application_id: Uuid,
        failure: &DeliveryFailure,
    ) -> Result<(), AppError> {
        self.store
            .transition_sync_status(application_id, SyncStatus::Processing, SyncStatus::Failed)
            .await?;
        tracing::warn!(
            %application_id,
            status = ?failure.status,
            detail = %failure.detail,
            retryable = failure.retryable,
            "Webhook delivery failed"
        );
        Ok(())
    }

    /// Re-enters `pending` from `failed` so a later delivery can run.
    ///
    /// Used by both the scheduled retry job (for retryable failures) and
    /// the operator path (for manual retries). Returns `false` when the
    /// entity is not in `failed`.
    pub async fn reset_for_retry(&self, application_id: Uuid) -> Result<bool, AppError> {
        self.store
            .transition_sync_status(application_id, SyncStatus::Failed, SyncStatus::Pending)
            .await
    }
}
