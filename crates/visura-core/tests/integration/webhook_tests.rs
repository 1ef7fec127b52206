//! Webhook delivery and sync-status machine tests.

use chrono::Utc;
use uuid::Uuid;

use visura_core::config::WebhookConfig;
use visura_core::status::SyncStatus;
use visura_core::webhook::{DeliveryOutcome, FieldCounts, WebhookPayload, WebhookService};

use crate::integration::common::{CannedDelivery, MockStore, MockWebhookTransport};

/// Secret placed in the environment for signing tests.
const SECRET_ENV: &str = "VISURA_TEST_WEBHOOK_SECRET";

fn config() -> WebhookConfig {
    // Safe in tests: the variable is only read by this process.
    std::env::set_var(SECRET_ENV, "test-signing-secret");
    WebhookConfig {
        endpoint: "https://integrator.example/hooks".to_string(),
        secret_env: SECRET_ENV.to_string(),
        timeout_secs: 15,
    }
}

fn payload(application_id: Uuid) -> WebhookPayload {
    WebhookPayload::application_completed(
        application_id,
        "weekly-market-2026",
        Utc::now(),
        FieldCounts {
            total: 12,
            auto: 8,
            manual: 4,
        },
    )
}

#[tokio::test]
async fn test_successful_delivery_completes_sync() {
    let store = MockStore::new();
    let transport = MockWebhookTransport::new(vec![CannedDelivery::Status {
        status: 200,
        body: "ok".to_string(),
    }]);
    let service = WebhookService::new(store.clone(), transport.clone(), config());
    let application_id = Uuid::new_v4();

    let outcome = service
        .deliver(application_id, &payload(application_id))
        .await
        .unwrap();

    assert_eq!(outcome, DeliveryOutcome::Delivered);
    assert_eq!(store.sync(application_id), SyncStatus::Completed);
    assert_eq!(transport.requests(), 1);
}

/// Scenario D: a 503 answer transitions processing → failed; after a
/// reset, a successful delivery transitions failed → pending →
/// processing → completed; a call against the completed entity performs
/// no HTTP request.
#[tokio::test]
async fn test_failed_then_retried_then_idempotent() {
    let store = MockStore::new();
    let transport = MockWebhookTransport::new(vec![
        CannedDelivery::Status {
            status: 503,
            body: "service unavailable".to_string(),
        },
        CannedDelivery::Status {
            status: 200,
            body: "ok".to_string(),
        },
    ]);
    let service = WebhookService::new(store.clone(), transport.clone(), config());
    let application_id = Uuid::new_v4();

    // First attempt: 503.
    let outcome = service
        .deliver(application_id, &payload(application_id))
        .await
        .unwrap();
    match outcome {
        DeliveryOutcome::Failed(failure) => {
            assert_eq!(failure.status, Some(503));
            assert!(failure.retryable, "5xx must be retryable");
            assert!(failure.detail.contains("service unavailable"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(store.sync(application_id), SyncStatus::Failed);

    // Scheduled retry: reset, then deliver again.
    assert!(service.reset_for_retry(application_id).await.unwrap());
    let outcome = service
        .deliver(application_id, &payload(application_id))
        .await
        .unwrap();
    assert_eq!(outcome, DeliveryOutcome::Delivered);
    assert_eq!(store.sync(application_id), SyncStatus::Completed);
    assert_eq!(transport.requests(), 2);

    // Idempotent no-op against the completed entity.
    let outcome = service
        .deliver(application_id, &payload(application_id))
        .await
        .unwrap();
    assert_eq!(outcome, DeliveryOutcome::Skipped);
    assert_eq!(transport.requests(), 2, "no HTTP request may be made");
}

#[tokio::test]
async fn test_4xx_failure_is_not_retryable() {
    let store = MockStore::new();
    let transport = MockWebhookTransport::new(vec![CannedDelivery::Status {
        status: 422,
        body: "unknown application".to_string(),
    }]);
    let service = WebhookService::new(store.clone(), transport, config());
    let application_id = Uuid::new_v4();

    let outcome = service
        .deliver(application_id, &payload(application_id))
        .await
        .unwrap();

    match outcome {
        DeliveryOutcome::Failed(failure) => {
            assert_eq!(failure.status, Some(422));
            assert!(!failure.retryable, "4xx is left for manual retry");
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(store.sync(application_id), SyncStatus::Failed);
}

#[tokio::test]
async fn test_transport_timeout_is_retryable_failure() {
    let store = MockStore::new();
    let transport = MockWebhookTransport::new(vec![CannedDelivery::Timeout]);
    let service = WebhookService::new(store.clone(), transport, config());
    let application_id = Uuid::new_v4();

    let outcome = service
        .deliver(application_id, &payload(application_id))
        .await
        .unwrap();

    match outcome {
        DeliveryOutcome::Failed(failure) => {
            assert_eq!(failure.status, None);
            assert!(failure.retryable);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(store.sync(application_id), SyncStatus::Failed);
}

#[tokio::test]
async fn test_delivery_in_failed_state_requires_reset() {
    let store = MockStore::new();
    let transport = MockWebhookTransport::new(Vec::new());
    let service = WebhookService::new(store.clone(), transport.clone(), config());
    let application_id = Uuid::new_v4();
    store.set_sync(application_id, SyncStatus::Failed);

    let result = service
        .deliver(application_id, &payload(application_id))
        .await;

    assert!(result.is_err(), "failed entities must be reset first");
    assert_eq!(transport.requests(), 0);
    assert_eq!(store.sync(application_id), SyncStatus::Failed);
}

#[tokio::test]
async fn test_reset_only_applies_to_failed() {
    let store = MockStore::new();
    let transport = MockWebhookTransport::new(Vec::new());
    let service = WebhookService::new(store.clone(), transport, config());
    let application_id = Uuid::new_v4();

    // Pending entity: nothing to reset.
    assert!(!service.reset_for_retry(application_id).await.unwrap());
}
