//! Domain models for form fields and their persisted answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::resource::DocumentPayload;

/// Provenance of a persisted form-field answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Last written by a pipeline run.
    Auto,
    /// Entered by a human.
    Manual,
    /// The automatic source failed; human input is now required. Distinct
    /// from `Manual` so the UI can tell always-manual fields apart from
    /// degraded ones.
    ManualAfterApiFailure,
}

impl ResponseSource {
    /// Returns the string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Auto => "auto",
            ResponseSource::Manual => "manual",
            ResponseSource::ManualAfterApiFailure => "manual_after_api_failure",
        }
    }

    /// True for rows the pipeline is authoritative for. The rollback path
    /// must only ever clear rows of these sources, never a genuinely
    /// user-entered `Manual` answer.
    pub fn is_pipeline_owned(&self) -> bool {
        matches!(
            self,
            ResponseSource::Auto | ResponseSource::ManualAfterApiFailure
        )
    }
}

impl std::fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A form-field definition.
///
/// `api_name` + `api_key` identify which provider and which field within
/// that provider's resource supply the answer automatically. Manual-only
/// fields carry neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketAttribute {
    /// Stable field key, unique per market.
    pub key: String,
    /// Canonical provider name answering this field, if any.
    pub api_name: Option<String>,
    /// Field key within that provider's resource.
    pub api_key: Option<String>,
}

impl MarketAttribute {
    /// Creates a manual-only attribute.
    pub fn manual(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            api_name: None,
            api_key: None,
        }
    }

    /// Creates an API-supplied attribute.
    pub fn automatic(
        key: impl Into<String>,
        api_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            api_name: Some(api_name.into()),
            api_key: Some(api_key.into()),
        }
    }
}

/// One persisted answer for one field on one application.
///
/// Created lazily on first pipeline write or first user edit; never
/// hard-deleted, only value-cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAttributeResponse {
    pub application_id: Uuid,
    pub attribute_key: String,
    /// JSON-shaped per field type; `None` once cleared.
    pub value: Option<Value>,
    pub source: ResponseSource,
    pub documents: Vec<DocumentPayload>,
    pub updated_at: DateTime<Utc>,
}

/// A write against one response row, applied as an upsert keyed by
/// `(application, attribute_key)` so the latest write wins.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseWrite {
    pub value: Option<Value>,
    pub source: ResponseSource,
    pub documents: Vec<DocumentPayload>,
}

impl ResponseWrite {
    /// A cleared write: empties the value and documents.
    pub fn cleared(source: ResponseSource) -> Self {
        Self {
            value: None,
            source,
            documents: Vec::new(),
        }
    }
}
