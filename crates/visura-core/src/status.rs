//! Fetch-status and webhook sync-status state machines.

use serde::{Deserialize, Serialize};

// =============================================================================
// Per-provider fetch status
// =============================================================================

/// Progress of one provider's fetch on one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// No job has started yet.
    Pending,
    /// A job is currently running the pipeline.
    Processing,
    /// Pipeline succeeded; fields were filled.
    Completed,
    /// Pipeline failed terminally; fields were degraded to manual entry.
    Failed,
}

impl FetchStatus {
    /// Returns the string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Pending => "pending",
            FetchStatus::Processing => "processing",
            FetchStatus::Completed => "completed",
            FetchStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FetchStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FetchStatus::Pending),
            "processing" => Ok(FetchStatus::Processing),
            "completed" => Ok(FetchStatus::Completed),
            "failed" => Ok(FetchStatus::Failed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// One entry of the per-application fetch-status map, keyed by provider.
///
/// Mutated only by the job orchestrating that provider's pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFetchState {
    pub status: FetchStatus,
    /// Number of fields filled by the last successful run.
    pub fields_filled: usize,
}

impl ProviderFetchState {
    pub fn pending() -> Self {
        Self {
            status: FetchStatus::Pending,
            fields_filled: 0,
        }
    }

    pub fn processing() -> Self {
        Self {
            status: FetchStatus::Processing,
            fields_filled: 0,
        }
    }

    pub fn completed(fields_filled: usize) -> Self {
        Self {
            status: FetchStatus::Completed,
            fields_filled,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: FetchStatus::Failed,
            fields_filled: 0,
        }
    }
}

// =============================================================================
// Webhook sync status
// =============================================================================

/// Webhook-delivery progress for a completed application or market.
///
/// Transitions form a strict state machine:
///
/// ```text
/// pending → processing → completed
///               ↓
///            failed → pending   (operator or scheduled retry)
/// ```
///
/// `completed` is terminal; a delivery attempt against a completed entity
/// is an idempotent no-op and performs no HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SyncStatus {
    /// Returns the string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Processing => "processing",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }

    /// True if no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Completed)
    }

    /// Whether the state machine permits `self → to`.
    pub fn can_transition(&self, to: SyncStatus) -> bool {
        matches!(
            (self, to),
            (SyncStatus::Pending, SyncStatus::Processing)
                | (SyncStatus::Processing, SyncStatus::Completed)
                | (SyncStatus::Processing, SyncStatus::Failed)
                | (SyncStatus::Failed, SyncStatus::Pending)
        )
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "processing" => Ok(SyncStatus::Processing),
            "completed" => Ok(SyncStatus::Completed),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Error type for parsing a status from its storage string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(String);

impl std::fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid status: {}", self.0)
    }
}

impl std::error::Error for ParseStatusError {}
