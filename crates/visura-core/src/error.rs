use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents all failure modes of the aggregation pipeline and
/// its surrounding jobs. It uses the `thiserror` crate for ergonomic error
/// handling and automatic conversion from underlying library errors.
///
/// # Taxonomy
///
/// Errors fall into five families (see [`ErrorKind`]):
///
/// 1. Transport (timeout, refused/reset, DNS, TLS) — retryable with backoff
/// 2. Credential/configuration — fatal immediately, never retried
/// 3. Provider contract violation (malformed or unexpected JSON shape) —
///    fatal, flagged as a provider-side anomaly
/// 4. Document content invalid (too small, wrong signature) — fatal for
///    all-or-nothing providers, skip-and-continue for best-effort ones
/// 5. Mapping error (internal shape mismatch) — fatal, indicates a
///    code/schema bug needing engineering attention
#[derive(Error, Debug)]
pub enum AppError {
    /// Request timed out against a provider or document host.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network-level failure: connection refused/reset, DNS resolution,
    /// socket errors.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// TLS negotiation failure.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// Provider answered with a non-2xx HTTP status.
    ///
    /// Carries the status code and response body for diagnostics. The body
    /// is never shown to end users (see [`AppError::user_message`]).
    #[error("HTTP {status} from provider")]
    HttpStatus { status: u16, body: String },

    /// Provider credentials are not configured.
    ///
    /// Validated before the request is made; this must not be retried.
    #[error("Missing credentials for provider '{0}'")]
    MissingCredentials(String),

    /// The provider response violated its own contract: malformed JSON or
    /// a body missing the expected top-level key.
    ///
    /// This is a provider-side anomaly, not a transient fault, and is
    /// never retried.
    #[error("Contract violation from provider '{provider}': {detail}")]
    ContractViolation { provider: String, detail: String },

    /// A downloaded document failed content validation (below the minimum
    /// size or missing the expected magic-byte signature).
    #[error("Invalid document content: {reason}")]
    DocumentInvalid { reason: String },

    /// Writing an extracted value into a form-field response failed due to
    /// an internal shape mismatch.
    ///
    /// Carries the provider, the field key, and the original error kind so
    /// operators can distinguish data-shape drift from code bugs.
    #[error("Mapping error for provider '{provider}', field '{field}' ({kind}): {detail}")]
    MappingError {
        provider: String,
        field: String,
        kind: &'static str,
        detail: String,
    },

    /// A store operation (response row, fetch status, job queue) failed.
    #[error("Store error: {0}")]
    StoreError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL construction or parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration file or environment error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    ///
    /// Use this sparingly - prefer creating specific error variants
    /// for better error handling and debugging.
    #[error("Error: {0}")]
    Generic(String),
}

/// Coarse error classification used by the retry policy.
///
/// Decouples retry decisions from the concrete error variants: callers ask
/// [`is_retryable`] with a kind instead of matching on `AppError` shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeouts, connection refused/reset, DNS and socket errors.
    Transport,
    /// Provider answered with a server-side (5xx) status.
    UpstreamServer,
    /// Provider answered with a client-side (4xx) status.
    UpstreamClient,
    /// Credentials or configuration missing/invalid.
    Credential,
    /// Provider broke its response contract.
    Contract,
    /// Document content failed validation.
    Document,
    /// Internal shape mismatch while mapping.
    Mapping,
    /// Persistence-layer failure.
    Store,
    /// Everything else.
    Other,
}

/// Returns true if errors of this kind are worth retrying with backoff.
///
/// Transport faults and upstream server errors are transient; everything
/// else is fatal on first occurrence.
///
/// # Examples
///
/// ```
/// use visura_core::error::{is_retryable, ErrorKind};
///
/// assert!(is_retryable(ErrorKind::Transport));
/// assert!(is_retryable(ErrorKind::UpstreamServer));
/// assert!(!is_retryable(ErrorKind::Credential));
/// assert!(!is_retryable(ErrorKind::Contract));
/// ```
pub fn is_retryable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Transport | ErrorKind::UpstreamServer)
}

impl AppError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Timeout(_) | AppError::NetworkError(_) | AppError::TlsError(_) => {
                ErrorKind::Transport
            }
            AppError::HttpStatus { status, .. } if *status >= 500 => ErrorKind::UpstreamServer,
            AppError::HttpStatus { .. } => ErrorKind::UpstreamClient,
            AppError::MissingCredentials(_) | AppError::ConfigError(_) => ErrorKind::Credential,
            AppError::ContractViolation { .. } => ErrorKind::Contract,
            AppError::DocumentInvalid { .. } => ErrorKind::Document,
            AppError::MappingError { .. } => ErrorKind::Mapping,
            AppError::StoreError(_) => ErrorKind::Store,
            AppError::SerializationError(_) | AppError::InvalidUrl(_) | AppError::Generic(_) => {
                ErrorKind::Other
            }
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Delegates to the free [`is_retryable`] predicate over [`ErrorKind`].
    ///
    /// # Examples
    ///
    /// ```
    /// use visura_core::error::AppError;
    ///
    /// assert!(AppError::Timeout(30).is_retryable());
    /// assert!(AppError::HttpStatus { status: 503, body: String::new() }.is_retryable());
    /// assert!(!AppError::HttpStatus { status: 404, body: String::new() }.is_retryable());
    /// assert!(!AppError::MissingCredentials("tax_registry".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        is_retryable(self.kind())
    }

    /// Returns a user-facing message that never leaks raw provider output.
    ///
    /// On any fatal pipeline outcome the affected fields revert to a
    /// "please complete manually" state; this message is what the
    /// surrounding application may show alongside it.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Transport | ErrorKind::UpstreamServer => {
                "The registry could not be reached. Please confirm the details manually."
                    .to_string()
            }
            ErrorKind::UpstreamClient => {
                "The registry did not recognize the request. Please complete the fields manually."
                    .to_string()
            }
            ErrorKind::Credential => {
                "Automatic retrieval is not configured for this registry. Please enter the details manually."
                    .to_string()
            }
            ErrorKind::Contract | ErrorKind::Document | ErrorKind::Mapping => {
                "The registry answer could not be processed. Please confirm the details manually."
                    .to_string()
            }
            ErrorKind::Store | ErrorKind::Other => {
                "Something went wrong while saving the answer. Please try again.".to_string()
            }
        }
    }
}
