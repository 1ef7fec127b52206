//! Document downloads with content validation.
//!
//! Downloaded payloads are untrusted binary data: before acceptance they
//! must satisfy a minimum byte-size threshold and a format-specific
//! magic-byte signature, regardless of the declared content-type header.
//! Filenames are generated deterministically from the company identifier
//! plus the reference's name hint.

use reqwest::Client;
use serde_json::json;

use visura_core::config::{DocumentConfig, HttpConfig};
use visura_core::error::AppError;
use visura_core::resource::{DocumentKind, DocumentPayload, DocumentRef};
use visura_core::traits::DocumentSource;

use crate::http::{build_client, classify_transport_error};

/// `%PDF-`
const PDF_SIGNATURE: &[u8] = b"%PDF-";
/// JPEG start-of-image marker.
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
/// PNG signature prefix.
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G'];

/// Validates payload bytes against the expected kind.
///
/// Returns the content type derived from the actual signature. The
/// declared content-type header plays no role here; only the bytes count.
pub fn validate_payload(
    bytes: &[u8],
    expected: DocumentKind,
    min_bytes: usize,
) -> Result<&'static str, AppError> {
    if bytes.len() < min_bytes {
        return Err(AppError::DocumentInvalid {
            reason: format!("payload is {} bytes, minimum is {}", bytes.len(), min_bytes),
        });
    }

    match expected {
        DocumentKind::Pdf => {
            if bytes.starts_with(PDF_SIGNATURE) {
                Ok("application/pdf")
            } else {
                Err(AppError::DocumentInvalid {
                    reason: "missing %PDF- signature".to_string(),
                })
            }
        }
        DocumentKind::Image => {
            if bytes.starts_with(JPEG_SIGNATURE) {
                Ok("image/jpeg")
            } else if bytes.starts_with(PNG_SIGNATURE) {
                Ok("image/png")
            } else {
                Err(AppError::DocumentInvalid {
                    reason: "missing JPEG or PNG signature".to_string(),
                })
            }
        }
    }
}

/// File extension for a validated content type.
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "application/pdf" => "pdf",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        _ => "bin",
    }
}

/// Normalizes a name hint into a filename fragment.
fn slugify(hint: &str) -> String {
    let mut slug: String = hint
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    slug.trim_matches('-').to_string()
}

/// Deterministic filename from the company identifier and reference.
pub fn document_filename(company_ref: &str, reference: &DocumentRef, content_type: &str) -> String {
    let fragment = reference
        .name_hint
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&reference.id));
    format!(
        "{}-{}.{}",
        slugify(company_ref),
        fragment,
        extension_for(content_type)
    )
}

/// HTTP-backed [`DocumentSource`] for one provider.
#[derive(Clone)]
pub struct HttpDocumentSource {
    provider: &'static str,
    client: Client,
    credentials_env: Option<String>,
    limits: DocumentConfig,
    read_timeout_secs: u64,
}

impl HttpDocumentSource {
    /// Creates a document source with the provider's timeouts and limits.
    pub fn new(
        provider: &'static str,
        credentials_env: Option<String>,
        http: HttpConfig,
        limits: DocumentConfig,
    ) -> Result<Self, AppError> {
        Ok(Self {
            provider,
            client: build_client(http)?,
            credentials_env,
            limits,
            read_timeout_secs: http.read_timeout.as_secs(),
        })
    }

    fn bearer_token(&self) -> Result<Option<String>, AppError> {
        match &self.credentials_env {
            None => Ok(None),
            Some(var) => match std::env::var(var) {
                Ok(token) if !token.is_empty() => Ok(Some(token)),
                _ => Err(AppError::MissingCredentials(self.provider.to_string())),
            },
        }
    }
}

impl DocumentSource for HttpDocumentSource {
    async fn download(
        &self,
        reference: &DocumentRef,
        company_ref: &str,
    ) -> Result<DocumentPayload, AppError> {
        let token = self.bearer_token()?;

        let mut request = self.client.get(&reference.url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.read_timeout_secs))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::HttpStatus { status, body });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(e, self.read_timeout_secs))?
            .to_vec();

        let content_type = validate_payload(&bytes, reference.expected, self.limits.min_bytes)?;
        let filename = document_filename(company_ref, reference, content_type);

        tracing::debug!(
            provider = self.provider,
            filename = %filename,
            size = bytes.len(),
            "Document validated"
        );

        Ok(DocumentPayload {
            bytes,
            filename,
            content_type: content_type.to_string(),
            metadata: json!({
                "provider": self.provider,
                "source_url": reference.url,
                "name": reference.name_hint,
            }),
        })
    }
}
