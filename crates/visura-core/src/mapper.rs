//! Data mapper: writes resource fields into persisted form-field responses.
//!
//! The mapper is the only pipeline stage that touches the store. Writes
//! are idempotent upserts keyed by `(application, attribute_key)`; the
//! rollback path only ever clears rows the pipeline is authoritative for
//! (`auto` or `manual_after_api_failure`), never a genuinely user-entered
//! `manual` answer.

use uuid::Uuid;

use crate::error::{AppError, ErrorKind};
use crate::models::{MarketAttribute, ResponseSource, ResponseWrite};
use crate::resource::{BundledData, ProviderRecord};
use crate::traits::ResponseStore;

/// Writes `Resource` fields into `MarketAttributeResponse` rows.
#[derive(Debug, Clone)]
pub struct DataMapper<S: ResponseStore> {
    store: S,
}

fn original_kind(error: &AppError) -> &'static str {
    match error.kind() {
        ErrorKind::Transport => "transport",
        ErrorKind::UpstreamServer => "upstream_server",
        ErrorKind::UpstreamClient => "upstream_client",
        ErrorKind::Credential => "credential",
        ErrorKind::Contract => "contract",
        ErrorKind::Document => "document",
        ErrorKind::Mapping => "mapping",
        ErrorKind::Store => "store",
        ErrorKind::Other => "other",
    }
}

impl<S: ResponseStore> DataMapper<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Applies one provider's bundle to the application's form fields.
    ///
    /// For each attribute declaring this provider as its `api_name`:
    ///
    /// - extracted value present: upsert with `source=auto` (and attach
    ///   any documents the value carries);
    /// - extracted value absent, no row exists: skip — an absent API
    ///   answer for a never-seen field must not manufacture an empty
    ///   "auto" answer;
    /// - extracted value absent, row exists: clear the row's value. This
    ///   is how a provider retracting data clears a stale auto-filled
    ///   value instead of leaving outdated information.
    ///
    /// Returns the number of fields written with a value.
    ///
    /// Any unexpected per-field error is wrapped with the provider name,
    /// the field key and the original error's kind, so operators can
    /// distinguish data-shape drift from code bugs.
    pub async fn apply(
        &self,
        application_id: Uuid,
        bundled: &BundledData,
    ) -> Result<usize, AppError> {
        let provider = bundled.resource.provider();
        let attributes = self.store.attributes_for_provider(provider).await?;
        let mut fields_filled = 0;

        for attribute in &attributes {
            fields_filled += self
                .apply_attribute(application_id, bundled, attribute)
                .await
                .map_err(|e| wrap(provider, &attribute.key, e))?;
        }

        Ok(fields_filled)
    }

    async fn apply_attribute(
        &self,
        application_id: Uuid,
        bundled: &BundledData,
        attribute: &MarketAttribute,
    ) -> Result<usize, AppError> {
        let api_key = attribute.api_key.as_deref().ok_or_else(|| {
            AppError::Generic("attribute declares an api_name but no api_key".to_string())
        })?;

        let extracted = bundled.resource.field(api_key);
        let existing = self
            .store
            .find_response(application_id, &attribute.key)
            .await?;

        match (existing, extracted) {
            (None, None) => Ok(0),
            (Some(_), None) => {
                self.store
                    .upsert_response(
                        application_id,
                        &attribute.key,
                        ResponseWrite::cleared(ResponseSource::Auto),
                    )
                    .await?;
                Ok(0)
            }
            (_, Some(value)) => {
                self.store
                    .upsert_response(
                        application_id,
                        &attribute.key,
                        ResponseWrite {
                            value: value.to_json(),
                            source: ResponseSource::Auto,
                            documents: value.documents(),
                        },
                    )
                    .await?;
                Ok(1)
            }
        }
    }

    /// Rolls back partial automatic answers after a failed pipeline run.
    ///
    /// Clears any pipeline-owned value/documents previously written for
    /// this provider's fields and transitions every field the provider is
    /// responsible for into `manual_after_api_failure`, creating the row
    /// if necessary, so the UI can prompt the human for input. Rows with
    /// `source=manual` are left untouched.
    ///
    /// Safe to re-run: a second rollback finds the rows already degraded
    /// and rewrites them identically.
    ///
    /// Returns the number of fields transitioned.
    pub async fn rollback(&self, application_id: Uuid, provider: &str) -> Result<usize, AppError> {
        let attributes = self.store.attributes_for_provider(provider).await?;
        let mut degraded = 0;

        for attribute in &attributes {
            let existing = self
                .store
                .find_response(application_id, &attribute.key)
                .await?;

            if let Some(row) = &existing {
                if !row.source.is_pipeline_owned() {
                    continue;
                }
            }

            self.store
                .upsert_response(
                    application_id,
                    &attribute.key,
                    ResponseWrite::cleared(ResponseSource::ManualAfterApiFailure),
                )
                .await?;
            degraded += 1;
        }

        tracing::info!(
            provider,
            %application_id,
            degraded,
            "Rolled back automatic answers to manual entry"
        );

        Ok(degraded)
    }
}

fn wrap(provider: &str, field: &str, error: AppError) -> AppError {
    // Mapping errors already carry their context.
    if matches!(error, AppError::MappingError { .. }) {
        return error;
    }
    AppError::MappingError {
        provider: provider.to_string(),
        field: field.to_string(),
        kind: original_kind(&error),
        detail: error.to_string(),
    }
}
