//! Normalized provider results.
//!
//! Each provider parses its idiosyncratic response into a strongly typed
//! record. The records form the [`Resource`] tagged union, and all of them
//! implement [`ProviderRecord`]: a uniform capability for field lookup by
//! `api_key`, document-reference enumeration, and in-place attachment of
//! downloaded document payloads.
//!
//! A [`Resource`] is built once per pipeline run and is immutable after
//! construction, except that the document-fetch stage replaces
//! [`DocumentSlot::Reference`] entries with [`DocumentSlot::Fetched`]
//! payloads in place.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// =============================================================================
// Documents
// =============================================================================

/// Expected binary format of a referenced document.
///
/// Drives the magic-byte signature check during download validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// `%PDF-` signature.
    Pdf,
    /// JPEG (`\xFF\xD8\xFF`) or PNG (`\x89PNG`) signature.
    Image,
}

/// A reference to a document that has not been downloaded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Slot identifier, unique within one resource. Used to attach the
    /// downloaded payload back into the right place.
    pub id: String,
    /// Download URL as returned by the provider.
    pub url: String,
    /// Human-readable name fragment (certificate name, index) used when
    /// generating the deterministic filename.
    pub name_hint: Option<String>,
    /// Expected binary format.
    pub expected: DocumentKind,
}

/// A downloaded and validated document payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPayload {
    /// Raw document bytes.
    pub bytes: Vec<u8>,
    /// Deterministic filename derived from the company identifier (plus a
    /// certificate name or index for multi-document providers).
    pub filename: String,
    /// Content type of the validated payload.
    pub content_type: String,
    /// Side-channel metadata (originating provider, certificate name, ...).
    pub metadata: Value,
}

impl DocumentPayload {
    /// Tags this payload with its originating provider.
    ///
    /// Used by the multi-source merge so downstream consumers can tell
    /// which registry produced which document.
    pub fn tagged_with_provider(mut self, provider: &str) -> Self {
        if let Value::Object(map) = &mut self.metadata {
            map.insert("provider".to_string(), Value::String(provider.to_string()));
        } else {
            self.metadata = json!({ "provider": provider });
        }
        self
    }
}

/// A document slot inside a provider record.
///
/// Starts as a [`DocumentSlot::Reference`] when the resource is built and
/// is replaced in place by [`DocumentSlot::Fetched`] once the download
/// stage has validated the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentSlot {
    Reference(DocumentRef),
    Fetched(DocumentPayload),
}

impl DocumentSlot {
    /// Returns the payload if this slot has been fetched.
    pub fn payload(&self) -> Option<&DocumentPayload> {
        match self {
            DocumentSlot::Fetched(payload) => Some(payload),
            DocumentSlot::Reference(_) => None,
        }
    }

    /// Returns the unfetched reference, if any.
    pub fn reference(&self) -> Option<&DocumentRef> {
        match self {
            DocumentSlot::Reference(reference) => Some(reference),
            DocumentSlot::Fetched(_) => None,
        }
    }
}

// =============================================================================
// Field values
// =============================================================================

/// A value extracted from a provider record for one form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Plain scalar (string, number, boolean, date rendered as string).
    Scalar(Value),
    /// Radio-choice-with-justification shape.
    Choice {
        radio_choice: String,
        text: Option<String>,
    },
    /// A single attached document.
    Document(DocumentPayload),
    /// Multiple attached documents (certificate lists, merged sources).
    Documents(Vec<DocumentPayload>),
}

impl FieldValue {
    /// Renders the value part for persistence (documents are attached
    /// separately and have no JSON value of their own).
    pub fn to_json(&self) -> Option<Value> {
        match self {
            FieldValue::Scalar(value) => Some(value.clone()),
            FieldValue::Choice { radio_choice, text } => Some(json!({
                "radio_choice": radio_choice,
                "text": text,
            })),
            FieldValue::Document(_) | FieldValue::Documents(_) => None,
        }
    }

    /// Returns the documents carried by this value, if any.
    pub fn documents(&self) -> Vec<DocumentPayload> {
        match self {
            FieldValue::Document(payload) => vec![payload.clone()],
            FieldValue::Documents(payloads) => payloads.clone(),
            _ => Vec::new(),
        }
    }
}

// =============================================================================
// Provider records
// =============================================================================

/// Uniform capability over provider-specific result records.
///
/// Each provider defines its own shape; this trait is what the pipeline,
/// the document-fetch stage and the data mapper program against.
pub trait ProviderRecord {
    /// Canonical provider name (doubles as the status-map key).
    fn provider(&self) -> &'static str;

    /// Looks up the value for a form field by its `api_key`.
    ///
    /// Returns `None` when the provider has no answer for this field; the
    /// mapper decides what an absent answer means (see `DataMapper`).
    fn field(&self, api_key: &str) -> Option<FieldValue>;

    /// Enumerates document references that still need downloading.
    fn document_refs(&self) -> Vec<DocumentRef>;

    /// Replaces the referenced slot with a fetched payload, in place.
    fn attach_document(&mut self, ref_id: &str, payload: DocumentPayload);
}

fn attach_into(slot: &mut DocumentSlot, ref_id: &str, payload: &DocumentPayload) {
    if slot.reference().is_some_and(|r| r.id == ref_id) {
        *slot = DocumentSlot::Fetched(payload.clone());
    }
}

/// Tax clearance certificate from the tax registry.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxClearance {
    pub clearance: Option<DocumentSlot>,
    pub issued_on: Option<NaiveDate>,
    pub tax_office: Option<String>,
}

impl ProviderRecord for TaxClearance {
    fn provider(&self) -> &'static str {
        "tax_registry"
    }

    fn field(&self, api_key: &str) -> Option<FieldValue> {
        match api_key {
            "tax_clearance_document" => self
                .clearance
                .as_ref()
                .and_then(DocumentSlot::payload)
                .cloned()
                .map(FieldValue::Document),
            "tax_clearance_issued_on" => self
                .issued_on
                .map(|d| FieldValue::Scalar(Value::String(d.to_string()))),
            "tax_office" => self
                .tax_office
                .clone()
                .map(|o| FieldValue::Scalar(Value::String(o))),
            _ => None,
        }
    }

    fn document_refs(&self) -> Vec<DocumentRef> {
        self.clearance
            .iter()
            .filter_map(DocumentSlot::reference)
            .cloned()
            .collect()
    }

    fn attach_document(&mut self, ref_id: &str, payload: DocumentPayload) {
        if let Some(slot) = self.clearance.as_mut() {
            attach_into(slot, ref_id, &payload);
        }
    }
}

/// Social-security clearance certificate from the social-security fund.
#[derive(Debug, Clone, PartialEq)]
pub struct SocialSecurityClearance {
    pub certificate: Option<DocumentSlot>,
    pub debt_free: Option<bool>,
}

impl ProviderRecord for SocialSecurityClearance {
    fn provider(&self) -> &'static str {
        "social_security"
    }

    fn field(&self, api_key: &str) -> Option<FieldValue> {
        match api_key {
            "social_security_document" => self
                .certificate
                .as_ref()
                .and_then(DocumentSlot::payload)
                .cloned()
                .map(FieldValue::Document),
            "social_security_debt_free" => {
                self.debt_free.map(|b| FieldValue::Scalar(Value::Bool(b)))
            }
            _ => None,
        }
    }

    fn document_refs(&self) -> Vec<DocumentRef> {
        self.certificate
            .iter()
            .filter_map(DocumentSlot::reference)
            .cloned()
            .collect()
    }

    fn attach_document(&mut self, ref_id: &str, payload: DocumentPayload) {
        if let Some(slot) = self.certificate.as_mut() {
            attach_into(slot, ref_id, &payload);
        }
    }
}

/// Company master data from the commercial register.
///
/// Carries no documents; purely scalar and choice fields. Insolvency and
/// liquidation markers additionally surface as a `legal_risk` context flag
/// on the bundle (see [`BundledData`]).
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyProfile {
    pub legal_name: Option<String>,
    pub legal_form: Option<String>,
    pub registration_number: Option<String>,
    pub seat: Option<String>,
    pub founded_on: Option<NaiveDate>,
    pub insolvency_proceedings: bool,
    pub insolvency_details: Option<String>,
    pub in_liquidation: bool,
}

impl CompanyProfile {
    /// True if any legal-risk marker is set.
    pub fn has_legal_risk(&self) -> bool {
        self.insolvency_proceedings || self.in_liquidation
    }
}

impl ProviderRecord for CompanyProfile {
    fn provider(&self) -> &'static str {
        "company_register"
    }

    fn field(&self, api_key: &str) -> Option<FieldValue> {
        let scalar = |s: &Option<String>| {
            s.clone().map(|v| FieldValue::Scalar(Value::String(v)))
        };
        match api_key {
            "legal_name" => scalar(&self.legal_name),
            "legal_form" => scalar(&self.legal_form),
            "registration_number" => scalar(&self.registration_number),
            "seat" => scalar(&self.seat),
            "founded_on" => self
                .founded_on
                .map(|d| FieldValue::Scalar(Value::String(d.to_string()))),
            "insolvency_status" => Some(FieldValue::Choice {
                radio_choice: if self.insolvency_proceedings {
                    "yes".to_string()
                } else {
                    "no".to_string()
                },
                text: self.insolvency_details.clone(),
            }),
            _ => None,
        }
    }

    fn document_refs(&self) -> Vec<DocumentRef> {
        Vec::new()
    }

    fn attach_document(&mut self, _ref_id: &str, _payload: DocumentPayload) {}
}

/// One named certificate slot in a professional-certification answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateSlot {
    pub name: String,
    pub slot: DocumentSlot,
}

/// Professional certificates from the certification body.
///
/// The registry may answer with zero certificates; that is a valid empty
/// result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfessionalCertificates {
    pub certificates: Vec<CertificateSlot>,
}

impl ProviderRecord for ProfessionalCertificates {
    fn provider(&self) -> &'static str {
        "professional_certs"
    }

    fn field(&self, api_key: &str) -> Option<FieldValue> {
        match api_key {
            "professional_certificates" => {
                let fetched: Vec<DocumentPayload> = self
                    .certificates
                    .iter()
                    .filter_map(|c| c.slot.payload())
                    .cloned()
                    .collect();
                if fetched.is_empty() {
                    None
                } else {
                    Some(FieldValue::Documents(fetched))
                }
            }
            "professional_certificate_names" => {
                if self.certificates.is_empty() {
                    None
                } else {
                    Some(FieldValue::Scalar(Value::Array(
                        self.certificates
                            .iter()
                            .map(|c| Value::String(c.name.clone()))
                            .collect(),
                    )))
                }
            }
            _ => None,
        }
    }

    fn document_refs(&self) -> Vec<DocumentRef> {
        self.certificates
            .iter()
            .filter_map(|c| c.slot.reference())
            .cloned()
            .collect()
    }

    fn attach_document(&mut self, ref_id: &str, payload: DocumentPayload) {
        for cert in &mut self.certificates {
            attach_into(&mut cert.slot, ref_id, &payload);
        }
    }
}

/// Contribution proof from a single retirement fund.
///
/// Both registries answering the retirement question produce this shape;
/// `provider` distinguishes them. The fund may answer without a document
/// (company not a member), which is a valid empty result.
#[derive(Debug, Clone, PartialEq)]
pub struct RetirementStatement {
    pub provider: &'static str,
    pub proof: Option<DocumentSlot>,
}

impl ProviderRecord for RetirementStatement {
    fn provider(&self) -> &'static str {
        self.provider
    }

    fn field(&self, api_key: &str) -> Option<FieldValue> {
        match api_key {
            "retirement_contribution_document" => self
                .proof
                .as_ref()
                .and_then(DocumentSlot::payload)
                .cloned()
                .map(FieldValue::Document),
            _ => None,
        }
    }

    fn document_refs(&self) -> Vec<DocumentRef> {
        self.proof
            .iter()
            .filter_map(DocumentSlot::reference)
            .cloned()
            .collect()
    }

    fn attach_document(&mut self, ref_id: &str, payload: DocumentPayload) {
        if let Some(slot) = self.proof.as_mut() {
            attach_into(slot, ref_id, &payload);
        }
    }
}

/// Merged retirement-contribution proof.
///
/// Produced by the multi-source merge over the state and industry
/// retirement funds; carries whatever documents were obtained, each tagged
/// with its originating provider in the payload metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RetirementProof {
    pub documents: Vec<DocumentPayload>,
}

impl ProviderRecord for RetirementProof {
    fn provider(&self) -> &'static str {
        "retirement_fund"
    }

    fn field(&self, api_key: &str) -> Option<FieldValue> {
        match api_key {
            "retirement_contribution_documents" => {
                if self.documents.is_empty() {
                    None
                } else {
                    Some(FieldValue::Documents(self.documents.clone()))
                }
            }
            _ => None,
        }
    }

    fn document_refs(&self) -> Vec<DocumentRef> {
        // Merge sub-pipelines download before merging; nothing left to fetch.
        Vec::new()
    }

    fn attach_document(&mut self, _ref_id: &str, _payload: DocumentPayload) {}
}

// =============================================================================
// Resource (tagged union)
// =============================================================================

/// The normalized result of one provider's response.
///
/// A tagged union of the per-provider record types; delegates the
/// [`ProviderRecord`] capability to the active variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    TaxClearance(TaxClearance),
    SocialSecurityClearance(SocialSecurityClearance),
    CompanyProfile(CompanyProfile),
    ProfessionalCertificates(ProfessionalCertificates),
    RetirementStatement(RetirementStatement),
    RetirementProof(RetirementProof),
}

macro_rules! delegate {
    ($self:ident, $record:ident => $body:expr) => {
        match $self {
            Resource::TaxClearance($record) => $body,
            Resource::SocialSecurityClearance($record) => $body,
            Resource::CompanyProfile($record) => $body,
            Resource::ProfessionalCertificates($record) => $body,
            Resource::RetirementStatement($record) => $body,
            Resource::RetirementProof($record) => $body,
        }
    };
}

impl ProviderRecord for Resource {
    fn provider(&self) -> &'static str {
        delegate!(self, record => record.provider())
    }

    fn field(&self, api_key: &str) -> Option<FieldValue> {
        delegate!(self, record => record.field(api_key))
    }

    fn document_refs(&self) -> Vec<DocumentRef> {
        delegate!(self, record => record.document_refs())
    }

    fn attach_document(&mut self, ref_id: &str, payload: DocumentPayload) {
        delegate!(self, record => record.attach_document(ref_id, payload))
    }
}

// =============================================================================
// Bundled data
// =============================================================================

/// Well-known context key: merge status of a multi-source run.
pub const CONTEXT_MERGE_STATUS: &str = "merge_status";

/// Well-known context key: legal-risk flag from the company register.
pub const CONTEXT_LEGAL_RISK: &str = "legal_risk";

/// A [`Resource`] plus a side channel of pipeline-level facts.
///
/// Context entries are not form fields themselves; they drive downstream
/// decisions (merge status, detected legal-risk flags).
#[derive(Debug, Clone, PartialEq)]
pub struct BundledData {
    pub resource: Resource,
    pub context: BTreeMap<String, Value>,
}

impl BundledData {
    /// Wraps a resource with an empty context.
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            context: BTreeMap::new(),
        }
    }

    /// Adds a context entry, builder-style.
    pub fn with_context(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    /// Reads a context entry.
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }
}
