//! Visura Client - Provider HTTP clients and document fetching.
//!
//! One module per provider family, each contributing:
//!
//! - a requester (shared [`ProviderHttp`] machinery, per-provider endpoint
//!   template and credentials)
//! - a pure resource builder turning the provider's idiosyncratic JSON
//!   into a typed record
//! - a `pipeline` constructor wiring requester, builder, document source
//!   and mapper together
//!
//! The [`ProviderRegistry`] maps canonical provider names to pipelines
//! and implements `visura_core::PipelineFactory` for the worker.

pub mod company_register;
pub mod document;
pub mod http;
pub mod professional_certs;
pub mod registry;
pub mod retirement;
pub mod social_security;
pub mod tax_registry;
pub mod webhook;

pub use document::{document_filename, validate_payload, HttpDocumentSource};
pub use http::{build_client, classify_transport_error, ProviderHttp};
pub use registry::{ProviderPipelineKind, ProviderRegistry, KNOWN_PROVIDERS};
pub use webhook::ReqwestWebhookTransport;
