//! Resource models for the RIS record store
//!
//! This crate is the single ingestion boundary between untyped JSON bodies and
//! the integrity core. Everything past [`ResourcePayload::from_json`] works on
//! typed values.
//!
//! # Module Organization
//!
//! - `kind`: the five resource kinds and their predecessor relationships
//! - `id`: store-assigned identifiers
//! - `reference`: canonical `Kind/id` references and the raw forms they are parsed from
//! - `identifier`: external business keys (`system`, `value`)
//! - `payload`: typed payloads per resource kind, including field normalization
//! - `temporal`: FHIR date / dateTime parsing helpers
//!
//! # Example
//!
//! ```rust
//! use ris_models::{Reference, ResourceKind};
//!
//! let id = "7f9c2a52-3c1e-4df0-9d0c-0f4f3b9f1a10";
//! let reference = Reference::parse(ResourceKind::ServiceRequest, &format!("ServiceRequest/{id}")).unwrap();
//! assert_eq!(reference.kind(), ResourceKind::ServiceRequest);
//! assert_eq!(reference.canonical(), format!("ServiceRequest/{id}"));
//! ```

pub mod id;
pub mod identifier;
pub mod kind;
pub mod payload;
pub mod reference;
pub mod temporal;

pub use id::{InvalidStoreId, StoreId};
pub use identifier::Identifier;
pub use kind::{ResourceKind, UnknownResourceKind};
pub use payload::{
    AppointmentPayload, Demographics, DiagnosticReportPayload, FieldError, ImagingStudyPayload,
    PatientPayload, PayloadError, ResourcePayload, ServiceRequestPayload,
};
pub use reference::{Reference, ReferenceError, ReferenceInput};
