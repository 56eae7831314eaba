//! RIS record store
//!
//! Persists Patient, ServiceRequest, Appointment, ImagingStudy and
//! DiagnosticReport documents with:
//! - Patient deduplication by identifier and demographics
//! - Predecessor reference checks on every dependent resource
//! - One Appointment per ServiceRequest, one ImagingStudy per Appointment
//! - Idempotent creates that survive concurrent writers

#![allow(
    clippy::large_enum_variant,      // Outcome enums carry payload detail inline
    clippy::result_large_err,        // Rejections are data, not boxed errors
)]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
