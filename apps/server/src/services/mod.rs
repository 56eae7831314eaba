//! Integrity layer
//!
//! Services are built once in [`AppState`](crate::AppState) over a shared
//! [`DocumentStore`](crate::db::DocumentStore) and hold no other state.

pub mod identity;
pub mod queries;
pub mod reference_validator;
pub mod uniqueness;
pub mod write_coordinator;

pub use identity::{IdentityResolution, IdentityResolver};
pub use queries::{ImagingStudyCriteria, ResourceQueries};
pub use reference_validator::{ReferenceCheck, ReferenceValidator};
pub use uniqueness::{CardinalityCheck, UniquenessGuard};
pub use write_coordinator::WriteCoordinator;
