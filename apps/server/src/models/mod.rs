//! Outcome types returned by the integrity layer

pub mod outcome;

pub use outcome::{LookupOutcome, MatchType, ReferenceFailure, Rejection, WriteOutcome};
