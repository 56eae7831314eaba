//! Request handlers

pub mod lookups;
pub mod resources;
