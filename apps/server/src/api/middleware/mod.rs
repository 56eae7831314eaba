//! Middleware stack for the API

pub mod layers;
pub mod security;

pub use layers::{cors, trace};
pub use security::security_headers_middleware;
