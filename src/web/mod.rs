//! HTTP surface: health, status, and per-user suggestions.

pub mod error;
pub mod routes;
pub mod status;
pub mod suggestions;

pub use routes::*;
