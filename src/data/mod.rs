//! Postgres persistence for preferences, events and cached suggestions.

pub mod events;
pub mod preferences;
mod store;
pub mod suggestion_cache;

pub use store::PgStore;
