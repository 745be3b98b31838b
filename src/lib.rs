//! Event suggestions for Espoo residents: cached, AI-ranked, and resilient to
//! provider outages.

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod ingest;
pub mod logging;
pub mod ranking;
pub mod state;
pub mod suggestions;
pub mod utils;
pub mod web;
