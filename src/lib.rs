//! macaroni - relays horenso execution reports
//!
//! This library decodes the JSON report horenso writes after supervising a
//! command and fans it out to Slack and Mackerel.
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod ecs;
pub mod filter;
pub mod formatting;
pub mod internal_metrics;
pub mod notification;

// Re-export core types for convenience
pub use crate::core::*;
