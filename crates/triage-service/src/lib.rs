//! Complaint triage service
//!
//! HTTP endpoint and queue listener around one configurable pipeline:
//! inference (hosted or in-process) → normalization → triage policy.

pub mod backend;
pub mod cli;
pub mod config;
pub mod listener;
pub mod pipeline;
pub mod routes;
pub mod state;

pub use config::{OutputShape, ServiceConfig};
pub use state::AppState;
