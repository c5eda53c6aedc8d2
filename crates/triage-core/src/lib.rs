//! Complaint triage core
//!
//! Types shared by every crate in the workspace:
//! - The error type and `Result` alias
//! - Request payloads and priority levels
//! - The static department table that resolves model labels to departments

pub mod department;
pub mod error;
pub mod types;

pub use department::DepartmentTable;
pub use error::{Error, Result};
pub use types::{ComplaintData, Priority};
