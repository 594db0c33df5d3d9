//! Data Transfer Objects for the analysis backend
//!
//! Bodies sent to and received from the backend's HTTP API. Field names
//! follow the backend's wire contract rather than Rust conventions.

pub mod job;
pub mod status;
