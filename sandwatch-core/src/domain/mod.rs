//! Core domain types
//!
//! These types describe what the tracker knows about a submitted job: its
//! identity, its interpreted lifecycle state and, for interactive sessions,
//! how to reach the sandbox display. They are shared between the tracker
//! (which mutates them) and dashboards (which only read snapshots).

pub mod error;
pub mod job;
pub mod session;
pub mod snapshot;
