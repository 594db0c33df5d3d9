//! Sandwatch Tracker
//!
//! Client-side lifecycle tracking for sandbox analysis jobs and interactive
//! sessions.
//!
//! Architecture:
//! - Configuration: per-kind poll policies, backend settings from env
//! - Scheduler: one polling task per tracked job, cancellable at any point
//! - Lifecycle: the state machine turning status reports into transitions
//! - Connector: connection descriptors for ready interactive sessions
//! - Tracker: the dashboard-facing registry and subscriptions

pub mod config;
pub mod connector;
pub mod lifecycle;
pub mod scheduler;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use config::{PollPolicy, StatusMap, TrackerConfig};
pub use connector::{ConnectorError, SessionConnector};
pub use lifecycle::{LifecycleMachine, NextAction};
pub use scheduler::{PollControl, PollHandle, PollObserver, PollingScheduler};
pub use tracker::{JobTracker, Subscription, TrackerError};
