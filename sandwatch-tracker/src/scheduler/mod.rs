//! Scheduler layer for the tracker
//!
//! This layer drives repeated status fetches for a job and hands every
//! result to an observer. It knows nothing about what a status means;
//! interpretation lives in the lifecycle state machine.

pub mod poller;

pub use poller::{PollControl, PollHandle, PollObserver, PollingScheduler};
