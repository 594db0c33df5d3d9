//! Error taxonomy attached to jobs
//!
//! Libraries return their own typed errors; the lifecycle tracker folds them
//! into a [`JobError`] so a dashboard only ever sees a class and a message.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a failure affects the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// Network failure or 5xx; retried up to the retry limit
    Transient,
    /// 4xx, malformed payload, or an explicit backend failure; fails the job immediately
    Permanent,
    /// Connection descriptor could not be resolved for a ready session
    Connector,
    /// Unknown status string or an impossible transition
    Protocol,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Permanent => "permanent",
            ErrorClass::Connector => "connector",
            ErrorClass::Protocol => "protocol",
        }
    }
}

/// Most recent error observed for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub class: ErrorClass,
    pub message: String,
}

impl JobError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Permanent, message)
    }

    pub fn connector(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Connector, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Protocol, message)
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.class.as_str(), self.message)
    }
}
