//! Common types used across CLI modules

use anyhow::{Result, bail};
use clap::ValueEnum;
use sandwatch_core::domain::job::{JobId, JobKind};
use uuid::Uuid;

/// Identifier that can be either a full job id or an unambiguous prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdOrPrefix {
    /// Full backend id (the backend hands out UUIDs)
    Full(JobId),
    /// Prefix that should uniquely identify a job
    Prefix(String),
}

impl IdOrPrefix {
    /// Parse a string into an IdOrPrefix
    ///
    /// Anything that parses as a UUID is taken as a full id, everything else
    /// as a prefix.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("Job id cannot be empty");
        }

        if Uuid::parse_str(input).is_ok() {
            Ok(IdOrPrefix::Full(JobId::new(input)?))
        } else {
            Ok(IdOrPrefix::Prefix(input.to_string()))
        }
    }

    pub fn as_job_id(&self) -> Option<&JobId> {
        match self {
            IdOrPrefix::Full(id) => Some(id),
            IdOrPrefix::Prefix(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IdOrPrefix::Full(id) => id.as_str(),
            IdOrPrefix::Prefix(prefix) => prefix,
        }
    }
}

impl std::fmt::Display for IdOrPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job kind as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Standard sandbox analysis
    Analysis,
    /// Interactive session with a remote display
    Interactive,
}

impl From<KindArg> for JobKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Analysis => JobKind::StandardAnalysis,
            KindArg::Interactive => JobKind::InteractiveSession,
        }
    }
}
