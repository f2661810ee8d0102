use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::PipelineStage;

const MAX_SAMPLES: usize = 20;

/// Hard failures. Anything not listed here is counted in an [`IssueLog`] and
/// never leaves the stage that saw it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no readable {entity} files found (searched {searched:?})")]
    SourceGroupMissing {
        entity: &'static str,
        searched: Vec<PathBuf>,
    },

    #[error("write to {path} failed: {source:#}")]
    Write {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("verification of {path} failed: {source:#}")]
    Verification {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("quality gate failed: {}", breaches.join("; "))]
    QualityGate { breaches: Vec<String> },
}

/// Error tied to the stage the orchestrator was in when it happened.
#[derive(Debug, Error)]
#[error("aborted during {stage}: {error}")]
pub struct StageError {
    pub stage: PipelineStage,
    #[source]
    pub error: PipelineError,
}

/// A source file whose whole contribution was dropped.
#[derive(Debug, Clone, Serialize)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

/// Counter plus a bounded set of example messages.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IssueLog {
    pub count: usize,
    pub samples: Vec<String>,
}

impl IssueLog {
    pub fn record(&mut self, message: impl Into<String>) {
        self.count += 1;
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(message.into());
        }
    }

    pub fn merge(&mut self, other: IssueLog) {
        self.count += other.count;
        for sample in other.samples {
            if self.samples.len() >= MAX_SAMPLES {
                break;
            }
            self.samples.push(sample);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
