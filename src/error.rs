//! Failure taxonomy for a data-assimilation cycle.
//!
//! Every fallible operation returns `anyhow::Result`; the variants below are
//! attached at the point of failure so callers (and tests) can downcast to the
//! category while the context chain still explains where it happened.
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("missing static asset {}", .0.display())]
    MissingAsset(PathBuf),

    #[error("namelist not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("`{command}` failed: {detail}")]
    ExternalProcess { command: String, detail: String },

    #[error("batch submission `{command}` failed: {detail}")]
    Submission { command: String, detail: String },

    #[error("parse error in {origin}: {detail}")]
    Parse { origin: String, detail: String },

    #[error("invalid cycle timestamp {input:?}: {detail}")]
    Validation { input: String, detail: String },

    #[error("batch job {job_id} still active after {elapsed:?}")]
    PollTimeout { job_id: u64, elapsed: Duration },
}

impl CycleError {
    pub fn parse(origin: impl Into<String>, detail: impl Into<String>) -> Self {
        CycleError::Parse {
            origin: origin.into(),
            detail: detail.into(),
        }
    }

    /// Short category label used in log fields and the CLI failure line.
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Configuration(_) | CycleError::MissingAsset(_) => "configuration",
            CycleError::NotFound(_) => "not_found",
            CycleError::ExternalProcess { .. } | CycleError::Submission { .. } => {
                "external_process"
            }
            CycleError::Parse { .. } => "parse",
            CycleError::Validation { .. } => "validation",
            CycleError::PollTimeout { .. } => "timeout",
        }
    }
}

/// Find the typed cycle error anywhere in an anyhow chain.
pub fn cycle_error(err: &anyhow::Error) -> Option<&CycleError> {
    err.chain().find_map(|cause| cause.downcast_ref::<CycleError>())
}
