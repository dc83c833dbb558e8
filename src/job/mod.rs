//! Launching external executables and waiting for them to finish.
//!
//! Every executable runs through one of two backends chosen when the
//! configuration is loaded: in-process (blocking until exit) or through the
//! batch scheduler (submit, then poll). Both produce a [`JobHandle`] that the
//! [`JobMonitor`] turns into a [`TerminalStatus`].
mod launcher;
mod monitor;
mod slurm;

pub use launcher::{format_command_line, JobLauncher};
pub use monitor::{JobMonitor, PollPolicy};
pub use slurm::{JobState, Scheduler, SlurmScheduler};

use serde::Serialize;
use std::path::PathBuf;

/// Scheduler-assigned job identifier.
pub type JobId = u64;

/// Where an executable runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecBackend {
    Local,
    Batch { script: PathBuf },
}

impl ExecBackend {
    /// Interpret a `slurm_<exe>` setting: empty means local execution.
    pub fn from_script_setting(setting: &str) -> Self {
        let trimmed = setting.trim();
        if trimmed.is_empty() {
            ExecBackend::Local
        } else {
            ExecBackend::Batch {
                script: PathBuf::from(trimmed),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Success,
    Failure,
}

/// A submitted unit of external work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobHandle {
    /// Already finished; the status is known.
    Local {
        command: String,
        status: TerminalStatus,
        detail: Option<String>,
    },
    /// Queued with the batch scheduler; must be polled.
    Batch { job_id: JobId, script: PathBuf },
}

impl JobHandle {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobHandle::Local { .. } => None,
            JobHandle::Batch { job_id, .. } => Some(*job_id),
        }
    }

    /// Human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            JobHandle::Local { command, .. } => command.clone(),
            JobHandle::Batch { job_id, script } => {
                format!("batch job {job_id} ({})", script.display())
            }
        }
    }
}

#[cfg(test)]
mod tests;
