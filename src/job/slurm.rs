use super::{JobId, TerminalStatus};
use crate::config::SchedulerConfig;
use crate::error::CycleError;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Scheduler states that end a job unsuccessfully.
const FAILED_STATES: [&str; 9] = [
    "FAILED",
    "CANCELLED",
    "TIMEOUT",
    "NODE_FAIL",
    "OUT_OF_MEMORY",
    "PREEMPTED",
    "BOOT_FAIL",
    "DEADLINE",
    "REVOKED",
];

/// What the scheduler reports about a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Pending, running or otherwise still queued; carries the raw state.
    Active(String),
    Finished(TerminalStatus),
}

/// The batch system seam: submit a script, ask about a job.
pub trait Scheduler {
    fn submit(&self, script: &Path, cwd: &Path, depends_on: Option<JobId>) -> Result<JobId>;
    fn query(&self, job_id: JobId) -> Result<JobState>;
}

/// SLURM via its command-line tools.
#[derive(Debug, Clone)]
pub struct SlurmScheduler {
    submit_command: Vec<String>,
    query_command: Vec<String>,
    accounting_command: Vec<String>,
}

impl SlurmScheduler {
    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        Ok(Self {
            submit_command: split_command(&config.submit_command, "submit_command")?,
            query_command: split_command(&config.query_command, "query_command")?,
            accounting_command: split_command(&config.accounting_command, "accounting_command")?,
        })
    }

    /// Resolve the submission and query programs on `PATH`.
    pub fn check_available(&self) -> Result<()> {
        for words in [&self.submit_command, &self.query_command] {
            let (program, _) = split_program(words);
            resolve_program(program)
                .map_err(|detail| anyhow!(CycleError::Configuration(detail)))?;
        }
        Ok(())
    }

    /// Final state from accounting once the job has left the queue.
    fn final_state(&self, job_id: JobId) -> JobState {
        let (program, base_args) = split_program(&self.accounting_command);
        let id = job_id.to_string();
        let output = Command::new(program)
            .args(base_args)
            .args(["-n", "-X", "-P", "-j", id.as_str(), "-o", "State"])
            .stdin(Stdio::null())
            .output();
        let output = match output {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                tracing::warn!(
                    job_id,
                    status = %output.status,
                    "accounting query failed; assuming job completed"
                );
                return JobState::Finished(TerminalStatus::Success);
            }
            Err(err) => {
                tracing::warn!(job_id, error = %err, "accounting unavailable; assuming job completed");
                return JobState::Finished(TerminalStatus::Success);
            }
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some(state) = stdout
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .next()
        else {
            return JobState::Finished(TerminalStatus::Success);
        };
        classify_state(state)
    }
}

impl Scheduler for SlurmScheduler {
    fn submit(&self, script: &Path, cwd: &Path, depends_on: Option<JobId>) -> Result<JobId> {
        let (program, base_args) = split_program(&self.submit_command);
        let mut argv: Vec<String> = base_args.to_vec();
        if let Some(job_id) = depends_on {
            argv.push(dependency_flag(job_id));
        }
        argv.push(script.display().to_string());
        let command_line = super::format_command_line(program, &argv);

        let resolved = resolve_program(program).map_err(|detail| {
            anyhow!(CycleError::Submission {
                command: command_line.clone(),
                detail,
            })
        })?;
        let output = Command::new(&resolved)
            .args(&argv)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                anyhow!(CycleError::Submission {
                    command: command_line.clone(),
                    detail: format!("spawn failed: {err}"),
                })
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = match stderr.trim().lines().next() {
                Some(line) if !line.is_empty() => line.to_string(),
                _ => format!("status {}", output.status),
            };
            return Err(anyhow!(CycleError::Submission {
                command: command_line,
                detail,
            }));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_job_id(&stdout).with_context(|| format!("submit {}", script.display()))
    }

    fn query(&self, job_id: JobId) -> Result<JobState> {
        let (program, base_args) = split_program(&self.query_command);
        let id = job_id.to_string();
        let output = Command::new(program)
            .args(base_args)
            .args(["-h", "-j", id.as_str(), "-o", "%T"])
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("run {program} for job {job_id}"))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        match queue_listing(output.status.success(), &stdout, &stderr) {
            QueueListing::Listed(state) => Ok(JobState::Active(state)),
            QueueListing::Gone => Ok(self.final_state(job_id)),
            QueueListing::Unknown(detail) => {
                tracing::warn!(job_id, detail = %detail, "queue query failed; still polling");
                Ok(JobState::Active(UNKNOWN_STATE.to_string()))
            }
        }
    }
}

/// State reported while the queue cannot be read.
const UNKNOWN_STATE: &str = "UNKNOWN";

/// What one `squeue` call says about a job.
#[derive(Debug, PartialEq, Eq)]
enum QueueListing {
    Listed(String),
    /// Confirmed absent from the queue.
    Gone,
    /// The query itself failed; the job may still be running.
    Unknown(String),
}

fn queue_listing(success: bool, stdout: &str, stderr: &str) -> QueueListing {
    if success {
        return match stdout.split_whitespace().next() {
            Some(state) => QueueListing::Listed(state.to_string()),
            None => QueueListing::Gone,
        };
    }
    // squeue exits non-zero with "Invalid job id" once a job is purged.
    if stderr.to_ascii_lowercase().contains("invalid job id") {
        return QueueListing::Gone;
    }
    let detail = stderr.trim().lines().next().unwrap_or("no output").to_string();
    QueueListing::Unknown(detail)
}

/// The job id is the last whitespace-delimited token of the submission output,
/// e.g. `Submitted batch job 4821`.
pub fn parse_job_id(stdout: &str) -> Result<JobId> {
    let token = stdout.split_whitespace().next_back().ok_or_else(|| {
        anyhow!(CycleError::parse(
            "scheduler output",
            "empty submission output"
        ))
    })?;
    // `sbatch --parsable` prints `<id>;<cluster>`.
    let id_text = token.split(';').next().unwrap_or(token);
    id_text.parse().map_err(|_| {
        anyhow!(CycleError::parse(
            "scheduler output",
            format!("job id {token:?} is not an integer"),
        ))
    })
}

fn dependency_flag(job_id: JobId) -> String {
    format!("--dependency=afterok:{job_id}")
}

fn classify_state(state: &str) -> JobState {
    let upper = state.to_ascii_uppercase();
    let base = upper.trim_end_matches('+');
    if FAILED_STATES.iter().any(|failed| base.starts_with(failed)) {
        return JobState::Finished(TerminalStatus::Failure);
    }
    match base {
        "PENDING" | "RUNNING" | "REQUEUED" | "RESIZING" | "SUSPENDED" | "CONFIGURING"
        | "COMPLETING" => JobState::Active(base.to_string()),
        _ => JobState::Finished(TerminalStatus::Success),
    }
}

fn split_command(command: &str, key: &str) -> Result<Vec<String>> {
    let words = shell_words::split(command)
        .with_context(|| format!("parse scheduler.{key}: {command}"))?;
    if words.is_empty() {
        return Err(anyhow!(CycleError::Configuration(format!(
            "scheduler.{key} is empty"
        ))));
    }
    Ok(words)
}

fn split_program(words: &[String]) -> (&str, &[String]) {
    match words.split_first() {
        Some((program, args)) => (program.as_str(), args),
        None => ("", &[][..]),
    }
}

fn resolve_program(program: &str) -> std::result::Result<PathBuf, String> {
    which::which(program).map_err(|err| format!("{program} not found: {err}"))
}
