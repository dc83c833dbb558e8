use super::{ExecBackend, JobHandle, JobId, Scheduler, TerminalStatus};
use crate::error::CycleError;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

/// Starts executables locally or through the batch scheduler.
pub struct JobLauncher<'a> {
    scheduler: &'a dyn Scheduler,
}

impl<'a> JobLauncher<'a> {
    pub fn new(scheduler: &'a dyn Scheduler) -> Self {
        Self { scheduler }
    }

    /// Start `executable` with the configured backend.
    ///
    /// Batch runs submit the backend's script instead; the script is expected
    /// to invoke the executable itself.
    pub fn launch(
        &self,
        backend: &ExecBackend,
        executable: &Path,
        cwd: &Path,
        log: Option<&Path>,
    ) -> Result<JobHandle> {
        match backend {
            ExecBackend::Local => self.submit_local(executable, &[], cwd, log),
            ExecBackend::Batch { script } => self.submit_batch(script, cwd, None),
        }
    }

    /// Run `executable` to completion in `cwd`.
    ///
    /// Output goes to `log` when given, otherwise it is discarded. A non-zero
    /// exit produces a handle in the failed state; failing to start the
    /// process at all is an error.
    pub fn submit_local(
        &self,
        executable: &Path,
        args: &[String],
        cwd: &Path,
        log: Option<&Path>,
    ) -> Result<JobHandle> {
        let command = format_command_line(&executable.display().to_string(), args);
        let (stdout, stderr) = output_sinks(log)?;
        let start = Instant::now();
        let status = Command::new(executable)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .map_err(|err| {
                anyhow!(CycleError::ExternalProcess {
                    command: command.clone(),
                    detail: format!("spawn failed: {err}"),
                })
            })?;
        let elapsed_ms = start.elapsed().as_millis();
        tracing::info!(
            command = %command,
            cwd = %cwd.display(),
            elapsed_ms,
            success = status.success(),
            "local job finished"
        );
        let (status, detail) = if status.success() {
            (TerminalStatus::Success, None)
        } else {
            (
                TerminalStatus::Failure,
                Some(format!("exit status {}", exit_status_string(&status))),
            )
        };
        Ok(JobHandle::Local {
            command,
            status,
            detail,
        })
    }

    /// Submit `script` to the batch scheduler, optionally after `depends_on`
    /// completes successfully.
    pub fn submit_batch(
        &self,
        script: &Path,
        cwd: &Path,
        depends_on: Option<JobId>,
    ) -> Result<JobHandle> {
        if !script.is_file() {
            return Err(anyhow!(CycleError::Submission {
                command: script.display().to_string(),
                detail: "batch script does not exist".to_string(),
            }));
        }
        let job_id = self.scheduler.submit(script, cwd, depends_on)?;
        tracing::info!(
            job_id,
            script = %script.display(),
            depends_on = ?depends_on,
            "batch job submitted"
        );
        Ok(JobHandle::Batch {
            job_id,
            script: script.to_path_buf(),
        })
    }
}

fn output_sinks(log: Option<&Path>) -> Result<(Stdio, Stdio)> {
    let Some(log) = log else {
        return Ok((Stdio::null(), Stdio::null()));
    };
    let file = File::create(log).with_context(|| format!("create log {}", log.display()))?;
    let err_file = file
        .try_clone()
        .with_context(|| format!("share log {}", log.display()))?;
    Ok((Stdio::from(file), Stdio::from(err_file)))
}

fn exit_status_string(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        format!("{code}")
    } else {
        "terminated by signal".to_string()
    }
}

/// Shell-style rendering of a command for logs and error messages.
pub fn format_command_line(program: &str, argv: &[String]) -> String {
    let mut parts = Vec::with_capacity(argv.len() + 1);
    parts.push(shell_quote(program));
    for arg in argv {
        parts.push(shell_quote(arg));
    }
    parts.join(" ")
}

fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let safe = arg.chars().all(|ch| {
        matches!(
            ch,
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' | '/' | ':' | '@' | '+' | '='
        )
    });
    if safe {
        return arg.to_string();
    }
    let escaped = arg.replace('\'', "'\"'\"'");
    format!("'{escaped}'")
}
