use super::*;
use crate::config::SchedulerConfig;
use crate::error::{cycle_error, CycleError};
use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// In-memory scheduler that replays a fixed sequence of query answers.
struct ScriptedScheduler {
    next_id: JobId,
    answers: RefCell<Vec<JobState>>,
    queries: Cell<usize>,
    submissions: RefCell<Vec<Option<JobId>>>,
}

impl ScriptedScheduler {
    fn new(answers: Vec<JobState>) -> Self {
        Self {
            next_id: 4821,
            answers: RefCell::new(answers),
            queries: Cell::new(0),
            submissions: RefCell::new(Vec::new()),
        }
    }
}

impl Scheduler for ScriptedScheduler {
    fn submit(&self, _script: &Path, _cwd: &Path, depends_on: Option<JobId>) -> Result<JobId> {
        self.submissions.borrow_mut().push(depends_on);
        Ok(self.next_id)
    }

    fn query(&self, _job_id: JobId) -> Result<JobState> {
        self.queries.set(self.queries.get() + 1);
        let mut answers = self.answers.borrow_mut();
        if answers.len() > 1 {
            Ok(answers.remove(0))
        } else {
            Ok(answers[0].clone())
        }
    }
}

fn fast_policy(deadline: Option<Duration>) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        deadline,
    }
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

#[test]
fn empty_script_setting_selects_local_backend() {
    assert_eq!(ExecBackend::from_script_setting(""), ExecBackend::Local);
    assert_eq!(ExecBackend::from_script_setting("  "), ExecBackend::Local);
    assert_eq!(
        ExecBackend::from_script_setting("/opt/run.sh"),
        ExecBackend::Batch {
            script: "/opt/run.sh".into()
        }
    );
}

#[test]
fn local_handle_completes_without_polling() {
    let scheduler = ScriptedScheduler::new(vec![JobState::Active("RUNNING".into())]);
    let monitor = JobMonitor::new(&scheduler, fast_policy(None));
    let handle = JobHandle::Local {
        command: "true".into(),
        status: TerminalStatus::Failure,
        detail: Some("exit status 1".into()),
    };
    let status = monitor.await_completion(&handle).expect("await local");
    assert_eq!(status, TerminalStatus::Failure);
    assert_eq!(scheduler.queries.get(), 0);
}

#[test]
fn batch_handle_polls_until_job_leaves_queue() {
    let scheduler = ScriptedScheduler::new(vec![
        JobState::Active("PENDING".into()),
        JobState::Active("RUNNING".into()),
        JobState::Finished(TerminalStatus::Success),
    ]);
    let monitor = JobMonitor::new(&scheduler, fast_policy(None));
    let handle = JobHandle::Batch {
        job_id: 4821,
        script: "/opt/run.sh".into(),
    };
    let status = monitor.await_completion(&handle).expect("await batch");
    assert_eq!(status, TerminalStatus::Success);
    assert_eq!(scheduler.queries.get(), 3);
}

#[test]
fn batch_poll_gives_up_after_deadline() {
    let scheduler = ScriptedScheduler::new(vec![JobState::Active("RUNNING".into())]);
    let monitor = JobMonitor::new(&scheduler, fast_policy(Some(Duration::from_millis(20))));
    let handle = JobHandle::Batch {
        job_id: 77,
        script: "/opt/run.sh".into(),
    };
    let err = monitor.await_completion(&handle).expect_err("should time out");
    assert!(matches!(
        cycle_error(&err),
        Some(CycleError::PollTimeout { job_id: 77, .. })
    ));
    assert!(scheduler.queries.get() >= 2);
}

#[test]
fn submit_batch_rejects_missing_script() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scheduler = ScriptedScheduler::new(vec![JobState::Finished(TerminalStatus::Success)]);
    let launcher = JobLauncher::new(&scheduler);
    let err = launcher
        .submit_batch(&dir.path().join("absent.sh"), dir.path(), None)
        .expect_err("missing script");
    assert!(matches!(
        cycle_error(&err),
        Some(CycleError::Submission { .. })
    ));
    assert!(scheduler.submissions.borrow().is_empty());
}

#[test]
fn submit_batch_passes_dependency_through() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("run.sh");
    fs::write(&script, "#!/bin/sh\n").expect("write script");
    let scheduler = ScriptedScheduler::new(vec![JobState::Finished(TerminalStatus::Success)]);
    let launcher = JobLauncher::new(&scheduler);
    let handle = launcher
        .submit_batch(&script, dir.path(), Some(4820))
        .expect("submit");
    assert_eq!(handle.job_id(), Some(4821));
    assert_eq!(*scheduler.submissions.borrow(), vec![Some(4820)]);
}

#[cfg(unix)]
#[test]
fn local_run_captures_output_and_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let exe = dir.path().join("tool.exe");
    write_script(&exe, "echo started\necho problem >&2\npwd > cwd.txt\nexit 0");
    let log = dir.path().join("log.tool_d01");
    let scheduler = ScriptedScheduler::new(vec![JobState::Finished(TerminalStatus::Success)]);
    let launcher = JobLauncher::new(&scheduler);

    let handle = launcher
        .submit_local(&exe, &[], dir.path(), Some(&log))
        .expect("run local");
    assert!(matches!(
        handle,
        JobHandle::Local {
            status: TerminalStatus::Success,
            ..
        }
    ));
    let logged = fs::read_to_string(&log).expect("read log");
    assert!(logged.contains("started"));
    assert!(logged.contains("problem"));
    assert!(dir.path().join("cwd.txt").is_file());
}

#[cfg(unix)]
#[test]
fn local_non_zero_exit_yields_failed_handle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let exe = dir.path().join("broken.exe");
    write_script(&exe, "exit 3");
    let scheduler = ScriptedScheduler::new(vec![JobState::Finished(TerminalStatus::Success)]);
    let launcher = JobLauncher::new(&scheduler);
    let handle = launcher
        .submit_local(&exe, &[], dir.path(), None)
        .expect("run local");
    match handle {
        JobHandle::Local { status, detail, .. } => {
            assert_eq!(status, TerminalStatus::Failure);
            assert_eq!(detail.as_deref(), Some("exit status 3"));
        }
        other => panic!("unexpected handle {other:?}"),
    }
}

#[test]
fn local_missing_executable_is_external_process_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scheduler = ScriptedScheduler::new(vec![JobState::Finished(TerminalStatus::Success)]);
    let launcher = JobLauncher::new(&scheduler);
    let err = launcher
        .submit_local(&dir.path().join("missing.exe"), &[], dir.path(), None)
        .expect_err("missing executable");
    assert!(matches!(
        cycle_error(&err),
        Some(CycleError::ExternalProcess { .. })
    ));
}

#[cfg(unix)]
fn slurm_fixture(dir: &Path, submit_body: &str, squeue_body: &str) -> SlurmScheduler {
    let sbatch = dir.join("sbatch");
    let squeue = dir.join("squeue");
    write_script(&sbatch, submit_body);
    write_script(&squeue, squeue_body);
    let config = SchedulerConfig {
        submit_command: format!("sh {}", sbatch.display()),
        query_command: format!("sh {}", squeue.display()),
        accounting_command: dir.join("no-sacct").display().to_string(),
        poll_interval_ms: 1,
        timeout_secs: Some(5),
    };
    SlurmScheduler::from_config(&config).expect("scheduler from config")
}

#[cfg(unix)]
#[test]
fn slurm_submission_extracts_job_id_and_not_running_means_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let args_file = dir.path().join("sbatch.args");
    let scheduler = slurm_fixture(
        dir.path(),
        &format!(
            "echo \"$@\" > {}\necho 'Submitted batch job 4821'",
            args_file.display()
        ),
        "exit 0",
    );
    let script = dir.path().join("wrfvar.sh");
    fs::write(&script, "#!/bin/sh\n").expect("write job script");

    let launcher = JobLauncher::new(&scheduler);
    let handle = launcher
        .submit_batch(&script, dir.path(), Some(4820))
        .expect("submit");
    assert_eq!(handle.job_id(), Some(4821));
    let args = fs::read_to_string(&args_file).expect("read sbatch args");
    assert!(args.contains("--dependency=afterok:4820"));
    assert!(args.trim_end().ends_with("wrfvar.sh"));

    let monitor = JobMonitor::new(&scheduler, fast_policy(Some(Duration::from_secs(5))));
    let status = monitor.await_completion(&handle).expect("await");
    assert_eq!(status, TerminalStatus::Success);
}

#[cfg(unix)]
#[test]
fn slurm_query_reports_active_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scheduler = slurm_fixture(dir.path(), "echo 'Submitted batch job 1'", "echo RUNNING");
    assert_eq!(
        scheduler.query(1).expect("query"),
        JobState::Active("RUNNING".into())
    );
}

#[cfg(unix)]
#[test]
fn slurm_controller_timeout_keeps_job_active() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scheduler = slurm_fixture(
        dir.path(),
        "echo 'Submitted batch job 4821'",
        "echo 'slurm_load_jobs error: Socket timed out on send/recv operation' >&2\nexit 1",
    );
    assert_eq!(
        scheduler.query(4821).expect("query"),
        JobState::Active("UNKNOWN".into())
    );

    let handle = JobHandle::Batch {
        job_id: 4821,
        script: dir.path().join("job.sh"),
    };
    let monitor = JobMonitor::new(&scheduler, fast_policy(Some(Duration::from_millis(20))));
    let err = monitor
        .await_completion(&handle)
        .expect_err("unreadable queue never counts as finished");
    assert!(matches!(
        cycle_error(&err),
        Some(CycleError::PollTimeout { job_id: 4821, .. })
    ));
}

#[cfg(unix)]
#[test]
fn slurm_invalid_job_id_means_job_left_queue() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scheduler = slurm_fixture(
        dir.path(),
        "echo 'Submitted batch job 4821'",
        "echo 'slurm_load_jobs error: Invalid job id specified' >&2\nexit 1",
    );
    assert_eq!(
        scheduler.query(4821).expect("query"),
        JobState::Finished(TerminalStatus::Success)
    );
}

#[cfg(unix)]
#[test]
fn slurm_submission_failure_is_submission_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let scheduler = slurm_fixture(
        dir.path(),
        "echo 'sbatch: error: invalid partition' >&2\nexit 1",
        "exit 0",
    );
    let script = dir.path().join("job.sh");
    fs::write(&script, "#!/bin/sh\n").expect("write job script");
    let err = scheduler
        .submit(&script, dir.path(), None)
        .expect_err("submission fails");
    match cycle_error(&err) {
        Some(CycleError::Submission { detail, .. }) => {
            assert!(detail.contains("invalid partition"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}
