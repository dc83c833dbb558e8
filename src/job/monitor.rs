use super::{JobHandle, JobState, Scheduler, TerminalStatus};
use crate::error::CycleError;
use anyhow::{anyhow, Result};
use std::thread;
use std::time::{Duration, Instant};

/// How batch jobs are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Maximum time to wait for a batch job; `None` waits indefinitely.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: None,
        }
    }
}

/// Waits for job handles to reach a terminal state.
pub struct JobMonitor<'a> {
    scheduler: &'a dyn Scheduler,
    policy: PollPolicy,
}

impl<'a> JobMonitor<'a> {
    pub fn new(scheduler: &'a dyn Scheduler, policy: PollPolicy) -> Self {
        Self { scheduler, policy }
    }

    /// Block until `handle` finishes.
    ///
    /// Local handles already carry their status and return without touching
    /// the scheduler. Batch handles are queried every `interval` until the
    /// job is no longer pending or running.
    pub fn await_completion(&self, handle: &JobHandle) -> Result<TerminalStatus> {
        let job_id = match handle {
            JobHandle::Local { status, .. } => return Ok(*status),
            JobHandle::Batch { job_id, .. } => *job_id,
        };
        let start = Instant::now();
        loop {
            match self.scheduler.query(job_id)? {
                JobState::Finished(status) => {
                    tracing::info!(
                        job_id,
                        ?status,
                        elapsed_ms = start.elapsed().as_millis(),
                        "batch job finished"
                    );
                    return Ok(status);
                }
                JobState::Active(state) => {
                    tracing::debug!(job_id, state = %state, "batch job active");
                }
            }
            let elapsed = start.elapsed();
            let sleep_for = match self.policy.deadline {
                Some(deadline) if elapsed >= deadline => {
                    return Err(anyhow!(CycleError::PollTimeout { job_id, elapsed }));
                }
                Some(deadline) => self.policy.interval.min(deadline - elapsed),
                None => self.policy.interval,
            };
            thread::sleep(sleep_for);
        }
    }
}
