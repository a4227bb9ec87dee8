//! Waiting on the remote: job polling, plus the best-effort delays used
//! where the remote offers no completion signal.
//!
//! A job goes `SUBMITTED -> POLLING -> {SUCCEEDED, FAILED}`. Polling has a
//! fixed interval and no attempt ceiling; a caller wanting a timeout wraps
//! the whole process.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Timings;
use crate::contract::{JobKind, JobOutcome, JobStatusApi, RemoteFileAccess};
use crate::error::Result;

const MIN_SETTLE_INTERVAL: Duration = Duration::from_millis(50);

/// Polls until the job reaches `DONE`/`COMPLETE` (`Ok(true)`) or reports a
/// status other than `OK` (`Ok(false)`, no further probes).
pub async fn wait_for_job<J>(api: &J, job_id: &str, kind: JobKind, interval: Duration) -> Result<bool>
where
    J: JobStatusApi + ?Sized,
{
    info!(job_id, kind = %kind, "Waiting for job to finish");
    let mut probes: u64 = 0;
    loop {
        let status = api.job_status(job_id, kind).await?;
        probes += 1;
        match status.outcome() {
            JobOutcome::Failed => {
                warn!(job_id, status = %status.status, state = %status.state, probes, "Job reported failure");
                return Ok(false);
            }
            JobOutcome::Succeeded => {
                info!(job_id, state = %status.state, probes, "Job finished");
                return Ok(true);
            }
            JobOutcome::Running => {
                debug!(job_id, state = %status.state, probes, "Job still running");
                sleep(interval).await;
            }
        }
    }
}

/// Fixed best-effort delay after submitting an operation whose completion is
/// not observable. Not a correctness guarantee.
pub async fn grace_delay(duration: Duration, reason: &str) {
    if duration.is_zero() {
        return;
    }
    debug!(reason, millis = duration.as_millis() as u64, "Grace delay");
    sleep(duration).await;
}

/// Waits until `path` exists or the grace period runs out, whichever is
/// first. Returns whether the path was observed; on timeout it only logs.
pub async fn settle<F>(files: &F, path: &str, timings: &Timings) -> Result<bool>
where
    F: RemoteFileAccess + ?Sized,
{
    let deadline = Instant::now() + timings.grace_period;
    loop {
        if files.exists(path).await? {
            debug!(path, "Settled: path observed");
            return Ok(true);
        }
        if Instant::now() >= deadline {
            warn!(
                path,
                grace_secs = timings.grace_period.as_secs(),
                "Path not observed within grace period, proceeding anyway"
            );
            return Ok(false);
        }
        sleep(timings.settle_interval.max(MIN_SETTLE_INTERVAL)).await;
    }
}
