use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, Result};
use msh_types::{MshError, TERMSIG_OFFSET};
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use tracing::{debug, error};

use super::job::{Job, JobTable};
use super::signal::{SignalBlockGuard, wait_for_sigchld};
use super::state::{JobState, ProcessState, ProcessStatus};

// WCONTINUED may be defined yet rejected by waitpid at run time; once that
// happens the flag is dropped for the rest of the process and resumptions
// go unreported.
static WCONTINUED_REJECTED: AtomicBool = AtomicBool::new(false);

fn wait_flags() -> WaitPidFlag {
    let mut flags = WaitPidFlag::WUNTRACED | WaitPidFlag::WNOHANG;
    if !WCONTINUED_REJECTED.load(Ordering::Relaxed) {
        flags |= WaitPidFlag::WCONTINUED;
    }
    flags
}

pub fn reap_children(table: &mut JobTable) {
    loop {
        let status = match waitpid(None, Some(wait_flags())) {
            Ok(WaitStatus::StillAlive) => return,
            Ok(status) => status,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return,
            Err(Errno::EINVAL) if !WCONTINUED_REJECTED.swap(true, Ordering::Relaxed) => {
                debug!("waitpid rejected WCONTINUED, retrying without it");
                continue;
            }
            Err(err) => {
                error!("waitpid: {err}");
                return;
            }
        };
        let Some(pid) = status.pid() else {
            return;
        };
        if table.note_process_status(pid, status) {
            debug!("reaped pid {pid}: {status:?}");
        } else {
            debug!("ignoring event for unmanaged pid {pid}");
        }
    }
}

pub fn wait_for_job(table: &mut JobTable, jobnumber: usize, return_on_stop: bool) -> Result<()> {
    if table.get(jobnumber).is_none() {
        return Err(MshError::job(format!("no such job: %{jobnumber}")).into());
    }

    let _guard = SignalBlockGuard::new().context("failed to block SIGCHLD and SIGHUP")?;
    loop {
        reap_children(table);
        match table.get(jobnumber).map(|job| job.state) {
            None | Some(JobState::Done) => return Ok(()),
            Some(JobState::Stopped) if return_on_stop => return Ok(()),
            _ => wait_for_sigchld().context("failed while waiting for SIGCHLD")?,
        }
    }
}

pub fn calc_status(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => signal as i32 + TERMSIG_OFFSET,
        WaitStatus::Stopped(_, signal) => signal as i32 + TERMSIG_OFFSET,
        WaitStatus::Continued(_) => 0,
        status => {
            debug_assert!(false, "no exit status in wait report {status:?}");
            0
        }
    }
}

pub fn calc_status_of_job(job: &Job) -> i32 {
    match job.state {
        JobState::Done => match job.last_process().status {
            ProcessStatus::InShell(status) => status,
            ProcessStatus::Reported(status) => calc_status(status),
            ProcessStatus::Pending => {
                debug_assert!(false, "finished job without a reported status");
                0
            }
        },
        JobState::Stopped => {
            for process in job.processes.iter().rev() {
                if process.state == ProcessState::Stopped
                    && let ProcessStatus::Reported(status) = process.status
                {
                    return calc_status(status);
                }
            }
            debug_assert!(false, "stopped job without a stopped process");
            0
        }
        JobState::Running => {
            debug_assert!(false, "exit status requested for a running job");
            0
        }
    }
}
