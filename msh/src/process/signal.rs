use std::sync::atomic::{AtomicBool, Ordering};

use msh_types::MshResult;
use nix::errno::Errno;
use nix::sys::signal::{
    SaFlags, SigAction, SigHandler, SigSet, Signal, SigmaskHow, sigaction, sigprocmask,
};
use tracing::debug;

static RECEIVED_SIGCHLD: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigchld(_: i32) {
    RECEIVED_SIGCHLD.store(true, Ordering::SeqCst);
}

// The handler only raises a flag; children are reaped outside signal context.
pub fn install_sigchld_handler() -> MshResult<()> {
    let handler = SigHandler::Handler(handle_sigchld);
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    unsafe {
        sigaction(Signal::SIGCHLD, &action)?;
    }
    Ok(())
}

fn job_signal_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGCHLD);
    set.add(Signal::SIGHUP);
    set
}

pub fn block_sigchld_and_sighup() -> MshResult<()> {
    sigprocmask(SigmaskHow::SIG_BLOCK, Some(&job_signal_set()), None)?;
    Ok(())
}

pub fn unblock_sigchld_and_sighup() -> MshResult<()> {
    sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&job_signal_set()), None)?;
    Ok(())
}

pub struct SignalBlockGuard(());

impl SignalBlockGuard {
    pub fn new() -> MshResult<Self> {
        block_sigchld_and_sighup()?;
        Ok(SignalBlockGuard(()))
    }
}

impl Drop for SignalBlockGuard {
    fn drop(&mut self) {
        // Best-effort restore.
        let _ = unblock_sigchld_and_sighup();
    }
}

pub fn wait_for_sigchld() -> MshResult<()> {
    // sigsuspend opens the SIGCHLD window atomically, so a delivery between
    // the caller's state check and the sleep is never lost
    let mut mask = SigSet::empty();
    sigprocmask(SigmaskHow::SIG_BLOCK, None, Some(&mut mask))?;
    mask.remove(Signal::SIGCHLD);
    loop {
        if RECEIVED_SIGCHLD.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("suspending until SIGCHLD");
        match mask.suspend() {
            Ok(()) | Err(Errno::EINTR) => {}
            Err(err) => return Err(err.into()),
        }
    }
}

pub fn signal_name(signal: Signal) -> &'static str {
    signal.as_str().strip_prefix("SIG").unwrap_or(signal.as_str())
}
