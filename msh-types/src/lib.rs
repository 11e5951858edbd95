use nix::unistd::Pid;
use thiserror::Error;

/// Offset added to a signal number when it is reported as an exit status,
/// so that signal-derived statuses stay clear of the 0..=255 range used by
/// normal exit codes and of shell-internal statuses.
pub const TERMSIG_OFFSET: i32 = 384;

/// Shell core error types
#[derive(Error, Debug)]
pub enum MshError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("system call failed: {0}")]
    Sys(#[from] nix::errno::Errno),

    #[error("job control error: {message}")]
    Job { message: String },
}

impl MshError {
    pub fn job(message: impl Into<String>) -> Self {
        MshError::Job {
            message: message.into(),
        }
    }
}

pub type MshResult<T> = std::result::Result<T, MshError>;

/// Shell-wide configuration consumed by the job-control core.
///
/// Built once by the frontend and threaded through the executor. The core
/// only reads it; `posixly_correct` gates the strict POSIX rendering of
/// verbose job listings.
#[derive(Debug, Clone)]
pub struct Context {
    pub shell_pid: Pid,
    pub shell_pgid: Pid,
    pub interactive: bool,
    pub posixly_correct: bool,
}

impl Context {
    pub fn new(shell_pid: Pid, shell_pgid: Pid, interactive: bool) -> Self {
        Context {
            shell_pid,
            shell_pgid,
            interactive,
            posixly_correct: false,
        }
    }
}
