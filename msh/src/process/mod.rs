pub mod format;
pub mod job;
pub mod signal;
pub mod state;
pub mod wait;

pub use format::{ALL_JOBS, job_status_string, print_job_status, process_status_string};
pub use job::{ACTIVE_SLOT, Job, JobTable, Process};
pub use signal::{
    SignalBlockGuard, block_sigchld_and_sighup, install_sigchld_handler, signal_name,
    unblock_sigchld_and_sighup, wait_for_sigchld,
};
pub use state::{JobState, ProcessState, ProcessStatus};
pub use wait::{calc_status, calc_status_of_job, reap_children, wait_for_job};
