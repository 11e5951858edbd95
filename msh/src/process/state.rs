use nix::sys::wait::WaitStatus;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProcessState {
    Running,
    Stopped,
    Done,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ProcessState::Running => formatter.write_str("running"),
            ProcessState::Stopped => formatter.write_str("stopped"),
            ProcessState::Done => formatter.write_str("done"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JobState {
    Running,
    Stopped,
    Done,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            JobState::Running => formatter.write_str("running"),
            JobState::Stopped => formatter.write_str("stopped"),
            JobState::Done => formatter.write_str("done"),
        }
    }
}

// Kernel reports are kept raw and decoded only where they are displayed or
// turned into exit statuses.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProcessStatus {
    Pending,
    Reported(WaitStatus),
    // exit status recorded directly; the process ran inside the shell
    InShell(i32),
}

impl ProcessStatus {
    pub(crate) fn derived_state(status: WaitStatus) -> Option<ProcessState> {
        match status {
            WaitStatus::Exited(..) | WaitStatus::Signaled(..) => Some(ProcessState::Done),
            WaitStatus::Stopped(..) => Some(ProcessState::Stopped),
            WaitStatus::Continued(..) => Some(ProcessState::Running),
            _ => None,
        }
    }
}
