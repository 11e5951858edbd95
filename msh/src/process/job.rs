use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use tracing::debug;

use super::state::{JobState, ProcessState, ProcessStatus};

// Slot 0 holds the job being assembled; published job numbers start at 1.
pub const ACTIVE_SLOT: usize = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    // None: the command ran inside the shell, no child was ever forked
    pub pid: Option<Pid>,
    pub status: ProcessStatus,
    pub state: ProcessState,
    pub name: String,
}

impl Process {
    pub fn new(name: String, pid: Pid) -> Self {
        Process {
            pid: Some(pid),
            status: ProcessStatus::Pending,
            state: ProcessState::Running,
            name,
        }
    }

    pub fn in_shell(name: String, status: i32) -> Self {
        Process {
            pid: None,
            status: ProcessStatus::InShell(status),
            state: ProcessState::Done,
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    // pipeline order; the last process carries the job's exit status
    pub processes: Vec<Process>,
    pub state: JobState,
    pub status_changed: bool,
    pub loop_pipe: bool,
}

impl Job {
    pub fn new(processes: Vec<Process>) -> Self {
        debug_assert!(!processes.is_empty(), "job without processes");
        let state = aggregate_state(&processes);
        Job {
            processes,
            state,
            status_changed: false,
            loop_pipe: false,
        }
    }

    pub fn last_process(&self) -> &Process {
        self.processes.last().expect("job holds at least one process")
    }

    pub fn name(&self) -> String {
        if self.processes.len() == 1 {
            return self.processes[0].name.clone();
        }
        let mut name = String::new();
        if self.loop_pipe {
            name.push_str("| ");
        }
        for (i, process) in self.processes.iter().enumerate() {
            if i > 0 {
                name.push_str(" | ");
            }
            name.push_str(&process.name);
        }
        name
    }

    pub(crate) fn note_process_status(&mut self, pid: Pid, status: WaitStatus) -> bool {
        let Some(process) = self.processes.iter_mut().find(|p| p.pid == Some(pid)) else {
            return false;
        };
        process.status = ProcessStatus::Reported(status);
        if let Some(state) = ProcessStatus::derived_state(status)
            && state != process.state
        {
            debug!("process '{}' {} -> {}", process.name, process.state, state);
            process.state = state;
        }
        self.refresh_state();
        true
    }

    pub(crate) fn refresh_state(&mut self) {
        let state = aggregate_state(&self.processes);
        if state != self.state {
            debug!("job '{}' {} -> {}", self.name(), self.state, state);
            self.state = state;
            self.status_changed = true;
        }
    }
}

fn aggregate_state(processes: &[Process]) -> JobState {
    let mut any_stopped = false;
    for process in processes {
        match process.state {
            ProcessState::Running => return JobState::Running,
            ProcessState::Stopped => any_stopped = true,
            ProcessState::Done => {}
        }
    }
    if any_stopped {
        JobState::Stopped
    } else {
        JobState::Done
    }
}

#[derive(Debug)]
pub struct JobTable {
    slots: Vec<Option<Job>>,
    current: usize,
    previous: usize,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            slots: vec![None],
            current: 0,
            previous: 0,
        }
    }

    pub fn set_active(&mut self, job: Job) {
        debug_assert!(self.slots[ACTIVE_SLOT].is_none(), "active slot occupied");
        self.slots[ACTIVE_SLOT] = Some(job);
    }

    pub fn add_job(&mut self, make_current: bool) -> usize {
        let Some(job) = self.slots[ACTIVE_SLOT].take() else {
            debug_assert!(false, "no active job to publish");
            return ACTIVE_SLOT;
        };

        let jobnumber = match self.slots.iter().skip(1).position(|slot| slot.is_none()) {
            Some(free) => {
                let n = free + 1;
                self.slots[n] = Some(job);
                n
            }
            None => {
                self.slots.push(Some(job));
                self.slots.len() - 1
            }
        };

        if make_current || self.current == 0 {
            self.set_current(jobnumber);
        } else if self.previous == 0 {
            self.previous = jobnumber;
        }
        debug!(
            "add_job: job {jobnumber} published (current: {}, previous: {})",
            self.current, self.previous
        );
        jobnumber
    }

    pub fn get(&self, jobnumber: usize) -> Option<&Job> {
        self.slots.get(jobnumber)?.as_ref()
    }

    pub fn get_mut(&mut self, jobnumber: usize) -> Option<&mut Job> {
        self.slots.get_mut(jobnumber)?.as_mut()
    }

    pub fn remove(&mut self, jobnumber: usize) {
        if let Some(slot) = self.slots.get_mut(jobnumber)
            && slot.take().is_some()
        {
            debug!("remove: job {jobnumber} dropped");
        }
        self.trim();

        if jobnumber == self.current {
            self.current = self.previous;
            self.previous = self.find_next(self.current);
        } else if jobnumber == self.previous {
            self.previous = self.find_next(self.current);
        }
    }

    pub fn remove_all(&mut self) {
        let mut jobnumber = 0;
        while jobnumber < self.slots.len() {
            self.remove(jobnumber);
            jobnumber += 1;
        }
        self.trim();
        self.current = 0;
        self.previous = 0;
    }

    pub fn count(&self) -> usize {
        // an occupied active slot counts too
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn stopped_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|job| job.state == JobState::Stopped)
            .count()
    }

    pub fn current_jobnumber(&self) -> usize {
        self.current
    }

    pub fn previous_jobnumber(&self) -> usize {
        self.previous
    }

    // Label rules: a new current job demotes the old one to previous; when
    // the current job goes away the previous one takes over; restarting a
    // job resets both labels; waiting changes neither.
    pub fn set_current(&mut self, jobnumber: usize) {
        debug_assert!(
            jobnumber == 0 || self.get(jobnumber).is_some(),
            "stale job number {jobnumber}"
        );

        self.previous = self.current;
        let mut n = jobnumber;
        if n == 0 {
            n = self.previous;
            if n == 0 || self.get(n).is_none() {
                n = self.find_next(0);
            }
        }
        self.current = n;

        if self.previous == 0 || self.previous == self.current {
            self.previous = self.find_next(self.current);
        }
        debug!(
            "set_current: current: {}, previous: {}",
            self.current, self.previous
        );
    }

    // stopped jobs first, then any other job, highest number first; 0 if none
    pub(crate) fn find_next(&self, excluding: usize) -> usize {
        let mut n = self.slots.len();
        while n > 1 {
            n -= 1;
            if n != excluding
                && let Some(job) = self.get(n)
                && job.state == JobState::Stopped
            {
                return n;
            }
        }
        let mut n = self.slots.len();
        while n > 1 {
            n -= 1;
            if n != excluding && self.get(n).is_some() {
                return n;
            }
        }
        0
    }

    pub(crate) fn note_process_status(&mut self, pid: Pid, status: WaitStatus) -> bool {
        for job in self.slots.iter_mut().flatten() {
            if job.note_process_status(pid, status) {
                return true;
            }
        }
        false
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn trim(&mut self) {
        let mut tail = self.slots.len();
        while tail > 1 && self.slots[tail - 1].is_none() {
            tail -= 1;
        }
        self.slots.truncate(tail);
        if self.slots.capacity() > 20 && self.slots.capacity() / 2 > self.slots.len() {
            self.slots.shrink_to_fit();
        }
    }
}
