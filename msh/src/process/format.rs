use std::io::Write;

use anyhow::{Context as _, Result};
use msh_types::Context;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use tracing::debug;

use super::job::{Job, JobTable, Process};
use super::signal::signal_name;
use super::state::{JobState, ProcessState, ProcessStatus};

/// Selector meaning "every job in the table".
pub const ALL_JOBS: usize = usize::MAX;

// "Running", "Stopped(SIGTSTP)", "Done(1)", "Killed (SIGSEGV: core dumped)"
pub fn process_status_string(process: &Process) -> String {
    match process.state {
        ProcessState::Running => "Running".to_string(),
        ProcessState::Stopped => match process.status {
            ProcessStatus::Reported(WaitStatus::Stopped(_, signal)) => {
                format!("Stopped(SIG{})", signal_name(signal))
            }
            status => {
                debug_assert!(false, "stopped process carries status {status:?}");
                "Stopped".to_string()
            }
        },
        ProcessState::Done => match process.status {
            ProcessStatus::InShell(0) => "Done".to_string(),
            ProcessStatus::InShell(status) => format!("Done({status})"),
            ProcessStatus::Reported(WaitStatus::Exited(_, 0)) => "Done".to_string(),
            ProcessStatus::Reported(WaitStatus::Exited(_, code)) => format!("Done({code})"),
            ProcessStatus::Reported(WaitStatus::Signaled(_, signal, core_dumped)) => {
                if core_dumped {
                    format!("Killed (SIG{}: core dumped)", signal_name(signal))
                } else {
                    format!("Killed (SIG{})", signal_name(signal))
                }
            }
            status => {
                debug_assert!(false, "finished process carries status {status:?}");
                "Done".to_string()
            }
        },
    }
}

pub fn job_status_string(job: &Job) -> String {
    match job.state {
        JobState::Running => "Running".to_string(),
        JobState::Stopped => {
            for process in job.processes.iter().rev() {
                if process.state == ProcessState::Stopped {
                    return process_status_string(process);
                }
            }
            debug_assert!(false, "stopped job without a stopped process");
            "Stopped".to_string()
        }
        JobState::Done => process_status_string(job.last_process()),
    }
}

fn display_pid(process: &Process) -> i32 {
    process.pid.map(Pid::as_raw).unwrap_or(0)
}

/// Prints job status in the POSIX `jobs` format. A job printed as
/// finished is removed from the table, so jobs stay observable until their
/// final state has been reported.
pub fn print_job_status(
    table: &mut JobTable,
    jobnumber: usize,
    changed_only: bool,
    verbose: bool,
    ctx: &Context,
    out: &mut impl Write,
) -> Result<()> {
    if jobnumber == ALL_JOBS {
        let mut n = 1;
        while n < table.slot_count() {
            print_job_status(table, n, changed_only, verbose, ctx, out)?;
            n += 1;
        }
        return Ok(());
    }

    let current = table.current_jobnumber();
    let previous = table.previous_jobnumber();
    let Some(job) = table.get(jobnumber) else {
        return Ok(());
    };
    if changed_only && !job.status_changed {
        return Ok(());
    }

    let marker = if jobnumber == current {
        '+'
    } else if jobnumber == previous {
        '-'
    } else {
        ' '
    };

    if !verbose {
        writeln!(
            out,
            "[{}] {} {:<20} {}",
            jobnumber,
            marker,
            job_status_string(job),
            job.name()
        )
        .context("failed to write job status")?;
    } else {
        let first = &job.processes[0];
        writeln!(
            out,
            "[{}] {} {:>5} {:<20} {} {}",
            jobnumber,
            marker,
            display_pid(first),
            process_status_string(first),
            if job.loop_pipe { '|' } else { ' ' },
            first.name
        )
        .context("failed to write job status")?;

        for process in &job.processes[1..] {
            let status = if ctx.posixly_correct {
                String::new()
            } else {
                process_status_string(process)
            };
            writeln!(
                out,
                "      {:>5} {:<20} | {}",
                display_pid(process),
                status,
                process.name
            )
            .context("failed to write job status")?;
        }
    }

    let finished = job.state == JobState::Done;
    if let Some(job) = table.get_mut(jobnumber) {
        job.status_changed = false;
    }
    if finished {
        debug!("print_job_status: collecting finished job {jobnumber}");
        table.remove(jobnumber);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;
    use nix::unistd::getpid;

    fn init() {
        let _ = tracing_subscriber::fmt::try_init();
    }

    fn ctx() -> Context {
        Context::new(getpid(), getpid(), true)
    }

    fn running_job(name: &str, pid: i32) -> Job {
        Job::new(vec![Process::new(name.to_string(), Pid::from_raw(pid))])
    }

    fn publish(table: &mut JobTable, job: Job, make_current: bool) -> usize {
        table.set_active(job);
        table.add_job(make_current)
    }

    fn report(table: &mut JobTable, pid: i32, status: WaitStatus) {
        assert!(table.note_process_status(Pid::from_raw(pid), status));
    }

    fn printed(
        table: &mut JobTable,
        jobnumber: usize,
        changed_only: bool,
        verbose: bool,
        ctx: &Context,
    ) -> String {
        let mut out = Vec::new();
        print_job_status(table, jobnumber, changed_only, verbose, ctx, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn process_status_strings() {
        init();
        let pid = Pid::from_raw(300);
        let mut process = Process::new("cmd".to_string(), pid);
        assert_eq!(process_status_string(&process), "Running");

        process.state = ProcessState::Stopped;
        process.status = ProcessStatus::Reported(WaitStatus::Stopped(pid, Signal::SIGTSTP));
        assert_eq!(process_status_string(&process), "Stopped(SIGTSTP)");

        process.state = ProcessState::Done;
        process.status = ProcessStatus::Reported(WaitStatus::Exited(pid, 0));
        assert_eq!(process_status_string(&process), "Done");
        process.status = ProcessStatus::Reported(WaitStatus::Exited(pid, 2));
        assert_eq!(process_status_string(&process), "Done(2)");
        process.status = ProcessStatus::Reported(WaitStatus::Signaled(pid, Signal::SIGTERM, false));
        assert_eq!(process_status_string(&process), "Killed (SIGTERM)");
        process.status = ProcessStatus::Reported(WaitStatus::Signaled(pid, Signal::SIGSEGV, true));
        assert_eq!(
            process_status_string(&process),
            "Killed (SIGSEGV: core dumped)"
        );

        let in_shell = Process::in_shell("true".to_string(), 0);
        assert_eq!(process_status_string(&in_shell), "Done");
        let in_shell = Process::in_shell("false".to_string(), 1);
        assert_eq!(process_status_string(&in_shell), "Done(1)");
    }

    #[test]
    fn finishing_job_is_printed_once_and_collected() {
        init();
        let ctx = ctx();
        let mut table = JobTable::new();
        publish(&mut table, running_job("sleep 10", 101), false);
        publish(&mut table, running_job("make", 102), true);
        report(&mut table, 102, WaitStatus::Exited(Pid::from_raw(102), 0));
        assert!(table.get(2).unwrap().status_changed);

        let output = printed(&mut table, ALL_JOBS, false, false, &ctx);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("[1] - {:<20} {}", "Running", "sleep 10"));
        assert_eq!(lines[1], format!("[2] + {:<20} {}", "Done", "make"));

        // the finished job is gone and the labels have moved
        assert!(table.get(2).is_none());
        assert_eq!(table.current_jobnumber(), 1);
        assert_eq!(table.previous_jobnumber(), 0);
        assert!(table.get(1).is_some());
    }

    #[test]
    fn stopped_job_is_reported_and_retained() {
        init();
        let ctx = ctx();
        let mut table = JobTable::new();
        publish(&mut table, running_job("sleep 10", 101), false);
        report(
            &mut table,
            101,
            WaitStatus::Stopped(Pid::from_raw(101), Signal::SIGTSTP),
        );

        let output = printed(&mut table, ALL_JOBS, true, false, &ctx);
        assert_eq!(
            output,
            format!("[1] + {:<20} {}\n", "Stopped(SIGTSTP)", "sleep 10")
        );

        // retained, flag cleared: a second changed-only pass is silent
        assert!(table.get(1).is_some());
        assert!(!table.get(1).unwrap().status_changed);
        let output = printed(&mut table, ALL_JOBS, true, false, &ctx);
        assert!(output.is_empty());
    }

    #[test]
    fn missing_job_prints_nothing() {
        init();
        let ctx = ctx();
        let mut table = JobTable::new();
        publish(&mut table, running_job("sleep 10", 101), false);
        assert!(printed(&mut table, 9, false, false, &ctx).is_empty());
    }

    #[test]
    fn verbose_listing_is_process_wise() {
        init();
        let ctx = ctx();
        let mut table = JobTable::new();
        let mut job = Job::new(vec![
            Process::new("cat file".to_string(), Pid::from_raw(201)),
            Process::new("less".to_string(), Pid::from_raw(202)),
        ]);
        job.loop_pipe = true;
        publish(&mut table, job, false);

        let output = printed(&mut table, 1, false, true, &ctx);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines[0],
            format!("[1] + {:>5} {:<20} | {}", 201, "Running", "cat file")
        );
        assert_eq!(
            lines[1],
            format!("      {:>5} {:<20} | {}", 202, "Running", "less")
        );
    }

    #[test]
    fn posix_mode_blanks_continuation_status_but_keeps_the_column() {
        init();
        let mut ctx = ctx();
        ctx.posixly_correct = true;
        let mut table = JobTable::new();
        publish(
            &mut table,
            Job::new(vec![
                Process::new("cat file".to_string(), Pid::from_raw(201)),
                Process::new("less".to_string(), Pid::from_raw(202)),
            ]),
            false,
        );

        let output = printed(&mut table, 1, false, true, &ctx);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines[1],
            format!("      {:>5} {:<20} | {}", 202, "", "less")
        );
    }

    #[test]
    fn in_shell_process_prints_pid_zero_in_verbose_mode() {
        init();
        let ctx = ctx();
        let mut table = JobTable::new();
        publish(
            &mut table,
            Job::new(vec![Process::in_shell("true".to_string(), 0)]),
            false,
        );

        let output = printed(&mut table, 1, false, true, &ctx);
        assert_eq!(
            output,
            format!("[1] + {:>5} {:<20}   {}\n", 0, "Done", "true")
        );
    }
}
