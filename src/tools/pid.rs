//! Liveness probe: is `(pid, pid_create_time)` still the live process that
//! first took a lock, or is it a stale artifact of a crash (or a different
//! process that reused the same pid)?
//!
//! PID plus process-creation-time is the only portable signal that
//! survives PID reuse; both values are sourced from the OS (`/proc`), not
//! from the lock file's own contents alone. This is the Rust analogue of
//! Python's `psutil.Process(pid).create_time()`.

use std::fs;

use anyhow::{bail, Context, Error};
use nix::sys::signal;
use nix::unistd::Pid;

/// Is a process with this pid currently alive? Uses `kill(pid, 0)`, the
/// standard existence probe that sends no actual signal.
pub fn pid_alive(pid: i32) -> bool {
    match signal::kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(nix::Error::Sys(nix::errno::Errno::EPERM)) => true, // exists, not ours
        Err(_) => false,
    }
}

/// The process's creation time, as floating seconds since the Unix epoch.
///
/// Reads `starttime` (field 22) out of `/proc/<pid>/stat` — in clock ticks
/// since boot — converts to seconds via `sysconf(_SC_CLK_TCK)`, then adds
/// the kernel boot time (`btime` in `/proc/stat`).
pub fn pid_create_time(pid: i32) -> Result<f64, Error> {
    let starttime_ticks = read_starttime_ticks(pid)
        .with_context(|| format!("failed to read starttime for pid {}", pid))?;

    let clk_tck = sysconf_clk_tck()?;
    let boot_time = read_boot_time().context("failed to read system boot time")?;

    Ok(boot_time + (starttime_ticks as f64 / clk_tck))
}

fn read_starttime_ticks(pid: i32) -> Result<u64, Error> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid))?;

    // The `comm` field is parenthesized and may itself contain spaces or
    // closing parens, so split on the *last* ')' rather than whitespace.
    let close = stat
        .rfind(')')
        .ok_or_else(|| anyhow::anyhow!("malformed /proc/{}/stat", pid))?;
    let rest = &stat[close + 1..];

    // `rest` starts with " state ppid pgrp session tty_nr tpgid flags
    // minflt cminflt majflt cmajflt utime stime cutime cstime priority
    // nice num_threads itrealvalue starttime ...` — starttime is field 22
    // overall, i.e. the 20th field after `comm`.
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let starttime = fields
        .get(19)
        .ok_or_else(|| anyhow::anyhow!("missing starttime field in /proc/{}/stat", pid))?;

    starttime
        .parse::<u64>()
        .with_context(|| format!("invalid starttime field {:?}", starttime))
}

fn read_boot_time() -> Result<f64, Error> {
    let stat = fs::read_to_string("/proc/stat")?;
    for line in stat.lines() {
        if let Some(rest) = line.strip_prefix("btime ") {
            return rest
                .trim()
                .parse::<f64>()
                .context("invalid btime in /proc/stat");
        }
    }
    bail!("no btime line in /proc/stat")
}

fn sysconf_clk_tck() -> Result<f64, Error> {
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks <= 0 {
        bail!("sysconf(_SC_CLK_TCK) returned {}", ticks);
    }
    Ok(ticks as f64)
}
