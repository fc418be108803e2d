//! Low-level subprocess primitives: fork, exec, and timeout-bounded wait.
//!
//! The runner needs to fork a child, point its stdout/stderr at capture
//! files, exec the test program, and then wait for it with a timeout that
//! can escalate from `SIGTERM` to `SIGKILL`. This module isolates the
//! `nix` calls that do that so the rest of the crate never touches raw
//! file descriptors.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

/// Grace period between `SIGTERM` and `SIGKILL` when a test case times out.
pub const TERMINATION_GRACE_PERIOD: Duration = Duration::from_secs(5);

const WATCHDOG_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("fork failed: {0}")]
    Fork(nix::errno::Errno),

    #[error("exec failed: {0}")]
    Exec(nix::errno::Errno),

    #[error("wait failed: {0}")]
    Wait(nix::errno::Errno),

    #[error("signal delivery failed: {0}")]
    Signal(nix::errno::Errno),

    #[error("failed to redirect a standard stream: {0}")]
    Dup2(nix::errno::Errno),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path or argument contains a NUL byte: {0}")]
    NulByte(#[from] std::ffi::NulError),
}

/// The reason a child process stopped running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    Exited(i32),
    Signaled { signal: i32, core_dumped: bool },
}

impl TerminationStatus {
    fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(TerminationStatus::Exited(code)),
            WaitStatus::Signaled(_, sig, core_dumped) => Some(TerminationStatus::Signaled {
                signal: sig as i32,
                core_dumped,
            }),
            _ => None,
        }
    }

    pub fn signaled(&self) -> bool {
        matches!(self, TerminationStatus::Signaled { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TerminationStatus::Exited(code) => Some(*code),
            TerminationStatus::Signaled { .. } => None,
        }
    }
}

/// Builds a null-terminated argv/envp compatible with [`unistd::execve`].
pub fn build_execve_args(
    program: &Path,
    args: &[String],
) -> Result<(CString, Vec<CString>), ProcessError> {
    let path = CString::new(program.as_os_str().as_encoded_bytes())?;
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push(CString::new(program.as_os_str().as_encoded_bytes())?);
    for arg in args {
        argv.push(CString::new(arg.as_bytes())?);
    }
    Ok((path, argv))
}

/// Builds the child's envp by layering `vars` on top of the inherited
/// environment, so `PATH`, `HOME`, and locale variables still reach the
/// test program unless a caller explicitly overrides them.
pub fn build_envp(vars: &[(String, String)]) -> Result<Vec<CString>, ProcessError> {
    let mut merged: std::collections::BTreeMap<String, String> = std::env::vars().collect();
    for (k, v) in vars {
        merged.insert(k.clone(), v.clone());
    }
    merged
        .into_iter()
        .map(|(k, v)| CString::new(format!("{k}={v}")).map_err(ProcessError::from))
        .collect()
}

fn redirect(path: &Path, target_fd: i32) -> Result<(), ProcessError> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    unistd::dup2(file.as_raw_fd(), target_fd).map_err(ProcessError::Dup2)?;
    Ok(())
}

/// Forks a child that redirects its stdout/stderr to `stdout_path`/
/// `stderr_path`, becomes its own process-group leader, and then invokes
/// `run_child`.
///
/// `run_child` is expected to either `execve` (never returning) or exit the
/// process itself; if it returns at all, the child reports the returned
/// error and exits with status 127. The parent returns the child's pid.
///
/// # Safety
///
/// Calls `fork(2)`. The caller must ensure the closure executed in the
/// child only performs async-signal-safe operations before exec'ing or
/// exiting, per the usual fork-in-a-multithreaded-process caveats.
pub unsafe fn fork_and_exec(
    stdout_path: &Path,
    stderr_path: &Path,
    run_child: impl FnOnce() -> ProcessError,
) -> Result<Pid, ProcessError> {
    match unsafe { unistd::fork() }.map_err(ProcessError::Fork)? {
        ForkResult::Parent { child } => Ok(child),
        ForkResult::Child => {
            let _ = unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0));
            if let Err(e) = redirect(stdout_path, libc_stdout_fd()) {
                eprintln!("kyua: failed to redirect stdout: {e}");
                std::process::exit(127);
            }
            if let Err(e) = redirect(stderr_path, libc_stderr_fd()) {
                eprintln!("kyua: failed to redirect stderr: {e}");
                std::process::exit(127);
            }
            let err = run_child();
            eprintln!("kyua: {err}");
            std::process::exit(127);
        }
    }
}

fn libc_stdout_fd() -> i32 {
    1
}

fn libc_stderr_fd() -> i32 {
    2
}

/// Executes `program` with `args` and `envp` in the calling process,
/// retrying on `EINTR` as recommended by `execve(2)`.
pub fn exec(program: &Path, args: &[String], vars: &[(String, String)]) -> ProcessError {
    let (path, argv) = match build_execve_args(program, args) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let envp = match build_envp(vars) {
        Ok(v) => v,
        Err(e) => return e,
    };
    loop {
        match unistd::execve(&path, &argv, &envp) {
            Err(nix::errno::Errno::EINTR) => continue,
            Err(errno) => return ProcessError::Exec(errno),
            Ok(_) => unreachable!("execve only returns on error"),
        }
    }
}

fn waitpid_retrying(pid: Pid) -> Result<WaitStatus, ProcessError> {
    loop {
        match wait::waitpid(pid, None) {
            Err(nix::errno::Errno::EINTR) => continue,
            Err(errno) => return Err(ProcessError::Wait(errno)),
            Ok(status) => return Ok(status),
        }
    }
}

/// Waits unconditionally (no timeout) for `pid` to terminate. Used by the
/// TAP interface's inner fork, which waits on the real test binary before
/// terminating itself with the same status.
pub fn wait_for_termination(pid: Pid) -> Result<TerminationStatus, ProcessError> {
    let status = waitpid_retrying(pid)?;
    TerminationStatus::from_wait_status(status)
        .ok_or_else(|| ProcessError::Wait(nix::errno::Errno::ECHILD))
}

/// Waits for `pid` to terminate, escalating to `SIGTERM` then `SIGKILL`
/// (after [`TERMINATION_GRACE_PERIOD`]) if it outlives `timeout`.
///
/// Returns `Ok(None)` if the process had to be killed after timing out;
/// the caller should treat this as "status absent" per the result
/// classification rules, not as an ordinary signaled termination.
pub fn wait_with_timeout(
    pid: Pid,
    timeout: Duration,
) -> Result<Option<TerminationStatus>, ProcessError> {
    let reaped = Arc::new(AtomicBool::new(false));
    let timed_out = Arc::new(AtomicBool::new(false));

    let watchdog = {
        let reaped = Arc::clone(&reaped);
        let timed_out = Arc::clone(&timed_out);
        std::thread::spawn(move || {
            let deadline = Instant::now() + timeout;
            while Instant::now() < deadline {
                if reaped.load(Ordering::Acquire) {
                    return;
                }
                std::thread::sleep(WATCHDOG_POLL_INTERVAL.min(timeout));
            }
            if reaped.load(Ordering::Acquire) {
                return;
            }
            timed_out.store(true, Ordering::Release);
            let _ = signal::killpg(pid, Signal::SIGTERM);

            let grace_deadline = Instant::now() + TERMINATION_GRACE_PERIOD;
            while Instant::now() < grace_deadline {
                if reaped.load(Ordering::Acquire) {
                    return;
                }
                std::thread::sleep(WATCHDOG_POLL_INTERVAL);
            }
            if !reaped.load(Ordering::Acquire) {
                let _ = signal::killpg(pid, Signal::SIGKILL);
            }
        })
    };

    let status = waitpid_retrying(pid);
    reaped.store(true, Ordering::Release);
    let _ = watchdog.join();

    let status = status?;
    if timed_out.load(Ordering::Acquire) {
        return Ok(None);
    }
    Ok(TerminationStatus::from_wait_status(status))
}

/// Sends `SIGTERM` then, after the grace period, `SIGKILL` to `pid`'s
/// process group. Used for run-level interruption (e.g. on `SIGINT`).
pub fn terminate_process_group(pid: Pid) -> Result<(), ProcessError> {
    signal::killpg(pid, Signal::SIGTERM).map_err(ProcessError::Signal)?;
    std::thread::sleep(TERMINATION_GRACE_PERIOD);
    let _ = signal::killpg(pid, Signal::SIGKILL);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn termination_status_accessors() {
        let exited = TerminationStatus::Exited(3);
        assert_eq!(exited.exit_code(), Some(3));
        assert!(!exited.signaled());

        let signaled = TerminationStatus::Signaled {
            signal: 11,
            core_dumped: true,
        };
        assert!(signaled.signaled());
        assert_eq!(signaled.exit_code(), None);
    }

    #[test]
    fn build_execve_args_rejects_interior_nul() {
        let program = PathBuf::from("/bin/true");
        let args = vec!["bad\0arg".to_string()];
        assert!(build_execve_args(&program, &args).is_err());
    }

    #[test]
    fn build_envp_formats_key_value_pairs() {
        let vars = vec![("TEST_ENV_FOO".to_string(), "bar".to_string())];
        let envp = build_envp(&vars).unwrap();
        assert!(envp.iter().any(|e| e.to_str().unwrap() == "TEST_ENV_FOO=bar"));
    }

    #[test]
    fn build_envp_preserves_inherited_path() {
        let envp = build_envp(&[]).unwrap();
        assert!(envp.iter().any(|e| e.to_str().unwrap().starts_with("PATH=")));
    }

    #[test]
    fn run_and_wait_short_lived_process() {
        let dir = tempfile::tempdir().unwrap();
        let stdout_path = dir.path().join("stdout");
        let stderr_path = dir.path().join("stderr");

        let program = PathBuf::from("/bin/sh");
        let args = vec!["-c".to_string(), "exit 7".to_string()];

        let pid = unsafe {
            fork_and_exec(&stdout_path, &stderr_path, || {
                exec(&program, &args, &[])
            })
        }
        .unwrap();

        let status = wait_with_timeout(pid, Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert_eq!(status.exit_code(), Some(7));
    }

    #[test]
    fn timeout_kills_a_runaway_process() {
        let dir = tempfile::tempdir().unwrap();
        let stdout_path = dir.path().join("stdout");
        let stderr_path = dir.path().join("stderr");

        let program = PathBuf::from("/bin/sh");
        let args = vec!["-c".to_string(), "sleep 30".to_string()];

        let pid = unsafe {
            fork_and_exec(&stdout_path, &stderr_path, || {
                exec(&program, &args, &[])
            })
        }
        .unwrap();

        let status = wait_with_timeout(pid, Duration::from_millis(200)).unwrap();
        assert!(status.is_none());
    }
}
