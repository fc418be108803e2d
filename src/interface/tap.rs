//! The TAP test interface.
//!
//! TAP has no native listing, so [`parse_list`] always fabricates a single
//! `main` test case. Running a TAP test case is a double fork: the outer
//! child (this process, post-fork from the runner) forks again to exec the
//! real test binary, tees its merged stdout/stderr into both the real
//! stdout and a capture file, then terminates itself with the inner
//! child's exact termination status so the runner sees the real outcome.
//! TAP itself has no stderr channel, so the real stderr is reused to warn
//! that it was merged into stdout.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::os::fd::{FromRawFd, IntoRawFd};
use std::path::Path;

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::{self, ForkResult};

use crate::model::{TestCase, TestCaseId, TestProgram};
use crate::process::{self, ProcessError, TerminationStatus};
use crate::result::TestResult;
use crate::tap::{TapSummary, parse_tap};

use super::{InterfaceError, TestInterface, broken_for_status, child_env};

const TAP_OUTPUT_NAME: &str = "tap-output.txt";

const TAP_STDERR_WARNING: &str = "(Due to a known shortcoming in the Kyua TAP interface, \
the stderr output of the TAP test program was merged into the stdout output.)\n";

pub struct TapInterface;

impl TestInterface for TapInterface {
    fn exec_list(&self, _program: &TestProgram, _vars: &[(String, String)]) -> ProcessError {
        std::process::exit(0)
    }

    fn parse_list(
        &self,
        program: &TestProgram,
        _status: Option<TerminationStatus>,
        _stdout_path: &Path,
        _stderr_path: &Path,
    ) -> Result<Vec<TestCase>, InterfaceError> {
        let id = TestCaseId::new(program.path(), "main")?;
        Ok(vec![TestCase::from_properties(id, Default::default())?])
    }

    fn exec_test(
        &self,
        program: &TestProgram,
        _case_name: &str,
        vars: &[(String, String)],
        control_dir: &Path,
    ) -> ProcessError {
        let tap_output_path = control_dir.join(TAP_OUTPUT_NAME);
        let mut tap_file = match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tap_output_path)
        {
            Ok(f) => f,
            Err(e) => return ProcessError::Io(e),
        };

        let (read_end, write_end) = match unistd::pipe() {
            Ok(p) => p,
            Err(e) => return ProcessError::Fork(e),
        };

        match unsafe { unistd::fork() } {
            Err(e) => ProcessError::Fork(e),
            Ok(ForkResult::Child) => {
                drop(read_end);
                let write_fd = write_end.into_raw_fd();
                if unistd::dup2(write_fd, 1).is_err() || unistd::dup2(write_fd, 2).is_err() {
                    std::process::exit(127);
                }
                let _ = unistd::close(write_fd);
                let env = child_env(control_dir, vars);
                let err = process::exec(program.path(), &[], &env);
                eprintln!("kyua: {err}");
                std::process::exit(127);
            }
            Ok(ForkResult::Parent { child }) => {
                drop(write_end);
                let read_fd = read_end.into_raw_fd();
                let reader = BufReader::new(unsafe { File::from_raw_fd(read_fd) });
                for line in reader.lines() {
                    let line = match line {
                        Ok(l) => l,
                        Err(_) => break,
                    };
                    let _ = writeln!(tap_file, "{line}");
                    println!("{line}");
                }
                eprint!("{TAP_STDERR_WARNING}");

                match process::wait_for_termination(child) {
                    Ok(status) => terminate_self_with(status),
                    Err(e) => e,
                }
            }
        }
    }

    fn compute_result(
        &self,
        status: Option<TerminationStatus>,
        control_dir: &Path,
        _stdout_path: &Path,
        _stderr_path: &Path,
    ) -> TestResult {
        if let Some(broken) = broken_for_status(status) {
            return broken;
        }

        let tap_path = control_dir.join(TAP_OUTPUT_NAME);
        let file = match File::open(&tap_path) {
            Ok(f) => f,
            Err(e) => {
                return TestResult::broken(format!("TAP test program yielded invalid data: {e}"));
            }
        };
        let summary = match parse_tap(BufReader::new(file)) {
            Ok(s) => s,
            Err(e) => {
                return TestResult::broken(format!("TAP test program yielded invalid data: {e}"));
            }
        };
        tap_to_result(&summary, status)
    }
}

fn tap_to_result(summary: &TapSummary, status: Option<TerminationStatus>) -> TestResult {
    if summary.bailed_out() {
        return TestResult::failed("Bailed out");
    }
    if let Some(reason) = summary.all_skipped_reason() {
        return TestResult::skipped(reason.to_string());
    }
    let exit_code = status.and_then(|s| s.exit_code());
    if summary.not_ok_count() == 0 {
        return match exit_code {
            Some(0) => TestResult::passed(),
            Some(code) => TestResult::broken(format!(
                "Dubious test program: reported all tests as passed but returned exit code {code}"
            )),
            None => TestResult::broken("Test case timed out"),
        };
    }
    TestResult::failed(format!(
        "{} of {} tests failed",
        summary.not_ok_count(),
        summary.total()
    ))
}

/// Terminates the calling process with exactly the same status as `status`
/// so the outer runner observes the real test binary's outcome.
fn terminate_self_with(status: TerminationStatus) -> ProcessError {
    match status {
        TerminationStatus::Exited(code) => std::process::exit(code),
        TerminationStatus::Signaled { signal, .. } => {
            if let Ok(sig) = Signal::try_from(signal) {
                let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
                let _ = unsafe { nix::sys::signal::sigaction(sig, &default) };
                let _ = nix::sys::signal::raise(sig);
            }
            std::process::exit(128 + signal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tap::parse_tap;
    use std::io::Cursor;

    fn summary(input: &str) -> TapSummary {
        parse_tap(Cursor::new(input)).unwrap()
    }

    #[test]
    fn all_pass_classifies_as_passed() {
        let s = summary("1..2\nok 1\nok 2\n");
        let r = tap_to_result(&s, Some(TerminationStatus::Exited(0)));
        assert_eq!(r, TestResult::passed());
    }

    #[test]
    fn all_pass_but_nonzero_exit_is_dubious() {
        let s = summary("1..2\nok 1\nok 2\n");
        let r = tap_to_result(&s, Some(TerminationStatus::Exited(1)));
        assert_eq!(
            r,
            TestResult::broken(
                "Dubious test program: reported all tests as passed but returned exit code 1"
            )
        );
    }

    #[test]
    fn some_failures_reports_counts() {
        let s = summary("1..2\nok 1\nnot ok 2\n");
        let r = tap_to_result(&s, Some(TerminationStatus::Exited(1)));
        assert_eq!(r, TestResult::failed("1 of 2 tests failed"));
    }

    #[test]
    fn all_skipped_plan_is_skipped() {
        let s = summary("1..0 # SKIP no hw\n");
        let r = tap_to_result(&s, Some(TerminationStatus::Exited(0)));
        assert_eq!(r, TestResult::skipped("no hw"));
    }

    #[test]
    fn bail_out_is_failed() {
        let s = summary("1..5\nok 1\nBail out! oops\n");
        let r = tap_to_result(&s, Some(TerminationStatus::Exited(1)));
        assert_eq!(r, TestResult::failed("Bailed out"));
    }
}
