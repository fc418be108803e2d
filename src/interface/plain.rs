//! The plain test interface: any executable where success is purely a
//! matter of exit status. No native listing, no result protocol.

use std::path::Path;

use crate::model::{TestCase, TestCaseId, TestProgram};
use crate::process::{self, ProcessError, TerminationStatus};
use crate::result::TestResult;

use super::{InterfaceError, TestInterface, broken_for_status, child_env};

pub struct PlainInterface;

impl TestInterface for PlainInterface {
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
        Ok(vec![TestCase::from_properties(
            id,
            Default::default(),
        )?])
    }

    fn exec_test(
        &self,
        program: &TestProgram,
        _case_name: &str,
        vars: &[(String, String)],
        control_dir: &Path,
    ) -> ProcessError {
        let env = child_env(control_dir, vars);
        process::exec(program.path(), &[], &env)
    }

    fn compute_result(
        &self,
        status: Option<TerminationStatus>,
        _control_dir: &Path,
        _stdout_path: &Path,
        _stderr_path: &Path,
    ) -> TestResult {
        if let Some(broken) = broken_for_status(status) {
            return broken;
        }
        match status.and_then(|s| s.exit_code()) {
            Some(0) => TestResult::passed(),
            Some(code) => TestResult::failed(format!("Received exit code {code}")),
            None => unreachable!("non-signaled, non-timed-out status always has an exit code"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_zero_is_passed() {
        let r = PlainInterface.compute_result(
            Some(TerminationStatus::Exited(0)),
            Path::new("/tmp"),
            Path::new("/tmp/out"),
            Path::new("/tmp/err"),
        );
        assert_eq!(r, TestResult::passed());
    }

    #[test]
    fn nonzero_exit_is_failed() {
        let r = PlainInterface.compute_result(
            Some(TerminationStatus::Exited(1)),
            Path::new("/tmp"),
            Path::new("/tmp/out"),
            Path::new("/tmp/err"),
        );
        assert_eq!(r, TestResult::failed("Received exit code 1"));
    }

    #[test]
    fn signaled_is_broken() {
        let r = PlainInterface.compute_result(
            Some(TerminationStatus::Signaled {
                signal: 11,
                core_dumped: true,
            }),
            Path::new("/tmp"),
            Path::new("/tmp/out"),
            Path::new("/tmp/err"),
        );
        assert_eq!(r, TestResult::broken("Received signal 11"));
    }

    #[test]
    fn timed_out_is_broken() {
        let r = PlainInterface.compute_result(None, Path::new("/tmp"), Path::new("/tmp/out"), Path::new("/tmp/err"));
        assert_eq!(r, TestResult::broken("Test case timed out"));
    }
}
