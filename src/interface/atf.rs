//! The ATF test interface: native `-l` listing and `-r <resfile>` result
//! reporting.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use crate::listing;
use crate::model::{TestCase, TestProgram};
use crate::process::{self, ProcessError, TerminationStatus};
use crate::result::TestResult;

use super::{InterfaceError, TestInterface, broken_for_status, child_env};

const RESULT_FILE_NAME: &str = "result";

pub struct AtfInterface;

impl TestInterface for AtfInterface {
    fn exec_list(&self, program: &TestProgram, vars: &[(String, String)]) -> ProcessError {
        process::exec(program.path(), &["-l".to_string()], vars)
    }

    fn parse_list(
        &self,
        program: &TestProgram,
        status: Option<TerminationStatus>,
        stdout_path: &Path,
        _stderr_path: &Path,
    ) -> Result<Vec<TestCase>, InterfaceError> {
        match status {
            Some(TerminationStatus::Exited(0)) => {}
            _ => return Err(InterfaceError::ExecFailed("test program failed".to_string())),
        }
        let file = File::open(stdout_path)?;
        let cases = listing::parse_test_cases(program.path(), BufReader::new(file))?;
        Ok(cases)
    }

    fn exec_test(
        &self,
        program: &TestProgram,
        _case_name: &str,
        vars: &[(String, String)],
        control_dir: &Path,
    ) -> ProcessError {
        let resfile = control_dir.join(RESULT_FILE_NAME);
        let arg = format!("-r{}", resfile.display());
        let env = child_env(control_dir, vars);
        process::exec(program.path(), &[arg], &env)
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

        let result_path = control_dir.join(RESULT_FILE_NAME);
        let contents = match fs::read_to_string(&result_path) {
            Ok(c) => c,
            Err(_) => {
                let code = status.and_then(|s| s.exit_code()).unwrap_or(-1);
                return TestResult::broken(format!(
                    "Premature exit; test case exited with code {code}"
                ));
            }
        };

        match parse_result_file(&contents) {
            Ok(result) => result,
            Err(detail) => {
                TestResult::broken(format!("Test case result file is invalid: {detail}"))
            }
        }
    }
}

fn parse_result_file(contents: &str) -> Result<TestResult, String> {
    let line = contents.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return Err("empty result file".to_string());
    }
    let (kind, reason) = match line.split_once(':') {
        Some((kind, reason)) => (kind.trim(), Some(reason.trim().to_string())),
        None => (line, None),
    };
    TestResult::from_kind_and_reason(kind, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_passed_result_file() {
        let r = parse_result_file("passed\n").unwrap();
        assert_eq!(r, TestResult::passed());
    }

    #[test]
    fn passed_with_reason_is_rejected() {
        assert!(parse_result_file("passed: oops\n").is_err());
    }

    #[test]
    fn parses_failed_with_reason() {
        let r = parse_result_file("failed: assertion failed\n").unwrap();
        assert_eq!(r, TestResult::failed("assertion failed"));
    }

    #[test]
    fn missing_result_file_is_broken_with_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let r = AtfInterface.compute_result(
            Some(TerminationStatus::Exited(1)),
            dir.path(),
            Path::new("/dev/null"),
            Path::new("/dev/null"),
        );
        assert_eq!(
            r,
            TestResult::broken("Premature exit; test case exited with code 1")
        );
    }

    #[test]
    fn invalid_result_file_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = File::create(dir.path().join(RESULT_FILE_NAME)).unwrap();
        writeln!(f, "bogus").unwrap();
        drop(f);
        let r = AtfInterface.compute_result(
            Some(TerminationStatus::Exited(0)),
            dir.path(),
            Path::new("/dev/null"),
            Path::new("/dev/null"),
        );
        assert_eq!(r.outcome(), crate::result::Outcome::Broken);
    }
}
