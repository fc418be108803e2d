//! The test runner: orchestrates a single test case's lifecycle, fork,
//! exec the interface's child-side operation, wait with a timeout, and
//! classify the result from the captured artifacts.
//!
//! See [`crate::interface`] for the four operations it calls and
//! [`crate::process`] for the fork/exec/wait primitives underneath.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::interface::{self, InterfaceError};
use crate::model::{ModelError, TestCase, TestProgram};
use crate::process::{self, ProcessError};
use crate::result::TestResult;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("failed to set up control directory: {0}")]
    ControlDir(#[from] std::io::Error),

    #[error(transparent)]
    Interface(#[from] InterfaceError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Orchestrates test-program listing and test-case execution against the
/// given run configuration.
pub struct Runner {
    result_root: PathBuf,
    default_timeout: Duration,
    retain_on_failure: bool,
}

impl Runner {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            result_root: config.result_dir.clone(),
            default_timeout: Duration::from_secs(config.default_timeout_secs),
            retain_on_failure: config.save_results_on_failure,
        }
    }

    fn fresh_control_dir(&self, label: &str) -> Result<PathBuf, RunnerError> {
        let unique = format!("{label}-{}", uuid::Uuid::new_v4());
        let dir = self.result_root.join(unique);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Lists the test cases in `program`, returning a new [`TestProgram`]
    /// with the discovered cases attached.
    pub fn list_test_program(&self, program: TestProgram) -> Result<TestProgram, RunnerError> {
        let control_dir = self.fresh_control_dir("list")?;
        let stdout_path = control_dir.join("stdout");
        let stderr_path = control_dir.join("stderr");

        let interface = interface::for_kind(program.interface());
        let pid = unsafe {
            process::fork_and_exec(&stdout_path, &stderr_path, || {
                interface.exec_list(&program, &[])
            })
        }?;
        let status = process::wait_with_timeout(pid, self.default_timeout)?;

        let cases = interface.parse_list(&program, status, &stdout_path, &stderr_path)?;
        debug!(program = %program.path().display(), count = cases.len(), "listed test cases");

        let _ = fs::remove_dir_all(&control_dir);
        Ok(program.with_test_cases(cases))
    }

    /// Runs a single test case and returns its classified result. The
    /// control directory is removed afterward unless the result did not
    /// pass and retention is configured.
    pub fn run_test_case(
        &self,
        program: &TestProgram,
        case: &TestCase,
        vars: &[(String, String)],
    ) -> Result<TestResult, RunnerError> {
        let control_dir = self.fresh_control_dir(case.name())?;
        let stdout_path = control_dir.join("stdout");
        let stderr_path = control_dir.join("stderr");

        let timeout = case
            .properties()
            .timeout_secs()?
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let interface = interface::for_kind(program.interface());
        let case_name = case.name().to_string();
        let pid = unsafe {
            process::fork_and_exec(&stdout_path, &stderr_path, || {
                interface.exec_test(program, &case_name, vars, &control_dir)
            })
        }?;
        let status = process::wait_with_timeout(pid, timeout)?;

        let result = interface.compute_result(status, &control_dir, &stdout_path, &stderr_path);

        if result.is_success() || !self.retain_on_failure {
            if let Err(e) = fs::remove_dir_all(&control_dir) {
                warn!(dir = %control_dir.display(), error = %e, "failed to clean up control directory");
            }
        }

        Ok(result)
    }

    /// Sends a termination signal to an in-flight test case's process
    /// group and returns an interrupted result, for use on `SIGINT`.
    pub fn interrupt(&self, pid: nix::unistd::Pid) -> TestResult {
        let _ = process::terminate_process_group(pid);
        TestResult::broken("Interrupted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InterfaceKind;

    fn config(root: &Path) -> RunConfig {
        RunConfig {
            default_timeout_secs: 5,
            result_dir: root.to_path_buf(),
            save_results_on_failure: true,
            max_captured_bytes: 1_048_576,
        }
    }

    #[test]
    fn runs_a_passing_plain_test_case() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(&config(dir.path()));

        let program = TestProgram::new("/bin/true", InterfaceKind::Plain, "/");
        let case = crate::model::TestCase::from_properties(
            crate::model::TestCaseId::new("/bin/true", "main").unwrap(),
            Default::default(),
        )
        .unwrap();

        let result = runner.run_test_case(&program, &case, &[]).unwrap();
        assert_eq!(result, TestResult::passed());
    }

    #[test]
    fn runs_a_failing_plain_test_case() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Runner::new(&config(dir.path()));

        let program = TestProgram::new("/bin/false", InterfaceKind::Plain, "/");
        let case = crate::model::TestCase::from_properties(
            crate::model::TestCaseId::new("/bin/false", "main").unwrap(),
            Default::default(),
        )
        .unwrap();

        let result = runner.run_test_case(&program, &case, &[]).unwrap();
        assert_eq!(result.outcome(), crate::result::Outcome::Failed);
    }
}
