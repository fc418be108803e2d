//! The test-interface abstraction: the polymorphic contract implemented by
//! ATF, TAP, and plain test programs.
//!
//! A [`TestInterface`] exposes exactly four operations, each invoked by
//! the [runner](crate::runner) at a specific point in a test case's
//! lifecycle:
//!
//! - [`exec_list`](TestInterface::exec_list) / [`parse_list`](TestInterface::parse_list), which enumerate test cases.
//! - [`exec_test`](TestInterface::exec_test) / [`compute_result`](TestInterface::compute_result), which run one test case and classify it.
//!
//! `exec_list` and `exec_test` run in the forked child and, on success,
//! never return (they exec or exit the process). `parse_list` and
//! `compute_result` run in the parent against the captured artifacts.

pub mod atf;
pub mod plain;
pub mod tap;

use std::path::Path;

use crate::model::{InterfaceKind, ModelError, TestCase, TestProgram};
use crate::process::{ProcessError, TerminationStatus};
use crate::result::TestResult;

#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("test program failed: {0}")]
    ExecFailed(String),

    #[error(transparent)]
    Listing(#[from] crate::listing::ListingError),

    #[error(transparent)]
    Tap(#[from] crate::tap::TapError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The four operations every test interface must provide.
pub trait TestInterface: Send + Sync {
    /// Runs in the forked child. Execs (or exits) so the program lists its
    /// test cases to stdout; returns only on failure to exec.
    fn exec_list(&self, program: &TestProgram, vars: &[(String, String)]) -> ProcessError;

    /// Runs in the parent after the listing child has terminated.
    fn parse_list(
        &self,
        program: &TestProgram,
        status: Option<TerminationStatus>,
        stdout_path: &Path,
        stderr_path: &Path,
    ) -> Result<Vec<TestCase>, InterfaceError>;

    /// Runs in the forked child. Execs (or exits) so the test case
    /// actually runs; returns only on failure to exec.
    fn exec_test(
        &self,
        program: &TestProgram,
        case_name: &str,
        vars: &[(String, String)],
        control_dir: &Path,
    ) -> ProcessError;

    /// Runs in the parent after the test child has terminated.
    fn compute_result(
        &self,
        status: Option<TerminationStatus>,
        control_dir: &Path,
        stdout_path: &Path,
        stderr_path: &Path,
    ) -> TestResult;
}

/// Name under which a test case's requested environment variable is
/// exposed to the child, per the `TEST_ENV_<name>` convention.
const TEST_ENV_PREFIX: &str = "TEST_ENV_";

const ATF_RUN_MARKER: &str = "internal-yes-value";

/// Builds the full environment-variable overlay for a test case's child:
/// the caller-supplied variables under the `TEST_ENV_` prefix, `HOME` and
/// `TMPDIR` pointed at the control directory, and ATF's marker that a
/// child is running under a test harness.
pub(crate) fn child_env(control_dir: &Path, vars: &[(String, String)]) -> Vec<(String, String)> {
    let mut env = Vec::with_capacity(vars.len() + 3);
    for (key, value) in vars {
        env.push((format!("{TEST_ENV_PREFIX}{key}"), value.clone()));
    }
    let control_dir = control_dir.display().to_string();
    env.push(("HOME".to_string(), control_dir.clone()));
    env.push(("TMPDIR".to_string(), control_dir));
    env.push((
        "__RUNNING_INSIDE_ATF_RUN".to_string(),
        ATF_RUN_MARKER.to_string(),
    ));
    env
}

/// Resolves the [`TestInterface`] implementation for a given
/// [`InterfaceKind`].
pub fn for_kind(kind: InterfaceKind) -> &'static dyn TestInterface {
    match kind {
        InterfaceKind::Atf => &atf::AtfInterface,
        InterfaceKind::Tap => &tap::TapInterface,
        InterfaceKind::Plain => &plain::PlainInterface,
    }
}

/// Classification shared by every interface: an absent status means the
/// runner killed the process after a timeout; a signaled status is always
/// broken regardless of which interface produced it.
pub(crate) fn broken_for_status(status: Option<TerminationStatus>) -> Option<TestResult> {
    match status {
        None => Some(TestResult::broken("Test case timed out")),
        Some(TerminationStatus::Signaled { signal, .. }) => {
            Some(TestResult::broken(format!("Received signal {signal}")))
        }
        Some(TerminationStatus::Exited(_)) => None,
    }
}
