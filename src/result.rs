//! The classified outcome of a single test case.

use std::fmt;

/// The kind of outcome a test case can produce.
///
/// Every kind except [`Outcome::Passed`] carries a reason string explaining
/// why the test case did not simply pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    Broken,
    ExpectedFailure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::Broken => "broken",
            Outcome::ExpectedFailure => "expected_failure",
        };
        f.write_str(s)
    }
}

/// The result of running one test case.
///
/// `passed` results never carry a reason; every other kind requires one.
/// Construct via the kind-specific constructors rather than the bare
/// struct literal so this invariant can't be bypassed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    outcome: Outcome,
    reason: Option<String>,
}

impl TestResult {
    pub fn passed() -> Self {
        Self {
            outcome: Outcome::Passed,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            reason: Some(reason.into()),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Skipped,
            reason: Some(reason.into()),
        }
    }

    pub fn broken(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Broken,
            reason: Some(reason.into()),
        }
    }

    pub fn expected_failure(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::ExpectedFailure,
            reason: Some(reason.into()),
        }
    }

    /// Builds a result from a parsed `(kind, reason)` pair, enforcing that
    /// `passed` carries no reason and every other kind does.
    pub fn from_kind_and_reason(kind: &str, reason: Option<String>) -> Result<Self, String> {
        match (kind, reason) {
            ("passed", None) => Ok(Self::passed()),
            ("passed", Some(_)) => Err("'passed' must not carry a reason".to_string()),
            ("failed", Some(r)) => Ok(Self::failed(r)),
            ("skipped", Some(r)) => Ok(Self::skipped(r)),
            ("broken", Some(r)) => Ok(Self::broken(r)),
            ("expected_failure", Some(r)) => Ok(Self::expected_failure(r)),
            (other, None) if other != "passed" => {
                Err(format!("'{other}' requires a reason"))
            }
            (other, _) => Err(format!("unknown result kind '{other}'")),
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::Passed | Outcome::Skipped | Outcome::ExpectedFailure
        )
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", self.outcome, reason),
            None => write!(f, "{}", self.outcome),
        }
    }
}
