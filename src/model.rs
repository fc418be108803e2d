//! Test-program and test-case data model.
//!
//! A [`TestProgram`] is an executable adhering to one of the known
//! [`InterfaceKind`]s. Each program owns an ordered sequence of
//! [`TestCase`]s, themselves identified by a [`TestCaseId`] and carrying a
//! free-form [`PropertiesMap`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors raised while validating test-case properties.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid property key '{0}'")]
    InvalidPropertyKey(String),

    #[error("Relative path '{0}'")]
    RelativePath(String),

    #[error("invalid value for property '{key}': {value}")]
    InvalidPropertyValue { key: String, value: String },
}

pub type ModelResult<T> = Result<T, ModelError>;

/// The test-interface family a test program implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Atf,
    Tap,
    Plain,
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterfaceKind::Atf => "atf",
            InterfaceKind::Tap => "tap",
            InterfaceKind::Plain => "plain",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for InterfaceKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "atf" => Ok(InterfaceKind::Atf),
            "tap" => Ok(InterfaceKind::Tap),
            "plain" => Ok(InterfaceKind::Plain),
            other => Err(ModelError::InvalidPropertyValue {
                key: "interface".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// An immutable, ordered map of test-case property keys to string values.
///
/// Keys must match `[a-z][a-z0-9.]*`. Unrecognized keys are retained
/// verbatim so newer property names don't break older runners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertiesMap(BTreeMap<String, String>);

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.')
}

impl PropertiesMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> ModelResult<()> {
        let key = key.into();
        if !is_valid_key(&key) {
            return Err(ModelError::InvalidPropertyKey(key));
        }
        self.0.insert(key, value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the `timeout` property (seconds) if present and valid.
    pub fn timeout_secs(&self) -> ModelResult<Option<u64>> {
        match self.get("timeout") {
            None => Ok(None),
            Some(v) => v
                .parse::<u64>()
                .map(Some)
                .map_err(|_| ModelError::InvalidPropertyValue {
                    key: "timeout".to_string(),
                    value: v.to_string(),
                }),
        }
    }

    /// Property keys whose value is a required-program path and must be
    /// absolute (e.g. `require.progs`).
    const REQUIRED_PROGRAM_KEYS: &'static [&'static str] = &["require.progs"];

    fn validate_required_paths(&self) -> ModelResult<()> {
        for key in Self::REQUIRED_PROGRAM_KEYS {
            if let Some(value) = self.get(key) {
                for item in value.split_whitespace() {
                    if !item.starts_with('/') {
                        return Err(ModelError::RelativePath(item.to_string()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// The identity of a single test case: the program that defines it and its
/// name within that program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestCaseId {
    program: PathBuf,
    name: String,
}

impl TestCaseId {
    pub fn new(program: impl Into<PathBuf>, name: impl Into<String>) -> ModelResult<Self> {
        let name = name.into();
        if name.is_empty() || name.contains('/') {
            return Err(ModelError::InvalidPropertyValue {
                key: "ident".to_string(),
                value: name,
            });
        }
        Ok(Self {
            program: program.into(),
            name,
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.program.display(), self.name)
    }
}

/// One test case within a test program: its identity plus whatever
/// properties its test interface exposed at listing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    id: TestCaseId,
    properties: PropertiesMap,
}

impl TestCase {
    /// Builds a test case from its id and raw properties, validating
    /// interface-independent invariants: required-program paths must be
    /// absolute, and `timeout` must be a non-negative integer.
    pub fn from_properties(id: TestCaseId, properties: PropertiesMap) -> ModelResult<Self> {
        properties.validate_required_paths()?;
        properties.timeout_secs()?;
        Ok(Self { id, properties })
    }

    pub fn id(&self) -> &TestCaseId {
        &self.id
    }

    pub fn properties(&self) -> &PropertiesMap {
        &self.properties
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }
}

/// An executable adhering to a known test interface, plus the test cases it
/// was found to contain.
#[derive(Debug, Clone)]
pub struct TestProgram {
    path: PathBuf,
    interface: InterfaceKind,
    root_dir: PathBuf,
    test_cases: Vec<TestCase>,
}

impl TestProgram {
    pub fn new(path: impl Into<PathBuf>, interface: InterfaceKind, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interface,
            root_dir: root_dir.into(),
            test_cases: Vec::new(),
        }
    }

    pub fn with_test_cases(mut self, test_cases: Vec<TestCase>) -> Self {
        self.test_cases = test_cases;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn interface(&self) -> InterfaceKind {
        self.interface
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_property_keys() {
        let mut props = PropertiesMap::new();
        assert!(props.insert("Bad-Key", "x").is_err());
        assert!(props.insert("good.key", "x").is_ok());
    }

    #[test]
    fn rejects_relative_required_program_path() {
        let mut props = PropertiesMap::new();
        props.insert("require.progs", "bin/true").unwrap();
        let id = TestCaseId::new("/tmp/prog", "main").unwrap();
        let err = TestCase::from_properties(id, props).unwrap_err();
        assert!(matches!(err, ModelError::RelativePath(p) if p == "bin/true"));
    }

    #[test]
    fn accepts_absolute_required_program_path() {
        let mut props = PropertiesMap::new();
        props.insert("require.progs", "/bin/true").unwrap();
        let id = TestCaseId::new("/tmp/prog", "main").unwrap();
        assert!(TestCase::from_properties(id, props).is_ok());
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let mut props = PropertiesMap::new();
        props.insert("timeout", "soon").unwrap();
        let id = TestCaseId::new("/tmp/prog", "main").unwrap();
        assert!(TestCase::from_properties(id, props).is_err());
    }

    #[test]
    fn test_case_id_rejects_empty_or_slashed_names() {
        assert!(TestCaseId::new("/tmp/prog", "").is_err());
        assert!(TestCaseId::new("/tmp/prog", "a/b").is_err());
        assert!(TestCaseId::new("/tmp/prog", "main").is_ok());
    }
}
