//! Boundary abstraction for the user-file (Kyuafile) layer.
//!
//! The execution core only needs a sequence of [`TestProgram`]s to run; how
//! that sequence is produced, a full Kyuafile grammar with Lua globs and
//! includes, is deliberately out of scope. [`TestProgramSource`] is the
//! seam a real loader would sit behind.

use std::path::PathBuf;

use crate::model::{InterfaceKind, TestProgram};

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("test program '{0}' does not exist or is not executable")]
    NotExecutable(String),
}

/// Produces the test programs for a run.
pub trait TestProgramSource {
    fn test_programs(&self) -> Result<Vec<TestProgram>, LoaderError>;
}

/// A minimal loader that treats each CLI argument as `path` or
/// `path:interface`, defaulting to the plain interface. Stands in for a
/// Kyuafile without implementing its glob/include grammar.
pub struct CliTestProgramSource {
    entries: Vec<(PathBuf, InterfaceKind)>,
}

impl CliTestProgramSource {
    pub fn new(args: &[String], default_interface: InterfaceKind) -> Self {
        let entries = args
            .iter()
            .map(|arg| match arg.split_once(':') {
                Some((path, interface)) => {
                    let kind = interface.parse().unwrap_or(default_interface);
                    (PathBuf::from(path), kind)
                }
                None => (PathBuf::from(arg), default_interface),
            })
            .collect();
        Self { entries }
    }
}

impl TestProgramSource for CliTestProgramSource {
    fn test_programs(&self) -> Result<Vec<TestProgram>, LoaderError> {
        self.entries
            .iter()
            .map(|(path, interface)| {
                if !path.exists() {
                    return Err(LoaderError::NotExecutable(path.display().to_string()));
                }
                let root_dir = path
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| PathBuf::from("."));
                Ok(TestProgram::new(path.clone(), *interface, root_dir))
            })
            .collect()
    }
}
