//! # kyua
//!
//! A test execution harness: given a set of test programs written against
//! heterogeneous test frameworks, it enumerates their test cases, runs each
//! in a controlled subprocess, captures its output, classifies the
//! outcome, and reports structured results.
//!
//! ## Architecture
//!
//! ### Model ([`model`], [`result`])
//!
//! [`model::TestProgram`] and [`model::TestCase`] are the data model; a
//! [`result::TestResult`] is what running a test case produces.
//!
//! ### Interfaces ([`interface`])
//!
//! A test program adheres to one of three interfaces, dispatched through
//! the [`interface::TestInterface`] trait:
//!
//! - [`interface::atf::AtfInterface`] - native listing (`-l`) and result files (`-r`)
//! - [`interface::tap::TapInterface`] - [`tap`]-formatted output on stdout
//! - [`interface::plain::PlainInterface`] - exit status only
//!
//! ### Runner ([`runner`])
//!
//! [`runner::Runner`] forks a child per test case, waits for it with a
//! timeout (escalating `SIGTERM` then `SIGKILL`), and classifies the
//! result from the captured artifacts. See [`process`] for the underlying
//! fork/exec/wait primitives.
//!
//! ### Loader ([`loader`]) and reporting ([`report`])
//!
//! [`loader::TestProgramSource`] is the seam a Kyuafile-style front end
//! would sit behind; [`report::Reporter`] is the seam a richer terminal or
//! CI reporter would sit behind. Both are narrow on purpose; this crate's
//! job is the execution core, not the front end.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kyua::config;
//! use kyua::loader::{CliTestProgramSource, TestProgramSource};
//! use kyua::model::InterfaceKind;
//! use kyua::runner::Runner;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = config::Config::default();
//!     let runner = Runner::new(&config.run);
//!     let source = CliTestProgramSource::new(&["./my_test".to_string()], InterfaceKind::Plain);
//!
//!     for program in source.test_programs()? {
//!         let program = runner.list_test_program(program)?;
//!         for case in program.test_cases() {
//!             let result = runner.run_test_case(&program, case, &[])?;
//!             println!("{}  ->  {}", case.id(), result);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod interface;
pub mod listing;
pub mod loader;
pub mod model;
pub mod process;
pub mod report;
pub mod result;
pub mod runner;
pub mod tap;

pub use model::{InterfaceKind, TestCase, TestCaseId, TestProgram};
pub use result::{Outcome, TestResult};
pub use runner::Runner;
