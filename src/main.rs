//! kyua CLI - subprocess test-interface execution harness.
//!
//! This front end is intentionally thin: it names test programs directly
//! on the command line (rather than through a Kyuafile) and drives the
//! execution core's `list`/`test` operations. See [`kyua::loader`] for the
//! seam a richer front end would extend.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use kyua::config::{self};
use kyua::loader::{CliTestProgramSource, TestProgramSource};
use kyua::model::InterfaceKind;
use kyua::report::{Reporter, RunSummary, TerminalReporter};
use kyua::runner::Runner;

#[derive(Parser)]
#[command(name = "kyua")]
#[command(about = "Test execution harness for ATF, TAP, and plain test programs", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "kyua.toml")]
    config: PathBuf,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the test cases in one or more test programs.
    List {
        /// `path` or `path:interface` (interface defaults to `plain`).
        programs: Vec<String>,

        #[arg(long, default_value = "plain")]
        interface: String,
    },
    /// Run the test cases in one or more test programs.
    Test {
        /// `path` or `path:interface` (interface defaults to `plain`).
        programs: Vec<String>,

        #[arg(long, default_value = "plain")]
        interface: String,
    },
    /// Print version and build information.
    About,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("kyua: {e}");
            ExitCode::from(3)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::About => {
            println!("kyua {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::List {
            programs,
            interface,
        } => run_list(&cli.config, &programs, &interface),
        Commands::Test {
            programs,
            interface,
        } => run_test(&cli.config, &programs, &interface),
    }
}

fn load_run_config(path: &PathBuf) -> anyhow::Result<config::Config> {
    if path.exists() {
        Ok(config::load_config(path)?)
    } else {
        Ok(config::Config::default())
    }
}

fn run_list(config_path: &PathBuf, programs: &[String], interface: &str) -> anyhow::Result<ExitCode> {
    let config = load_run_config(config_path)?;
    let default_interface: InterfaceKind = interface.parse().unwrap_or(InterfaceKind::Plain);
    let source = CliTestProgramSource::new(programs, default_interface);
    let runner = Runner::new(&config.run);

    for program in source.test_programs()? {
        let program = runner.list_test_program(program)?;
        for case in program.test_cases() {
            println!("{}", case.id());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_test(config_path: &PathBuf, programs: &[String], interface: &str) -> anyhow::Result<ExitCode> {
    let config = load_run_config(config_path)?;
    let default_interface: InterfaceKind = interface.parse().unwrap_or(InterfaceKind::Plain);
    let source = CliTestProgramSource::new(programs, default_interface);
    let runner = Runner::new(&config.run);
    let reporter = TerminalReporter;

    let mut summary = RunSummary::default();
    for program in source.test_programs()? {
        let program = runner.list_test_program(program)?;
        reporter.on_test_program_listed(&program);

        for case in program.test_cases() {
            reporter.on_test_case_start(case);
            let result = runner.run_test_case(&program, case, &[])?;
            reporter.on_test_case_finish(case, &result);
            summary.record(&result);
            info!(case = %case.id(), outcome = %result.outcome(), "test case finished");
        }
    }
    reporter.on_run_finish(&summary);

    Ok(ExitCode::from(summary.exit_code() as u8))
}
