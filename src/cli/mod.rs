//! The pmdcheck Command-Line Interface.
//!
//! Parses arguments, sets up logging, runs the manifest and turns the
//! outcome into a process exit code.

use crate::cli::args::PmdcheckArgs;
use crate::cli::output::Reporter;
use crate::test_harness::{run_manifest, Summary};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub mod args;
pub mod output;

/// Exit status for a malformed command line.
pub const USAGE_EXIT_CODE: i32 = 5;
/// Exit status when a case failed or errored, or the manifest is unreadable.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// The main entry point for the CLI. Returns the process exit code.
pub fn run() -> i32 {
    let args = match PmdcheckArgs::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            return USAGE_EXIT_CODE;
        }
    };
    init_logging();

    let config = args.run_config();
    let mut reporter = Reporter::stdout(args.color, args.verbose);
    let results = run_manifest(&config, |result| {
        if let Err(e) = reporter.case(result) {
            warn!(error = %e, "failed to write case result");
        }
    });

    match results {
        Ok(results) => {
            let summary = Summary::from_results(&results);
            if let Err(e) = reporter.summary(&summary) {
                warn!(error = %e, "failed to write summary");
            }
            summary.exit_code()
        }
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            FAILURE_EXIT_CODE
        }
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
