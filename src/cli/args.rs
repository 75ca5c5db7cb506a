//! Defines the command-line arguments for the pmdcheck CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use crate::test_harness::{RunConfig, DEFAULT_MANIFEST, DEFAULT_MARKER};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "pmdcheck",
    version,
    about = "Runs a converter over the cases of a test manifest and checks its YAML output against reference documents."
)]
pub struct PmdcheckArgs {
    /// Path to the converter executable, e.g. /path/to/pmd2yaml.
    pub converter: PathBuf,

    /// File listing one case name per line.
    #[arg(long, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Directory holding the `<case>` reference and `<case>.pmd` input files.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub cases: PathBuf,

    /// Line after which the converter output is parsed as YAML.
    #[arg(long, default_value = DEFAULT_MARKER)]
    pub marker: String,

    /// Give up on a converter run after this many seconds.
    #[arg(long, value_name = "SECS", allow_negative_numbers = true, value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Only run cases whose name contains this substring.
    #[arg(long)]
    pub filter: Option<String>,

    /// Print the mismatch location or error cause under each case.
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,
}

/// When to colorize the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl PmdcheckArgs {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            converter: self.converter.clone(),
            manifest: self.manifest.clone(),
            case_dir: self.cases.clone(),
            marker: self.marker.clone(),
            timeout: self.timeout,
            filter: self.filter.clone(),
        }
    }
}

/// Parses `--timeout`: a positive, finite number of seconds that fits a
/// `Duration`.
fn parse_timeout(arg: &str) -> Result<Duration, String> {
    let secs: f64 = arg
        .parse()
        .map_err(|_| format!("`{arg}` is not a number of seconds"))?;
    if secs.is_nan() || secs <= 0.0 {
        return Err(format!("`{arg}` must be greater than zero"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("`{arg}`: {e}"))
}
