//! Manifest-driven test harness for converter output.
//!
//! Each case `N` named in the manifest goes through the same phases:
//! 1. **Convert**: run the converter on `N.pmd` and capture its stdout
//! 2. **Strip**: drop everything up to and including the marker line
//! 3. **Parse**: read the remainder as the actual document and the reference
//!    file `N` as the expected document
//! 4. **Compare**: check that expected is a substructure of actual
//!
//! Any error along the way marks the case as errored; it never stops the run.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pmdcheck::test_harness::{run_manifest, RunConfig, Summary};
//!
//! let config = RunConfig::new("./pmd2yaml");
//! let results = run_manifest(&config, |r| println!("{}: {}", r.name, r.outcome.label())).unwrap();
//! std::process::exit(Summary::from_results(&results).exit_code());
//! ```

use crate::converter::Converter;
use crate::errors::HarnessError;
use crate::substructure::{find_mismatch, substructure, Mismatch};
use crate::value::{Role, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_MANIFEST: &str = "test_manifest";
pub const DEFAULT_MARKER: &str = "YAML follows";
pub const INPUT_EXTENSION: &str = "pmd";

// =============================================================================
// CORE TYPES
// =============================================================================

/// Configuration for a harness run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub converter: PathBuf,
    pub manifest: PathBuf,
    /// Directory holding the `N` and `N.pmd` files.
    pub case_dir: PathBuf,
    pub marker: String,
    pub timeout: Option<Duration>,
    /// Only cases whose name contains this substring (case-insensitive) run.
    pub filter: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            converter: PathBuf::from("pmd2yaml"),
            manifest: PathBuf::from(DEFAULT_MANIFEST),
            case_dir: PathBuf::from("."),
            marker: DEFAULT_MARKER.to_string(),
            timeout: None,
            filter: None,
        }
    }
}

impl RunConfig {
    pub fn new(converter: impl Into<PathBuf>) -> Self {
        Self {
            converter: converter.into(),
            ..Self::default()
        }
    }

    pub fn input_path(&self, name: &str) -> PathBuf {
        self.case_dir.join(format!("{}.{}", name, INPUT_EXTENSION))
    }

    pub fn reference_path(&self, name: &str) -> PathBuf {
        self.case_dir.join(name)
    }

    fn selects(&self, name: &str) -> bool {
        match &self.filter {
            Some(f) => name.to_lowercase().contains(&f.to_lowercase()),
            None => true,
        }
    }
}

/// How a single case ended.
#[derive(Debug)]
pub enum Outcome {
    Passed,
    /// The expected document is not a substructure of the converter output.
    Failed(Option<Mismatch>),
    Errored(HarnessError),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed(_) => "FAILED",
            Outcome::Errored(_) => "ERROR",
        }
    }
}

#[derive(Debug)]
pub struct CaseResult {
    pub name: String,
    pub outcome: Outcome,
}

/// Per-outcome counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl Summary {
    pub fn from_results(results: &[CaseResult]) -> Self {
        results.iter().fold(Self::default(), |mut summary, r| {
            match r.outcome {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed(_) => summary.failed += 1,
                Outcome::Errored(_) => summary.errored += 1,
            }
            summary
        })
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }

    /// 0 when nothing failed or errored, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Passed: {}, Failed: {}, Errored: {}",
            self.passed, self.failed, self.errored
        )
    }
}

// =============================================================================
// PHASES
// =============================================================================

/// Reads case names, one per line. Surrounding whitespace is trimmed and
/// blank lines are skipped.
pub fn read_manifest(path: &Path) -> Result<Vec<String>, HarnessError> {
    let content = fs::read_to_string(path).map_err(|source| HarnessError::Read {
        what: "manifest",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Returns what follows the first line containing `marker`.
pub fn strip_preamble<'a>(output: &'a str, marker: &str) -> Result<&'a str, HarnessError> {
    let mut offset = 0;
    for line in output.split_inclusive('\n') {
        offset += line.len();
        if line.contains(marker) {
            return Ok(&output[offset..]);
        }
    }
    Err(HarnessError::MissingMarker {
        marker: marker.to_string(),
    })
}

fn parse_document(text: &str, role: Role, origin: String) -> Result<Value, HarnessError> {
    Value::parse_yaml(text, role).map_err(|source| HarnessError::Document { origin, source })
}

fn evaluate_case(
    name: &str,
    config: &RunConfig,
    converter: &Converter,
) -> Result<Outcome, HarnessError> {
    let input = config.input_path(name);
    let output = converter.run(&input)?;
    let document = strip_preamble(&output, &config.marker)?;
    let actual = parse_document(
        document,
        Role::Actual,
        format!("converter output for `{}`", input.display()),
    )?;

    let reference = config.reference_path(name);
    let text = fs::read_to_string(&reference).map_err(|source| HarnessError::Read {
        what: "reference",
        path: reference.clone(),
        source,
    })?;
    let expected = parse_document(
        &text,
        Role::Expected,
        format!("reference `{}`", reference.display()),
    )?;

    if substructure(&expected, &actual) {
        Ok(Outcome::Passed)
    } else {
        Ok(Outcome::Failed(find_mismatch(&expected, &actual)))
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Runs one case. Errors are folded into [`Outcome::Errored`].
pub fn run_case(name: &str, config: &RunConfig, converter: &Converter) -> CaseResult {
    let outcome = evaluate_case(name, config, converter).unwrap_or_else(Outcome::Errored);
    match &outcome {
        Outcome::Errored(e) => debug!(case = name, error = %e.chain(), "case errored"),
        other => debug!(case = name, outcome = other.label(), "case finished"),
    }
    CaseResult {
        name: name.to_string(),
        outcome,
    }
}

/// Runs every selected case of the manifest in order, calling `on_result`
/// as each one finishes.
///
/// Only a manifest that cannot be read fails the whole run.
pub fn run_manifest(
    config: &RunConfig,
    mut on_result: impl FnMut(&CaseResult),
) -> Result<Vec<CaseResult>, HarnessError> {
    let names = read_manifest(&config.manifest)?;
    let converter = Converter::new(&config.converter).with_timeout(config.timeout);
    info!(
        cases = names.len(),
        converter = %converter.program().display(),
        "starting run"
    );

    let mut results = Vec::with_capacity(names.len());
    for name in names {
        if !config.selects(&name) {
            debug!(case = %name, "filtered out");
            continue;
        }
        let result = run_case(&name, config, &converter);
        on_result(&result);
        results.push(result);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_preamble_drops_through_marker() {
        let out = "Parsing file\nYAML follows\npages: 1\n";
        assert_eq!(strip_preamble(out, DEFAULT_MARKER).unwrap(), "pages: 1\n");
    }

    #[test]
    fn strip_preamble_uses_first_marker_and_substring_match() {
        let out = "-- YAML follows --\na: 1\nYAML follows\nb: 2\n";
        assert_eq!(
            strip_preamble(out, DEFAULT_MARKER).unwrap(),
            "a: 1\nYAML follows\nb: 2\n"
        );
    }

    #[test]
    fn strip_preamble_marker_on_last_line() {
        assert_eq!(strip_preamble("YAML follows", DEFAULT_MARKER).unwrap(), "");
    }

    #[test]
    fn strip_preamble_without_marker_errors() {
        let err = strip_preamble("a: 1\n", DEFAULT_MARKER).unwrap_err();
        assert!(matches!(err, HarnessError::MissingMarker { .. }));
    }

    #[test]
    fn manifest_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_MANIFEST);
        fs::write(&path, "alpha\n\nbeta\r\n  \ngamma").unwrap();
        assert_eq!(read_manifest(&path).unwrap(), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn missing_manifest_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_manifest(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, HarnessError::Read { what: "manifest", .. }));
    }

    #[test]
    fn summary_counts_and_exit_code() {
        let results = vec![
            CaseResult {
                name: "a".into(),
                outcome: Outcome::Passed,
            },
            CaseResult {
                name: "b".into(),
                outcome: Outcome::Failed(None),
            },
            CaseResult {
                name: "c".into(),
                outcome: Outcome::Errored(HarnessError::MissingMarker {
                    marker: DEFAULT_MARKER.into(),
                }),
            },
            CaseResult {
                name: "d".into(),
                outcome: Outcome::Passed,
            },
        ];
        let summary = Summary::from_results(&results);
        assert_eq!(
            summary,
            Summary {
                passed: 2,
                failed: 1,
                errored: 1
            }
        );
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.to_string(), "Passed: 2, Failed: 1, Errored: 1");
        assert_eq!(Summary::default().exit_code(), 0);
    }

    #[test]
    fn case_paths_and_filter() {
        let config = RunConfig {
            case_dir: PathBuf::from("cases"),
            filter: Some("Shape".into()),
            ..RunConfig::new("pmd2yaml")
        };
        assert_eq!(config.input_path("shapes"), PathBuf::from("cases/shapes.pmd"));
        assert_eq!(config.reference_path("shapes"), PathBuf::from("cases/shapes"));
        assert!(config.selects("rotated_shapes"));
        assert!(!config.selects("text"));
    }

    #[cfg(unix)]
    mod with_converter {
        use super::*;

        /// `sh` stands in for the converter: each `N.pmd` is a script that
        /// prints the converter output.
        fn setup(cases: &[(&str, &str, Option<&str>)]) -> (tempfile::TempDir, RunConfig) {
            let dir = tempfile::tempdir().unwrap();
            let mut manifest = String::new();
            for (name, script, reference) in cases {
                fs::write(dir.path().join(format!("{name}.pmd")), script).unwrap();
                if let Some(reference) = reference {
                    fs::write(dir.path().join(name), reference).unwrap();
                }
                manifest.push_str(name);
                manifest.push('\n');
            }
            fs::write(dir.path().join(DEFAULT_MANIFEST), manifest).unwrap();
            let config = RunConfig {
                manifest: dir.path().join(DEFAULT_MANIFEST),
                case_dir: dir.path().to_path_buf(),
                ..RunConfig::new("sh")
            };
            (dir, config)
        }

        const EMIT: &str = "echo 'Reading document'\necho 'YAML follows'\necho 'pages: [{width: 612, height: 792}, {width: 612}]'\n";

        #[test]
        fn classifies_each_case() {
            let (_dir, config) = setup(&[
                ("pass", EMIT, Some("pages:\n  - {width: 612}\n")),
                ("fail", EMIT, Some("pages:\n  - {}\n  - {height: ~}\n")),
                ("nomarker", "echo 'pages: []'\n", Some("{}")),
                ("noref", EMIT, None),
                ("crash", "exit 2\n", Some("{}")),
                ("badref", EMIT, Some("pages: [\n")),
            ]);
            let mut seen = Vec::new();
            let results = run_manifest(&config, |r| seen.push(r.name.clone())).unwrap();
            assert_eq!(seen, vec!["pass", "fail", "nomarker", "noref", "crash", "badref"]);

            let labels: Vec<_> = results.iter().map(|r| r.outcome.label()).collect();
            assert_eq!(labels, vec!["PASSED", "FAILED", "ERROR", "ERROR", "ERROR", "ERROR"]);

            match &results[1].outcome {
                Outcome::Failed(Some(m)) => assert_eq!(m.to_string(), "at $.pages[1].height: key is missing"),
                other => panic!("unexpected outcome: {other:?}"),
            }
            assert!(matches!(
                results[2].outcome,
                Outcome::Errored(HarnessError::MissingMarker { .. })
            ));
            assert!(matches!(
                results[3].outcome,
                Outcome::Errored(HarnessError::Read { what: "reference", .. })
            ));
            assert!(matches!(
                results[4].outcome,
                Outcome::Errored(HarnessError::ConverterStatus { .. })
            ));
            assert!(matches!(
                results[5].outcome,
                Outcome::Errored(HarnessError::Document { .. })
            ));

            let summary = Summary::from_results(&results);
            assert_eq!(summary.to_string(), "Passed: 1, Failed: 1, Errored: 4");
            assert_eq!(summary.exit_code(), 1);
        }

        #[test]
        fn filter_limits_cases() {
            let (_dir, mut config) = setup(&[
                ("text_basic", EMIT, Some("{}")),
                ("shapes", EMIT, Some("{}")),
            ]);
            config.filter = Some("text".into());
            let results = run_manifest(&config, |_| {}).unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].name, "text_basic");
        }

        #[test]
        fn custom_marker() {
            let (_dir, mut config) = setup(&[(
                "alt",
                "echo '--- begin ---'\necho 'a: 1'\n",
                Some("a: 1\n"),
            )]);
            config.marker = "--- begin ---".into();
            let results = run_manifest(&config, |_| {}).unwrap();
            assert_eq!(results[0].outcome.label(), "PASSED");
        }
    }
}
