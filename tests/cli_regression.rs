// End-to-end runs of the pmdcheck binary against a fake converter.
// Requires: assert_cmd, predicates, tempfile in [dev-dependencies]

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use tempfile::TempDir;

/// A stand-in for pmd2yaml: prints a preamble, the marker and then the
/// contents of the `.pmd` file. Inputs starting with `#nomarker`, `#crash`
/// or `#hang` misbehave accordingly. `#hang` leaves `sleep` holding the
/// pipes after the script itself is killed.
const FAKE_CONVERTER: &str = r##"#!/bin/sh
case "$(head -n 1 "$1")" in
  "#nomarker") echo "Unsupported file format"; exit 0 ;;
  "#crash") echo "ERROR: Unsupported file format" >&2; exit 1 ;;
  "#hang") sleep 10 ;;
esac
echo "Allocating." >&2
echo "Parsing $1"
echo "YAML follows"
cat "$1"
"##;

struct Suite {
    dir: TempDir,
    converter: PathBuf,
}

impl Suite {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let converter = dir.path().join("fake_pmd2yaml");
        fs::write(&converter, FAKE_CONVERTER).unwrap();
        fs::set_permissions(&converter, fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, converter }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn case(&self, name: &str, converted: &str, reference: Option<&str>) -> &Self {
        fs::write(self.path().join(format!("{name}.pmd")), converted).unwrap();
        if let Some(reference) = reference {
            fs::write(self.path().join(name), reference).unwrap();
        }
        self
    }

    fn manifest(&self, contents: &str) -> &Self {
        fs::write(self.path().join("test_manifest"), contents).unwrap();
        self
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("pmdcheck").unwrap();
        cmd.current_dir(self.path()).arg(&self.converter);
        cmd
    }
}

const DOC: &str = "\
pages:
  - width: 612
    height: 792
    shapes:
      - {type: rectangle, fill: red}
      - {type: line}
colors: [black, white, red]
";

#[test]
fn all_cases_pass() {
    let suite = Suite::new();
    suite
        .case("basic", DOC, Some("pages:\n  - width: 612\n    shapes: [{type: rectangle}]\n"))
        .case("colors", DOC, Some("colors: !set [red, black]\n"))
        .case("palette", DOC, Some("colors: !!set {white, red}\n"))
        .manifest("basic\n\ncolors\npalette\n");

    suite
        .cmd()
        .assert()
        .success()
        .stdout(contains("basic: PASSED"))
        .stdout(contains("colors: PASSED"))
        .stdout(contains("palette: PASSED"))
        .stdout(contains("Passed: 3, Failed: 0, Errored: 0"));
}

#[test]
fn failures_and_errors_are_counted_and_the_run_continues() {
    let suite = Suite::new();
    suite
        .case("good", DOC, Some("pages: [{height: ~}]\n"))
        .case("wrong", DOC, Some("pages: [{width: 600}]\n"))
        .case("nomarker", "#nomarker\n", Some("{}\n"))
        .case("crash", "#crash\n", Some("{}\n"))
        .case("noref", DOC, None)
        .case("last", DOC, Some("colors: [black]\n"))
        .manifest("good\nwrong\nnomarker\ncrash\nnoref\nlast\n");

    suite
        .cmd()
        .assert()
        .code(1)
        .stdout(contains("good: PASSED"))
        .stdout(contains("wrong: FAILED"))
        .stdout(contains("nomarker: ERROR"))
        .stdout(contains("crash: ERROR"))
        .stdout(contains("noref: ERROR"))
        .stdout(contains("last: PASSED"))
        .stdout(contains("Passed: 2, Failed: 1, Errored: 3"));
}

#[test]
fn verbose_explains_failures() {
    let suite = Suite::new();
    suite
        .case("wrong", DOC, Some("pages: [{width: 600}]\n"))
        .case("nomarker", "#nomarker\n", Some("{}\n"))
        .manifest("wrong\nnomarker\n");

    suite
        .cmd()
        .arg("--verbose")
        .assert()
        .code(1)
        .stdout(contains("at $.pages[0].width: expected 600, found 612"))
        .stdout(contains("has no `YAML follows` line"));
}

#[test]
fn cases_directory_and_filter() {
    let suite = Suite::new();
    fs::create_dir(suite.path().join("samples")).unwrap();
    fs::write(suite.path().join("samples/text.pmd"), DOC).unwrap();
    fs::write(suite.path().join("samples/text"), "colors: [black]\n").unwrap();
    suite.manifest("text\nshapes\n");

    suite
        .cmd()
        .args(["--cases", "samples", "--filter", "TEXT"])
        .assert()
        .success()
        .stdout(contains("text: PASSED"))
        .stdout(contains("shapes").not())
        .stdout(contains("Passed: 1, Failed: 0, Errored: 0"));
}

#[test]
fn hung_converter_times_out() {
    let suite = Suite::new();
    suite
        .case("hang", "#hang\n", Some("{}\n"))
        .case("after", DOC, Some("{}\n"))
        .manifest("hang\nafter\n");

    suite
        .cmd()
        .args(["--timeout", "0.5"])
        .assert()
        .code(1)
        .stdout(contains("hang: ERROR"))
        .stdout(contains("after: PASSED"));
}

#[test]
fn missing_argument_is_a_usage_error() {
    Command::cargo_bin("pmdcheck")
        .unwrap()
        .assert()
        .code(5)
        .stderr(contains("Usage").or(contains("usage")));
}

#[test]
fn extra_argument_is_a_usage_error() {
    Command::cargo_bin("pmdcheck")
        .unwrap()
        .args(["pmd2yaml", "extra"])
        .assert()
        .code(5);
}

#[test]
fn out_of_range_timeout_is_a_usage_error() {
    for secs in ["1e30", "0", "-2", "nan"] {
        Command::cargo_bin("pmdcheck")
            .unwrap()
            .args(["pmd2yaml", "--timeout", secs])
            .assert()
            .code(5)
            .stderr(contains("--timeout"));
    }
}

#[test]
fn missing_manifest_is_reported() {
    let suite = Suite::new();
    suite
        .cmd()
        .assert()
        .code(1)
        .stderr(contains("pmdcheck::io").or(contains("test_manifest")));
}

#[test]
fn missing_converter_errors_every_case() {
    let suite = Suite::new();
    suite.case("basic", DOC, Some("{}\n")).manifest("basic\n");

    Command::cargo_bin("pmdcheck")
        .unwrap()
        .current_dir(suite.path())
        .arg(suite.path().join("no_such_converter"))
        .assert()
        .code(1)
        .stdout(contains("basic: ERROR"))
        .stdout(contains("Passed: 0, Failed: 0, Errored: 1"));
}
