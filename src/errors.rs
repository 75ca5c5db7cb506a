//! Error type for everything that can go wrong while running a case.
//!
//! Every variant is a per-case error (the case is reported as ERROR and the
//! run continues) except when reading the manifest itself fails, which ends
//! the run.

use crate::value::DocumentError;
use miette::Diagnostic;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("failed to read {what} `{}`", path.display())]
    #[diagnostic(code(pmdcheck::io))]
    Read {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run converter `{}`", converter.display())]
    #[diagnostic(
        code(pmdcheck::launch),
        help("check that the converter path exists and is executable")
    )]
    Launch {
        converter: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lost track of converter `{}` while it was running", converter.display())]
    #[diagnostic(code(pmdcheck::wait))]
    Wait {
        converter: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("converter exited with {status} on `{}`", input.display())]
    #[diagnostic(code(pmdcheck::converter_status))]
    ConverterStatus {
        input: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error("converter did not finish within {}s on `{}`", timeout.as_secs_f64(), input.display())]
    #[diagnostic(code(pmdcheck::timeout), help("raise --timeout or drop it to wait indefinitely"))]
    Timeout { input: PathBuf, timeout: Duration },

    #[error("converter output has no `{marker}` line")]
    #[diagnostic(
        code(pmdcheck::marker),
        help("the converter must print the marker line right before the YAML document")
    )]
    MissingMarker { marker: String },

    #[error("invalid {origin}")]
    #[diagnostic(code(pmdcheck::document))]
    Document {
        origin: String,
        #[source]
        source: DocumentError,
    },
}

impl HarnessError {
    /// Renders the error and its causes on one line, `outer: inner: ...`.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            out.push_str(": ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        if let HarnessError::ConverterStatus { stderr, .. } = self {
            if let Some(last) = stderr.lines().rev().find(|l| !l.trim().is_empty()) {
                out.push_str(" (stderr: ");
                out.push_str(last.trim());
                out.push(')');
            }
        }
        out
    }
}
