//! Invocation of the external converter under test.

use crate::errors::HarnessError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// The converter executable, invoked as `<program> <input>`.
#[derive(Debug, Clone)]
pub struct Converter {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Converter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs the converter on `input` and returns its standard output.
    ///
    /// A non-zero exit status is an error. Output that is not valid UTF-8 is
    /// decoded lossily.
    pub fn run(&self, input: &Path) -> Result<String, HarnessError> {
        debug!(converter = %self.program.display(), input = %input.display(), "running converter");
        let mut command = Command::new(&self.program);
        command
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match self.timeout {
            None => command.output().map_err(|source| self.launch_error(source))?,
            Some(timeout) => self.output_with_deadline(command, input, timeout)?,
        };

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.is_empty() {
            debug!(input = %input.display(), stderr = %stderr.trim_end(), "converter stderr");
        }
        if !output.status.success() {
            return Err(HarnessError::ConverterStatus {
                input: input.to_path_buf(),
                status: output.status,
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn output_with_deadline(
        &self,
        mut command: Command,
        input: &Path,
        timeout: Duration,
    ) -> Result<Output, HarnessError> {
        let mut child = command.spawn().map_err(|source| self.launch_error(source))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child
            .wait_timeout(timeout)
            .map_err(|source| self.wait_error(source))?
        {
            Some(status) => status,
            None => {
                if let Err(e) = child.kill() {
                    warn!(error = %e, "failed to kill converter");
                }
                let _ = child.wait();
                // The drain threads are left detached: a grandchild may still
                // hold the pipes open.
                return Err(HarnessError::Timeout {
                    input: input.to_path_buf(),
                    timeout,
                });
            }
        };

        Ok(Output {
            status,
            stdout: collect(stdout).map_err(|source| self.wait_error(source))?,
            stderr: collect(stderr).map_err(|source| self.wait_error(source))?,
        })
    }

    fn launch_error(&self, source: std::io::Error) -> HarnessError {
        HarnessError::Launch {
            converter: self.program.clone(),
            source,
        }
    }

    fn wait_error(&self, source: std::io::Error) -> HarnessError {
        HarnessError::Wait {
            converter: self.program.clone(),
            source,
        }
    }
}

/// Reads a child pipe to the end on its own thread so the child never blocks
/// on a full pipe while we wait for its exit.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(handle: JoinHandle<std::io::Result<Vec<u8>>>) -> std::io::Result<Vec<u8>> {
    handle
        .join()
        .unwrap_or_else(|_| Err(std::io::Error::other("pipe reader panicked")))
}
