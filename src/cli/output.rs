//! Handles all user-facing output for the CLI.
//!
//! One colorized status line per case and a final summary line. The
//! reporter writes to any `WriteColor`, so tests capture it in a buffer.

use crate::cli::args::ColorMode;
use crate::test_harness::{CaseResult, Outcome, Summary};
use std::io;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolves the requested color mode against the terminal.
pub fn color_choice(mode: ColorMode) -> ColorChoice {
    match mode {
        ColorMode::Always => ColorChoice::Always,
        ColorMode::Never => ColorChoice::Never,
        ColorMode::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
        ColorMode::Auto => ColorChoice::Never,
    }
}

pub struct Reporter<W> {
    out: W,
    verbose: bool,
}

impl Reporter<StandardStream> {
    pub fn stdout(mode: ColorMode, verbose: bool) -> Self {
        Self::new(StandardStream::stdout(color_choice(mode)), verbose)
    }
}

impl<W: WriteColor> Reporter<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self { out, verbose }
    }

    /// Prints `<name>: <PASSED|FAILED|ERROR>`, plus the cause in verbose mode.
    pub fn case(&mut self, result: &CaseResult) -> io::Result<()> {
        self.out
            .set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(self.out, "{}:", result.name)?;
        self.out.reset()?;
        write!(self.out, " ")?;

        let status = match result.outcome {
            Outcome::Passed => Color::Green,
            _ => Color::Red,
        };
        self.out
            .set_color(ColorSpec::new().set_fg(Some(status)).set_bold(true))?;
        write!(self.out, "{}", result.outcome.label())?;
        self.out.reset()?;
        writeln!(self.out)?;

        if self.verbose {
            match &result.outcome {
                Outcome::Failed(Some(mismatch)) => writeln!(self.out, "    {}", mismatch)?,
                Outcome::Errored(e) => writeln!(self.out, "    {}", e.chain())?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn summary(&mut self, summary: &Summary) -> io::Result<()> {
        writeln!(self.out, "{}", summary)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
