//! Console progress and summary output

use console::style;
use std::io::{self, Write};
use std::path::Path;

use crate::discovery::Fixture;
use crate::execution::{Completion, OutputSink, Stream};
use crate::recording::{RunOutcome, SuiteResult};

const SEPARATOR_WIDTH: usize = 40;

/// Writes per-fixture progress, relayed interpreter output and the final
/// summary to a writer
pub struct Reporter<W: Write> {
    out: W,
    color: bool,
    relay: bool,
    verbose: bool,
}

impl Reporter<io::Stdout> {
    /// Reporter writing to stdout, colored when stdout supports it
    pub fn stdout() -> Self {
        Self::new(io::stdout()).with_color(console::colors_enabled())
    }
}

impl<W: Write> Reporter<W> {
    /// Create a plain reporter that relays output and prints no statistics
    pub fn new(out: W) -> Self {
        Self { out, color: false, relay: true, verbose: false }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Relay interpreter output lines while fixtures run
    pub fn with_relay(mut self, relay: bool) -> Self {
        self.relay = relay;
        self
    }

    /// Print run statistics after the summary
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn suite_started(&mut self, fixtures: &[Fixture], binary: &Path) -> io::Result<()> {
        let line = format!("Running {} fixture(s) with {}", fixtures.len(), binary.display());
        writeln!(self.out, "{}", style(line).dim().force_styling(self.color))?;
        self.out.flush()
    }

    /// Header printed before a fixture runs
    pub fn fixture_started(&mut self, fixture: &Fixture) -> io::Result<()> {
        writeln!(self.out, "{} {}", style("run:").bold().force_styling(self.color), fixture.name)?;
        self.out.flush()
    }

    /// Tag printed once a fixture's outcome is recorded
    pub fn fixture_finished(&mut self, outcome: &RunOutcome) -> io::Result<()> {
        let tag = if outcome.passed() {
            style("PASS").green().bold().force_styling(self.color)
        } else {
            style("FAIL").red().bold().force_styling(self.color)
        };

        match (&outcome.completion, &outcome.error_message) {
            (_, Some(error)) => {
                writeln!(self.out, "{} {} ({})", tag, outcome.fixture.name, error)?;
            }
            (Some(Completion::Signaled(signal)), None) => {
                writeln!(self.out, "{} {} (killed by signal {})", tag, outcome.fixture.name, signal)?;
            }
            (Some(Completion::Exited(code)), None) if *code != 0 => {
                writeln!(self.out, "{} {} (exit code {})", tag, outcome.fixture.name, code)?;
            }
            _ => writeln!(self.out, "{} {}", tag, outcome.fixture.name)?,
        }

        self.out.flush()
    }

    /// Final summary built from the recorded results
    pub fn summary(&mut self, result: &SuiteResult) -> io::Result<()> {
        writeln!(self.out, "{}", "=".repeat(SEPARATOR_WIDTH))?;

        let overall = result.all_passed();
        let verdict = if overall {
            style(overall).green().bold().force_styling(self.color)
        } else {
            style(overall).red().bold().force_styling(self.color)
        };
        writeln!(self.out, "all passed: {}", verdict)?;

        for outcome in result.outcomes() {
            writeln!(self.out, "{}: {}", outcome.fixture.name, outcome.passed())?;
        }

        if self.verbose {
            self.print_statistics(result)?;
        }

        self.out.flush()
    }

    fn print_statistics(&mut self, result: &SuiteResult) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", style("SUMMARY").bold().force_styling(self.color))?;
        writeln!(self.out, "  Total fixtures: {}", result.total())?;
        writeln!(self.out, "  Passed: {}", result.passed())?;
        writeln!(self.out, "  Failed: {}", result.failed())?;
        writeln!(self.out, "  Duration: {:.2?}", result.duration)?;

        if let Some(slowest) = result.outcomes().iter().max_by_key(|o| o.duration) {
            writeln!(self.out, "  Slowest: {} [{:.2?}]", slowest.fixture.name, slowest.duration)?;
        }

        Ok(())
    }
}

impl<W: Write> OutputSink for Reporter<W> {
    fn line(&mut self, _stream: Stream, text: &str) {
        if !self.relay {
            return;
        }

        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            log::warn!("Failed to relay interpreter output: {}", e);
        }
    }
}
