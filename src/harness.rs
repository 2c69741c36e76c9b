//! Main test harness orchestrating a full suite run

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{Profile, TestConfig};
use crate::discovery::FixtureLocator;
use crate::execution::ProcessRunner;
use crate::recording::{ResultRecorder, SuiteResult};
use crate::reporting::Reporter;
use crate::TestError;

/// Runs every selected fixture through the interpreter, one after another
pub struct LoxHarness {
    config: TestConfig,
    locator: FixtureLocator,
    runner: ProcessRunner,
}

impl LoxHarness {
    /// Create a new harness
    pub fn new(config: TestConfig) -> Result<Self, TestError> {
        config.validate()?;

        let locator = FixtureLocator::from_config(&config);
        let runner =
            ProcessRunner::new(config.subject_binary()).with_capture(config.report.is_some());

        Ok(Self { config, locator, runner })
    }

    /// Get the test configuration
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Discover and run all fixtures, reporting as it goes
    ///
    /// Fixtures run strictly in discovery order and each process has fully
    /// exited before the next one starts. A fixture whose interpreter cannot
    /// be started is recorded as failed and the run continues. Only a
    /// discovery failure aborts the run, before anything is executed.
    /// Console and report write failures are logged and never change the
    /// result.
    pub async fn run_all<W: Write>(
        &self,
        reporter: &mut Reporter<W>,
    ) -> Result<SuiteResult, TestError> {
        let start_time = Instant::now();

        let fixtures =
            self.locator.discover(&self.config.tests_dir, self.config.filter.as_deref())?;

        log::info!(
            "Running {} fixture(s) from {} with {}",
            fixtures.len(),
            self.config.tests_dir.display(),
            self.runner.binary().display()
        );

        console_write(reporter.suite_started(&fixtures, self.runner.binary()));

        let mut recorder = ResultRecorder::new();

        for fixture in fixtures {
            console_write(reporter.fixture_started(&fixture));

            let run = self.runner.run(&fixture, &mut *reporter).await;
            let outcome = match run {
                Ok(run) => recorder.record_run(fixture, run),
                Err(e) => {
                    log::warn!("Could not run {}: {}", fixture.name, e);
                    recorder.record_launch_failure(fixture, &e)
                }
            };

            console_write(reporter.fixture_finished(outcome));
        }

        let result = recorder.finish(start_time.elapsed());
        console_write(reporter.summary(&result));

        log::info!(
            "Finished {} fixture(s): {} passed, {} failed",
            result.total(),
            result.passed(),
            result.failed()
        );

        if let Some(path) = &self.config.report {
            match result.save_to_file(path) {
                Ok(()) => log::debug!("Wrote report to {}", path.display()),
                Err(e) => log::error!("Failed to write report to {}: {}", path.display(), e),
            }
        }

        Ok(result)
    }
}

fn console_write(result: io::Result<()>) {
    if let Err(e) = result {
        log::warn!("Failed to write progress output: {}", e);
    }
}

/// Builder pattern for creating harnesses
pub struct HarnessBuilder {
    config: TestConfig,
}

impl HarnessBuilder {
    /// Start building a harness for the given interpreter and fixtures directory
    pub fn new(binary: impl AsRef<Path>, tests_dir: impl AsRef<Path>) -> Self {
        let config = TestConfig::new(binary.as_ref().to_path_buf(), tests_dir.as_ref().to_path_buf());

        Self { config }
    }

    /// Resolve the interpreter from a build directory and profile instead
    pub fn profile(mut self, build_dir: impl AsRef<Path>, profile: Profile) -> Self {
        self.config.binary = None;
        self.config.build_dir = build_dir.as_ref().to_path_buf();
        self.config.profile = profile;
        self
    }

    /// Only run fixtures whose name contains `filter`
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.config.filter = Some(filter.into());
        self
    }

    /// Set the fixture extension
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.config.extension = extension.into();
        self
    }

    /// Write a JSON report after the run
    pub fn report(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.report = Some(path.into());
        self
    }

    /// Build the harness
    pub fn build(self) -> Result<LoxHarness, TestError> {
        LoxHarness::new(self.config)
    }
}
