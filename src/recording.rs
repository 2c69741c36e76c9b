//! Pass/fail classification and result accumulation

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::discovery::Fixture;
use crate::execution::{Completion, OutputLine, RunOutput};
use crate::TestError;

/// Classification of one fixture run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    /// Interpreter exited with code 0
    Passed,
    /// Non-zero exit, signal, or the interpreter could not be started
    Failed,
}

impl TestStatus {
    pub fn is_passed(&self) -> bool {
        *self == Self::Passed
    }
}

/// Outcome of running one fixture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub fixture: Fixture,
    pub status: TestStatus,
    /// How the process ended; `None` if it never started
    pub completion: Option<Completion>,
    /// Launch error message, if the process never started
    pub error_message: Option<String>,
    /// Output captured while relaying
    pub output: Vec<OutputLine>,
    pub duration: Duration,
}

impl RunOutcome {
    /// Classify a finished run
    pub fn from_run(fixture: Fixture, run: RunOutput) -> Self {
        let status =
            if run.completion.is_success() { TestStatus::Passed } else { TestStatus::Failed };

        Self {
            fixture,
            status,
            completion: Some(run.completion),
            error_message: None,
            output: run.output,
            duration: run.duration,
        }
    }

    /// Record a run whose process could not be started
    pub fn launch_failure(fixture: Fixture, error: &TestError) -> Self {
        Self {
            fixture,
            status: TestStatus::Failed,
            completion: None,
            error_message: Some(error.to_string()),
            output: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn passed(&self) -> bool {
        self.status.is_passed()
    }
}

/// Append-only record of fixture outcomes in execution order
#[derive(Debug, Default)]
pub struct ResultRecorder {
    outcomes: Vec<RunOutcome>,
}

impl ResultRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome and return it
    pub fn record(&mut self, outcome: RunOutcome) -> &RunOutcome {
        self.outcomes.push(outcome);
        &self.outcomes[self.outcomes.len() - 1]
    }

    /// Classify and append a finished run
    pub fn record_run(&mut self, fixture: Fixture, run: RunOutput) -> &RunOutcome {
        self.record(RunOutcome::from_run(fixture, run))
    }

    /// Append a failed outcome for a process that could not start
    pub fn record_launch_failure(&mut self, fixture: Fixture, error: &TestError) -> &RunOutcome {
        self.record(RunOutcome::launch_failure(fixture, error))
    }

    /// All outcomes recorded so far
    pub fn outcomes(&self) -> &[RunOutcome] {
        &self.outcomes
    }

    /// True iff every recorded outcome passed (true when nothing ran)
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(RunOutcome::passed)
    }

    /// Close the record into a suite result
    pub fn finish(self, duration: Duration) -> SuiteResult {
        SuiteResult::new(self.outcomes, duration)
    }
}

/// Aggregate result of one suite invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    outcomes: Vec<RunOutcome>,
    /// Wall-clock time of the whole run
    pub duration: Duration,
    /// When the run finished
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl SuiteResult {
    fn new(outcomes: Vec<RunOutcome>, duration: Duration) -> Self {
        Self { outcomes, duration, timestamp: chrono::Utc::now() }
    }

    /// Outcomes in execution order
    pub fn outcomes(&self) -> &[RunOutcome] {
        &self.outcomes
    }

    /// True iff every outcome passed
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(RunOutcome::passed)
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    /// Process exit status for this result
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, TestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save as JSON to a file
    pub fn save_to_file(&self, path: &Path) -> Result<(), TestError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(completion: Completion) -> RunOutput {
        RunOutput { completion, output: Vec::new(), duration: Duration::from_millis(5) }
    }

    fn launch_error() -> TestError {
        TestError::Launch { binary: "./x64/Debug/cpplox".to_string(), reason: "not found".to_string() }
    }

    #[test]
    fn test_classification_by_exit_code() {
        let fixture = Fixture::new("tests/a.lox");

        assert!(RunOutcome::from_run(fixture.clone(), run(Completion::Exited(0))).passed());
        assert!(!RunOutcome::from_run(fixture.clone(), run(Completion::Exited(1))).passed());
        assert!(!RunOutcome::from_run(fixture.clone(), run(Completion::Exited(-1))).passed());
        assert!(!RunOutcome::from_run(fixture.clone(), run(Completion::Exited(70))).passed());
        assert!(!RunOutcome::from_run(fixture, run(Completion::Signaled(11))).passed());
    }

    #[test]
    fn test_launch_failure_is_failed_outcome() {
        let outcome = RunOutcome::launch_failure(Fixture::new("tests/a.lox"), &launch_error());

        assert_eq!(outcome.status, TestStatus::Failed);
        assert_eq!(outcome.completion, None);
        assert!(outcome.error_message.unwrap().contains("not found"));
    }

    #[test]
    fn test_recorder_keeps_order_and_reduces_with_and() {
        let mut recorder = ResultRecorder::new();
        recorder.record_run(Fixture::new("a_test.lox"), run(Completion::Exited(0)));
        assert!(recorder.all_passed());

        recorder.record_run(Fixture::new("b_test.lox"), run(Completion::Exited(1)));
        recorder.record_run(Fixture::new("c_test.lox"), run(Completion::Exited(0)));
        assert!(!recorder.all_passed());

        let result = recorder.finish(Duration::from_secs(1));
        let summary: Vec<_> =
            result.outcomes().iter().map(|o| (o.fixture.name.as_str(), o.passed())).collect();
        assert_eq!(summary, [("a_test.lox", true), ("b_test.lox", false), ("c_test.lox", true)]);
        assert!(!result.all_passed());
        assert_eq!(result.passed(), 2);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn test_single_failure_anywhere_fails_suite() {
        for failing in 0..3 {
            let mut recorder = ResultRecorder::new();
            for i in 0..3 {
                let fixture = Fixture::new(format!("{}.lox", i));
                if i == failing {
                    recorder.record_launch_failure(fixture, &launch_error());
                } else {
                    recorder.record_run(fixture, run(Completion::Exited(0)));
                }
            }
            assert_eq!(recorder.finish(Duration::ZERO).exit_code(), 1);
        }
    }

    #[test]
    fn test_empty_suite_passes() {
        let result = ResultRecorder::new().finish(Duration::ZERO);

        assert_eq!(result.total(), 0);
        assert!(result.all_passed());
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn test_json_export() {
        let mut recorder = ResultRecorder::new();
        recorder.record_run(Fixture::new("tests/a.lox"), run(Completion::Exited(0)));
        let result = recorder.finish(Duration::from_millis(10));

        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();

        assert_eq!(json["outcomes"][0]["fixture"]["name"], "a.lox");
        assert_eq!(json["outcomes"][0]["status"], "Passed");
        assert!(json["timestamp"].is_string());
    }
}
