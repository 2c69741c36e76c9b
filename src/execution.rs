//! Child process launch and live output relay

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::discovery::Fixture;
use crate::TestError;

/// How long to keep relaying after the process exited while a background
/// process it started still holds the output pipes
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Output stream of the interpreter process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One line of interpreter output, without its line terminator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub stream: Stream,
    pub text: String,
}

/// Receives interpreter output while the process is still running
pub trait OutputSink {
    /// Called once per line, in arrival order
    fn line(&mut self, stream: Stream, text: &str);
}

/// How a launched interpreter process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    /// Process exited with the given code
    Exited(i32),
    /// Process was terminated by a signal (Unix only)
    Signaled(i32),
}

impl Completion {
    /// Convert a process exit status
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signaled(signal);
            }
        }

        Self::Exited(-1)
    }

    /// Exit code, if the process exited normally
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }

    /// Only a clean exit with code 0 counts as success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

/// Result of running one fixture to completion
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub completion: Completion,
    /// Captured lines in arrival order (empty when capture is disabled)
    pub output: Vec<OutputLine>,
    pub duration: Duration,
}

/// Runs the interpreter against one fixture at a time
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: PathBuf,
    capture: bool,
}

impl ProcessRunner {
    /// Create a runner for the given interpreter executable
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), capture: true }
    }

    /// Keep a copy of relayed output in the returned `RunOutput`
    pub fn with_capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    /// Get the interpreter path
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run `<binary> <fixture>` and wait for it to terminate
    ///
    /// Stdout and stderr are drained by one reader task each and every line
    /// is handed to `sink` as soon as it arrives. Lines of one stream keep
    /// their order; lines of different streams are interleaved as they come.
    /// There is no timeout: a process that never exits blocks the caller.
    ///
    /// Draining stops once the process has exited and its pipes are closed,
    /// or `EXIT_DRAIN_GRACE` after exit if a background process it started
    /// still holds them open. Output written after that is not relayed.
    pub async fn run(
        &self,
        fixture: &Fixture,
        sink: &mut dyn OutputSink,
    ) -> Result<RunOutput, TestError> {
        let start_time = Instant::now();

        let mut cmd = TokioCommand::new(&self.binary);
        cmd.arg(&fixture.path).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        log::debug!("Spawning {} {}", self.binary.display(), fixture.path.display());

        let mut child = cmd.spawn().map_err(|e| TestError::Launch {
            binary: self.binary.display().to_string(),
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take().ok_or_else(|| pipe_missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| pipe_missing("stderr"))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let readers = [
            spawn_reader(stdout, Stream::Stdout, tx.clone()),
            spawn_reader(stderr, Stream::Stderr, tx),
        ];

        let mut output = Vec::new();
        let mut relay = |line: OutputLine| {
            sink.line(line.stream, &line.text);
            if self.capture {
                output.push(line);
            }
        };

        // The channel closes once both readers have seen end of file.
        let mut closed = false;
        let status = loop {
            tokio::select! {
                biased;
                line = rx.recv(), if !closed => match line {
                    Some(line) => relay(line),
                    None => closed = true,
                },
                status = child.wait() => break status?,
            }
        };

        let deadline = tokio::time::Instant::now() + EXIT_DRAIN_GRACE;
        while !closed {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(line)) => relay(line),
                Ok(None) => closed = true,
                Err(_) => break,
            }
        }

        for reader in readers {
            if !closed {
                reader.abort();
                continue;
            }
            match reader.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Error reading output of {}: {}", fixture.name, e),
                Err(e) => log::warn!("Output reader for {} failed: {}", fixture.name, e),
            }
        }

        if !closed {
            log::warn!(
                "{} exited but its output pipes are still open; stopped relaying",
                fixture.name
            );
        }

        let completion = Completion::from_status(status);
        log::debug!("{} finished with {:?}", fixture.name, completion);

        Ok(RunOutput { completion, output, duration: start_time.elapsed() })
    }
}

fn pipe_missing(name: &str) -> TestError {
    TestError::Io(io::Error::new(io::ErrorKind::Other, format!("child {} was not captured", name)))
}

/// Forward lines from one pipe until end of file
fn spawn_reader<R>(
    reader: R,
    stream: Stream,
    tx: mpsc::UnboundedSender<OutputLine>,
) -> JoinHandle<io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut segments = BufReader::new(reader).split(b'\n');
        while let Some(mut segment) = segments.next_segment().await? {
            if segment.last() == Some(&b'\r') {
                segment.pop();
            }
            let text = String::from_utf8_lossy(&segment).into_owned();
            if tx.send(OutputLine { stream, text }).is_err() {
                break;
            }
        }
        Ok(())
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Discard;

    impl OutputSink for Discard {
        fn line(&mut self, _stream: Stream, _text: &str) {}
    }

    #[derive(Default)]
    struct Collect(Vec<(Stream, String)>);

    impl OutputSink for Collect {
        fn line(&mut self, stream: Stream, text: &str) {
            self.0.push((stream, text.to_string()));
        }
    }

    fn script(dir: &TempDir, name: &str, body: &str) -> Fixture {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        Fixture::new(path)
    }

    #[tokio::test]
    async fn test_exit_code_and_relayed_lines() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = script(&temp_dir, "a.lox", "echo one\necho two >&2\necho three\nexit 3\n");
        let mut sink = Collect::default();

        let output = ProcessRunner::new("/bin/sh").run(&fixture, &mut sink).await.unwrap();

        assert_eq!(output.completion, Completion::Exited(3));
        assert!(!output.completion.is_success());

        let stdout: Vec<_> =
            sink.0.iter().filter(|(s, _)| *s == Stream::Stdout).map(|(_, t)| t.as_str()).collect();
        let stderr: Vec<_> =
            sink.0.iter().filter(|(s, _)| *s == Stream::Stderr).map(|(_, t)| t.as_str()).collect();
        assert_eq!(stdout, ["one", "three"]);
        assert_eq!(stderr, ["two"]);
        assert_eq!(output.output.len(), 3);
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = script(&temp_dir, "ok.lox", "exit 0\n");

        let output = ProcessRunner::new("/bin/sh").run(&fixture, &mut Discard).await.unwrap();

        assert_eq!(output.completion.code(), Some(0));
        assert!(output.completion.is_success());
    }

    #[tokio::test]
    async fn test_large_stderr_does_not_block() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = script(
            &temp_dir,
            "noisy.lox",
            "i=0\nwhile [ $i -lt 20000 ]; do echo \"diagnostic line $i\" >&2; i=$((i+1)); done\necho done\n",
        );
        let mut sink = Collect::default();

        let output = ProcessRunner::new("/bin/sh")
            .with_capture(false)
            .run(&fixture, &mut sink)
            .await
            .unwrap();

        assert!(output.completion.is_success());
        assert!(output.output.is_empty());
        assert_eq!(sink.0.len(), 20001);
        assert!(sink.0.contains(&(Stream::Stdout, "done".to_string())));
        assert_eq!(sink.0.iter().filter(|(s, _)| *s == Stream::Stderr).last().unwrap().1, "diagnostic line 19999");
    }

    #[tokio::test]
    async fn test_signal_termination() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = script(&temp_dir, "crash.lox", "kill -9 $$\n");

        let output = ProcessRunner::new("/bin/sh").run(&fixture, &mut Discard).await.unwrap();

        assert_eq!(output.completion, Completion::Signaled(9));
        assert_eq!(output.completion.code(), None);
        assert!(!output.completion.is_success());
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = script(&temp_dir, "a.lox", "exit 0\n");
        let runner = ProcessRunner::new(temp_dir.path().join("no-such-interpreter"));

        let result = runner.run(&fixture, &mut Discard).await;

        assert!(matches!(result, Err(TestError::Launch { .. })));
    }

    #[tokio::test]
    async fn test_non_utf8_output_is_relayed_lossily() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = script(&temp_dir, "bytes.lox", "printf 'caf\\351\\r\\n'\n");
        let mut sink = Collect::default();

        ProcessRunner::new("/bin/sh").run(&fixture, &mut sink).await.unwrap();

        assert_eq!(sink.0, vec![(Stream::Stdout, "caf\u{FFFD}".to_string())]);
    }

    /// Creates the file the fixture is waiting for once the first line arrives
    struct Release {
        go: std::path::PathBuf,
        lines: Vec<String>,
    }

    impl OutputSink for Release {
        fn line(&mut self, _stream: Stream, text: &str) {
            if self.lines.is_empty() {
                fs::write(&self.go, "").unwrap();
            }
            self.lines.push(text.to_string());
        }
    }

    #[tokio::test]
    async fn test_output_is_relayed_before_exit() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = script(
            &temp_dir,
            "wait.lox",
            "echo ready\nwhile [ ! -e \"$0.go\" ]; do sleep 0.05; done\necho released\n",
        );
        let mut sink = Release { go: temp_dir.path().join("wait.lox.go"), lines: Vec::new() };

        // The process only exits after the sink has seen its first line.
        let output = tokio::time::timeout(
            Duration::from_secs(10),
            ProcessRunner::new("/bin/sh").run(&fixture, &mut sink),
        )
        .await
        .expect("first line was not relayed while the process was running")
        .unwrap();

        assert!(output.completion.is_success());
        assert_eq!(sink.lines, ["ready", "released"]);
    }

    #[tokio::test]
    async fn test_background_process_holding_pipes_does_not_stall() {
        let temp_dir = TempDir::new().unwrap();
        let fixture = script(&temp_dir, "spawn.lox", "sleep 5 &\necho done\nexit 0\n");
        let mut sink = Collect::default();

        let started = Instant::now();
        let output = tokio::time::timeout(
            Duration::from_secs(4),
            ProcessRunner::new("/bin/sh").run(&fixture, &mut sink),
        )
        .await
        .expect("runner waited for the background process")
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(output.completion, Completion::Exited(0));
        assert_eq!(sink.0, vec![(Stream::Stdout, "done".to_string())]);
    }
}
