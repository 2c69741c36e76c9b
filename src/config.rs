//! Configuration and settings for the test runner

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Build profile of the interpreter under test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Profile {
    /// Unoptimized build with debug checks
    #[default]
    Debug,
    /// Optimized build
    Release,
}

impl Profile {
    /// Get the build output directory name for this profile
    pub fn directory(&self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
        }
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "lox-tests")]
#[command(about = "Run Lox script fixtures against an interpreter build")]
#[command(version)]
pub struct TestConfig {
    /// Only run fixtures whose file name contains this text
    #[arg(value_name = "FILTER")]
    pub filter: Option<String>,

    /// Build profile of the interpreter to test
    #[arg(short, long, value_enum, default_value_t = Profile::Debug)]
    pub profile: Profile,

    /// Directory holding the per-profile interpreter builds
    #[arg(long, default_value = "./x64")]
    pub build_dir: PathBuf,

    /// File name of the interpreter executable, without platform suffix
    #[arg(long, default_value = "cpplox")]
    pub binary_name: String,

    /// Explicit interpreter path, overrides profile resolution
    #[arg(short, long)]
    pub binary: Option<PathBuf>,

    /// Directory containing the fixtures
    #[arg(short, long, default_value = "./tests")]
    pub tests_dir: PathBuf,

    /// File extension that marks a fixture
    #[arg(long, default_value = "lox")]
    pub extension: String,

    /// Do not relay interpreter output
    #[arg(short, long)]
    pub quiet: bool,

    /// Print run statistics after the summary
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Write the suite result as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

impl TestConfig {
    /// Create a configuration for an explicit binary and fixtures directory
    pub fn new(binary: PathBuf, tests_dir: PathBuf) -> Self {
        Self {
            filter: None,
            profile: Profile::Debug,
            build_dir: PathBuf::from("./x64"),
            binary_name: "cpplox".to_string(),
            binary: Some(binary),
            tests_dir,
            extension: "lox".to_string(),
            quiet: false,
            verbose: false,
            no_color: false,
            report: None,
        }
    }

    /// Resolve the interpreter executable for this run
    pub fn subject_binary(&self) -> PathBuf {
        match &self.binary {
            Some(path) => path.clone(),
            None => self.build_dir.join(self.profile.directory()).join(format!(
                "{}{}",
                self.binary_name,
                std::env::consts::EXE_SUFFIX
            )),
        }
    }

    /// Validate the configuration
    ///
    /// The binary and fixtures directory are not checked here: a missing
    /// directory is a discovery failure and a missing binary fails each
    /// fixture individually.
    pub fn validate(&self) -> Result<(), crate::TestError> {
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(crate::TestError::Config(format!(
                "Fixture extension must be non-empty and given without a leading dot: {:?}",
                self.extension
            )));
        }

        if self.binary.is_none() && self.binary_name.is_empty() {
            return Err(crate::TestError::Config("Binary name must not be empty".to_string()));
        }

        Ok(())
    }
}
