//! Fixture discovery and filtering

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::TestConfig;
use crate::TestError;

/// A single script fixture handed to the interpreter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Path passed to the interpreter
    pub path: PathBuf,
    /// File name including extension, used for filtering and reporting
    pub name: String,
}

impl Fixture {
    /// Create a fixture from a path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name }
    }

    /// Check whether the fixture name contains the filter text
    pub fn matches(&self, filter: &str) -> bool {
        self.name.contains(filter)
    }
}

/// Locates fixtures in a single directory
#[derive(Debug, Clone)]
pub struct FixtureLocator {
    extension: String,
}

impl FixtureLocator {
    /// Create a locator recognizing the given extension (without the dot)
    pub fn new(extension: impl Into<String>) -> Self {
        Self { extension: extension.into() }
    }

    /// Create a locator from the runner configuration
    pub fn from_config(config: &TestConfig) -> Self {
        Self::new(config.extension.clone())
    }

    /// Discover the fixtures directly inside `dir`, sorted by file name
    ///
    /// Only regular files carrying the fixture extension are returned. When a
    /// filter is given, a fixture is kept only if its file name contains the
    /// filter (case-sensitive). An empty list is not an error.
    pub fn discover(&self, dir: &Path, filter: Option<&str>) -> Result<Vec<Fixture>, TestError> {
        let metadata = fs::metadata(dir).map_err(|e| {
            TestError::Discovery(format!("Cannot access {}: {}", dir.display(), e))
        })?;

        if !metadata.is_dir() {
            return Err(TestError::Discovery(format!("{} is not a directory", dir.display())));
        }

        let mut fixtures = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                TestError::Discovery(format!("Failed to read {}: {}", dir.display(), e))
            })?;

            let path = entry.path();
            if !path.is_file() || !self.has_fixture_extension(path) {
                continue;
            }

            let fixture = Fixture::new(path);
            if let Some(filter) = filter {
                if !fixture.matches(filter) {
                    continue;
                }
            }

            fixtures.push(fixture);
        }

        // walkdir already yields entries by file name; sort on the lossy name
        // too so the order is the one reported to the user.
        fixtures.sort_by(|a, b| a.name.cmp(&b.name));

        log::debug!(
            "Discovered {} fixture(s) in {}{}",
            fixtures.len(),
            dir.display(),
            filter.map(|f| format!(" matching {:?}", f)).unwrap_or_default()
        );

        Ok(fixtures)
    }

    fn has_fixture_extension(&self, path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()).map(|ext| ext == self.extension).unwrap_or(false)
    }
}

impl Default for FixtureLocator {
    fn default() -> Self {
        Self::new("lox")
    }
}
