//! Persistent run history with JSONL format.
//!
//! Every completed run is appended as one JSON line. Malformed lines
//! are skipped on load, so a torn write cannot take the whole history
//! with it.

use cake_proto::TestRunResult;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only record of completed runs.
pub struct RunHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RunHistory {
    /// Creates a history at the given path. The file is created on
    /// first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one run result.
    pub fn append(&self, result: &TestRunResult) -> std::io::Result<()> {
        let line = serde_json::to_string(result)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Loads all recorded runs, oldest first.
    ///
    /// A missing file is an empty history; malformed lines are skipped.
    pub fn all(&self) -> std::io::Result<Vec<TestRunResult>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Loads the recorded runs of one scenario, oldest first.
    pub fn for_scenario(&self, scenario_id: &str) -> std::io::Result<Vec<TestRunResult>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|r| r.scenario_id == scenario_id)
            .collect())
    }
}
