//! Durable scenario storage.
//!
//! [`ScenarioStore`] is the async, fallible interface the runner and
//! UI consume. [`FileScenarioStore`] keeps everything in one JSON
//! document guarded by a mutex and written via temp-file rename, so a
//! mutation is observed fully applied or not at all — in particular
//! the status / run-count / last-run triplet written by
//! [`ScenarioStore::complete_run`]. [`MemoryScenarioStore`] is the
//! same contract without persistence, for tests.

use async_trait::async_trait;
use cake_proto::{
    AssertionResult, EXPORT_VERSION, RunStatus, ScenarioExport, ScenarioStatus, StepAction,
    TestScenario, TestStep, now_ms,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No scenario with the given id.
    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),

    /// Underlying storage I/O failed.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document or an import payload was not valid JSON.
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// An import payload parsed but was not an export envelope.
    #[error("invalid import payload: {0}")]
    InvalidImport(String),
}

/// Which selector strategy the picker should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredSelector {
    #[default]
    Testid,
    Accessibility,
    Name,
    Css,
}

/// User settings persisted alongside scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auto_save: bool,
    pub highlight_elements: bool,
    pub show_accessibility_warnings: bool,
    pub preferred_selector: PreferredSelector,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_save: true,
            highlight_elements: true,
            show_accessibility_warnings: true,
            preferred_selector: PreferredSelector::default(),
        }
    }
}

/// Partial settings update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub auto_save: Option<bool>,
    pub highlight_elements: Option<bool>,
    pub show_accessibility_warnings: Option<bool>,
    pub preferred_selector: Option<PreferredSelector>,
}

/// Fields for a scenario about to be created; the store assigns id and
/// timestamps.
#[derive(Debug, Clone, Default)]
pub struct NewScenario {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

/// Partial scenario update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ScenarioPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub steps: Option<Vec<TestStep>>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ScenarioStatus>,
}

/// The persisted document: all scenarios plus settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageData {
    pub scenarios: Vec<TestScenario>,
    pub settings: Settings,
}

impl StorageData {
    fn scenario_mut(&mut self, id: &str) -> Result<&mut TestScenario, StoreError> {
        self.scenarios
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::ScenarioNotFound(id.to_string()))
    }

    fn add_scenario(&mut self, new: NewScenario) -> TestScenario {
        let now = now_ms();
        let scenario = TestScenario {
            id: generate_id(),
            name: new.name,
            description: new.description,
            steps: Vec::new(),
            tags: new.tags,
            status: ScenarioStatus::Draft,
            created_at_ms: now,
            updated_at_ms: now,
            last_run_at_ms: None,
            run_count: 0,
            assertion_results: Vec::new(),
        };
        self.scenarios.push(scenario.clone());
        scenario
    }

    fn apply_patch(&mut self, id: &str, patch: ScenarioPatch) -> Result<(), StoreError> {
        let scenario = self.scenario_mut(id)?;
        if let Some(name) = patch.name {
            scenario.name = name;
        }
        if let Some(description) = patch.description {
            scenario.description = description;
        }
        if let Some(steps) = patch.steps {
            scenario.steps = steps;
        }
        if let Some(tags) = patch.tags {
            scenario.tags = tags;
        }
        if let Some(status) = patch.status {
            scenario.status = status;
        }
        scenario.updated_at_ms = now_ms();
        Ok(())
    }

    fn update_last_run(&mut self, id: &str) -> Result<(), StoreError> {
        let scenario = self.scenario_mut(id)?;
        scenario.last_run_at_ms = Some(now_ms());
        scenario.run_count += 1;
        Ok(())
    }

    fn complete_run(
        &mut self,
        id: &str,
        status: RunStatus,
        assertion_results: Vec<AssertionResult>,
    ) -> Result<(), StoreError> {
        let now = now_ms();
        let scenario = self.scenario_mut(id)?;
        scenario.status = status.as_scenario_status();
        scenario.run_count += 1;
        scenario.last_run_at_ms = Some(now);
        scenario.assertion_results = assertion_results;
        scenario.updated_at_ms = now;
        Ok(())
    }

    fn add_step(&mut self, scenario_id: &str, action: StepAction) -> Result<TestStep, StoreError> {
        let step = TestStep {
            id: generate_id(),
            timestamp_ms: now_ms(),
            action,
        };
        let scenario = self.scenario_mut(scenario_id)?;
        scenario.steps.push(step.clone());
        scenario.updated_at_ms = now_ms();
        Ok(step)
    }

    fn delete_scenario(&mut self, id: &str) -> Result<(), StoreError> {
        let before = self.scenarios.len();
        self.scenarios.retain(|s| s.id != id);
        if self.scenarios.len() == before {
            return Err(StoreError::ScenarioNotFound(id.to_string()));
        }
        Ok(())
    }

    fn apply_settings(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.auto_save {
            self.settings.auto_save = v;
        }
        if let Some(v) = patch.highlight_elements {
            self.settings.highlight_elements = v;
        }
        if let Some(v) = patch.show_accessibility_warnings {
            self.settings.show_accessibility_warnings = v;
        }
        if let Some(v) = patch.preferred_selector {
            self.settings.preferred_selector = v;
        }
    }

    fn export_json(&self) -> Result<String, StoreError> {
        let export = ScenarioExport {
            scenarios: self.scenarios.clone(),
            exported_at_ms: now_ms(),
            version: EXPORT_VERSION.to_string(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Imports an export envelope, always treating the payload as new:
    /// every scenario gets a fresh id and fresh timestamps so imports
    /// never collide with (or silently overwrite) stored scenarios.
    fn import_json(&mut self, json: &str) -> Result<usize, StoreError> {
        let export: ScenarioExport = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidImport(e.to_string()))?;
        let count = export.scenarios.len();
        let now = now_ms();
        for mut scenario in export.scenarios {
            scenario.id = generate_id();
            scenario.created_at_ms = now;
            scenario.updated_at_ms = now;
            self.scenarios.push(scenario);
        }
        Ok(count)
    }
}

/// Process-unique id: epoch millis plus a sequence suffix.
fn generate_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{seq:04x}", now_ms())
}

/// Durable collection of scenarios and settings.
///
/// All operations are asynchronous and fallible; the runner maps
/// failures to run-level errors.
#[async_trait]
pub trait ScenarioStore: Send + Sync {
    /// Loads the whole document.
    async fn load(&self) -> Result<StorageData, StoreError>;

    /// Fetches one scenario, `None` when absent.
    async fn get_scenario(&self, id: &str) -> Result<Option<TestScenario>, StoreError>;

    /// Creates a scenario with no steps; returns it with assigned id.
    async fn add_scenario(&self, new: NewScenario) -> Result<TestScenario, StoreError>;

    /// Applies a partial update and bumps `updated_at_ms`.
    async fn update_scenario(&self, id: &str, patch: ScenarioPatch) -> Result<(), StoreError>;

    /// Sets just the lifecycle status.
    async fn update_scenario_status(
        &self,
        id: &str,
        status: ScenarioStatus,
    ) -> Result<(), StoreError>;

    /// Increments `run_count` and stamps `last_run_at_ms`.
    async fn update_last_run(&self, id: &str) -> Result<(), StoreError>;

    /// Records a finished run: terminal status, run count, last-run
    /// stamp, and the run's assertion results, as one write.
    async fn complete_run(
        &self,
        id: &str,
        status: RunStatus,
        assertion_results: Vec<AssertionResult>,
    ) -> Result<(), StoreError>;

    /// Appends a step, assigning its id and timestamp.
    async fn add_step(&self, scenario_id: &str, action: StepAction) -> Result<TestStep, StoreError>;

    /// Removes a scenario.
    async fn delete_scenario(&self, id: &str) -> Result<(), StoreError>;

    /// Applies a partial settings update.
    async fn update_settings(&self, patch: SettingsPatch) -> Result<(), StoreError>;

    /// Serializes all scenarios into an export envelope.
    async fn export(&self) -> Result<String, StoreError>;

    /// Imports an export envelope; returns how many scenarios were
    /// added. Imported scenarios always get fresh ids.
    async fn import(&self, json: &str) -> Result<usize, StoreError>;

    /// Removes everything, restoring defaults.
    async fn clear_all(&self) -> Result<(), StoreError>;
}

/// JSON-file-backed store.
pub struct FileScenarioStore {
    path: PathBuf,
    data: Mutex<StorageData>,
}

impl FileScenarioStore {
    /// Opens the store at `path`, loading the existing document or
    /// starting from defaults when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            StorageData::default()
        };
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, data: &StorageData) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(data)?;
        // Write-then-rename so readers never observe a torn document.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Runs a mutation against a draft copy, persists it, and only
    /// then commits it to memory, so a failed write leaves both the
    /// file and the cached document untouched.
    async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut StorageData) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self.data.lock().await;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        self.persist(&draft)?;
        *guard = draft;
        Ok(out)
    }
}

#[async_trait]
impl ScenarioStore for FileScenarioStore {
    async fn load(&self) -> Result<StorageData, StoreError> {
        Ok(self.data.lock().await.clone())
    }

    async fn get_scenario(&self, id: &str) -> Result<Option<TestScenario>, StoreError> {
        let data = self.data.lock().await;
        Ok(data.scenarios.iter().find(|s| s.id == id).cloned())
    }

    async fn add_scenario(&self, new: NewScenario) -> Result<TestScenario, StoreError> {
        debug!(name = %new.name, "adding scenario");
        self.mutate(|data| Ok(data.add_scenario(new))).await
    }

    async fn update_scenario(&self, id: &str, patch: ScenarioPatch) -> Result<(), StoreError> {
        self.mutate(|data| data.apply_patch(id, patch)).await
    }

    async fn update_scenario_status(
        &self,
        id: &str,
        status: ScenarioStatus,
    ) -> Result<(), StoreError> {
        self.mutate(|data| {
            data.apply_patch(
                id,
                ScenarioPatch {
                    status: Some(status),
                    ..ScenarioPatch::default()
                },
            )
        })
        .await
    }

    async fn update_last_run(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(|data| data.update_last_run(id)).await
    }

    async fn complete_run(
        &self,
        id: &str,
        status: RunStatus,
        assertion_results: Vec<AssertionResult>,
    ) -> Result<(), StoreError> {
        debug!(scenario = id, %status, "recording completed run");
        self.mutate(|data| data.complete_run(id, status, assertion_results))
            .await
    }

    async fn add_step(&self, scenario_id: &str, action: StepAction) -> Result<TestStep, StoreError> {
        self.mutate(|data| data.add_step(scenario_id, action)).await
    }

    async fn delete_scenario(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(|data| data.delete_scenario(id)).await
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<(), StoreError> {
        self.mutate(|data| {
            data.apply_settings(patch);
            Ok(())
        })
        .await
    }

    async fn export(&self) -> Result<String, StoreError> {
        self.data.lock().await.export_json()
    }

    async fn import(&self, json: &str) -> Result<usize, StoreError> {
        self.mutate(|data| data.import_json(json)).await
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        self.mutate(|data| {
            *data = StorageData::default();
            Ok(())
        })
        .await
    }
}

/// In-memory store with the same contract, for tests and fakes.
#[derive(Default)]
pub struct MemoryScenarioStore {
    data: Mutex<StorageData>,
}

impl MemoryScenarioStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScenarioStore for MemoryScenarioStore {
    async fn load(&self) -> Result<StorageData, StoreError> {
        Ok(self.data.lock().await.clone())
    }

    async fn get_scenario(&self, id: &str) -> Result<Option<TestScenario>, StoreError> {
        let data = self.data.lock().await;
        Ok(data.scenarios.iter().find(|s| s.id == id).cloned())
    }

    async fn add_scenario(&self, new: NewScenario) -> Result<TestScenario, StoreError> {
        Ok(self.data.lock().await.add_scenario(new))
    }

    async fn update_scenario(&self, id: &str, patch: ScenarioPatch) -> Result<(), StoreError> {
        self.data.lock().await.apply_patch(id, patch)
    }

    async fn update_scenario_status(
        &self,
        id: &str,
        status: ScenarioStatus,
    ) -> Result<(), StoreError> {
        self.data.lock().await.apply_patch(
            id,
            ScenarioPatch {
                status: Some(status),
                ..ScenarioPatch::default()
            },
        )
    }

    async fn update_last_run(&self, id: &str) -> Result<(), StoreError> {
        self.data.lock().await.update_last_run(id)
    }

    async fn complete_run(
        &self,
        id: &str,
        status: RunStatus,
        assertion_results: Vec<AssertionResult>,
    ) -> Result<(), StoreError> {
        self.data
            .lock()
            .await
            .complete_run(id, status, assertion_results)
    }

    async fn add_step(&self, scenario_id: &str, action: StepAction) -> Result<TestStep, StoreError> {
        self.data.lock().await.add_step(scenario_id, action)
    }

    async fn delete_scenario(&self, id: &str) -> Result<(), StoreError> {
        self.data.lock().await.delete_scenario(id)
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<(), StoreError> {
        self.data.lock().await.apply_settings(patch);
        Ok(())
    }

    async fn export(&self) -> Result<String, StoreError> {
        self.data.lock().await.export_json()
    }

    async fn import(&self, json: &str) -> Result<usize, StoreError> {
        self.data.lock().await.import_json(json)
    }

    async fn clear_all(&self) -> Result<(), StoreError> {
        *self.data.lock().await = StorageData::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cake_proto::TargetLocator;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> FileScenarioStore {
        FileScenarioStore::open(tmp.path().join("cake-e2e-data.json")).unwrap()
    }

    #[tokio::test]
    async fn test_open_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let data = store.load().await.unwrap();
        assert!(data.scenarios.is_empty());
        assert!(data.settings.auto_save);
        assert_eq!(data.settings.preferred_selector, PreferredSelector::Testid);
    }

    #[tokio::test]
    async fn test_add_and_reload() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let scenario = store
            .add_scenario(NewScenario {
                name: "login flow".into(),
                description: None,
                tags: vec!["smoke".into()],
            })
            .await
            .unwrap();
        assert_eq!(scenario.status, ScenarioStatus::Draft);
        assert!(scenario.steps.is_empty());

        let reopened = store_in(&tmp);
        let loaded = reopened.get_scenario(&scenario.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "login flow");
        assert_eq!(loaded.tags, vec!["smoke".to_string()]);
    }

    #[tokio::test]
    async fn test_add_step_assigns_id_and_timestamp() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let scenario = store
            .add_scenario(NewScenario {
                name: "s".into(),
                ..NewScenario::default()
            })
            .await
            .unwrap();
        let step = store
            .add_step(
                &scenario.id,
                StepAction::Click {
                    target: TargetLocator::css("#login-btn"),
                },
            )
            .await
            .unwrap();
        assert!(!step.id.is_empty());
        assert!(step.timestamp_ms > 0);

        let loaded = store.get_scenario(&scenario.id).await.unwrap().unwrap();
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(loaded.steps[0].id, step.id);
    }

    #[tokio::test]
    async fn test_complete_run_is_one_atomic_update() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        let scenario = store
            .add_scenario(NewScenario {
                name: "s".into(),
                ..NewScenario::default()
            })
            .await
            .unwrap();

        store
            .complete_run(&scenario.id, RunStatus::Passed, vec![])
            .await
            .unwrap();

        // Reload from disk: all three fields moved together.
        let reopened = store_in(&tmp);
        let loaded = reopened.get_scenario(&scenario.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ScenarioStatus::Passed);
        assert_eq!(loaded.run_count, 1);
        assert!(loaded.last_run_at_ms.is_some());
    }

    #[tokio::test]
    async fn test_complete_run_cancelled_reverts_to_draft() {
        let store = MemoryScenarioStore::new();
        let scenario = store
            .add_scenario(NewScenario {
                name: "s".into(),
                ..NewScenario::default()
            })
            .await
            .unwrap();
        store
            .update_scenario_status(&scenario.id, ScenarioStatus::Running)
            .await
            .unwrap();
        store
            .complete_run(&scenario.id, RunStatus::Cancelled, vec![])
            .await
            .unwrap();
        let loaded = store.get_scenario(&scenario.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ScenarioStatus::Draft);
        assert_eq!(loaded.run_count, 1);
    }

    #[tokio::test]
    async fn test_update_last_run_increments() {
        let store = MemoryScenarioStore::new();
        let scenario = store
            .add_scenario(NewScenario {
                name: "s".into(),
                ..NewScenario::default()
            })
            .await
            .unwrap();
        store.update_last_run(&scenario.id).await.unwrap();
        store.update_last_run(&scenario.id).await.unwrap();
        let loaded = store.get_scenario(&scenario.id).await.unwrap().unwrap();
        assert_eq!(loaded.run_count, 2);
        assert!(loaded.last_run_at_ms.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_scenario_errors() {
        let store = MemoryScenarioStore::new();
        let err = store
            .update_scenario_status("nope", ScenarioStatus::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ScenarioNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_scenario() {
        let store = MemoryScenarioStore::new();
        let scenario = store
            .add_scenario(NewScenario {
                name: "s".into(),
                ..NewScenario::default()
            })
            .await
            .unwrap();
        store.delete_scenario(&scenario.id).await.unwrap();
        assert!(store.get_scenario(&scenario.id).await.unwrap().is_none());
        assert!(matches!(
            store.delete_scenario(&scenario.id).await,
            Err(StoreError::ScenarioNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_export_import_reassigns_ids() {
        let store = MemoryScenarioStore::new();
        let original = store
            .add_scenario(NewScenario {
                name: "exported".into(),
                ..NewScenario::default()
            })
            .await
            .unwrap();

        let json = store.export().await.unwrap();
        let added = store.import(&json).await.unwrap();
        assert_eq!(added, 1);

        let data = store.load().await.unwrap();
        assert_eq!(data.scenarios.len(), 2);
        let imported = data
            .scenarios
            .iter()
            .find(|s| s.id != original.id)
            .unwrap();
        assert_eq!(imported.name, "exported");
        assert_ne!(imported.id, original.id);
    }

    #[tokio::test]
    async fn test_export_envelope_has_version() {
        let store = MemoryScenarioStore::new();
        let json = store.export().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], "1.0");
        assert!(value["exportedAtMs"].is_i64());
    }

    #[tokio::test]
    async fn test_import_garbage_is_rejected() {
        let store = MemoryScenarioStore::new();
        assert!(matches!(
            store.import("{\"not\": \"an export\"}").await,
            Err(StoreError::InvalidImport(_))
        ));
    }

    #[tokio::test]
    async fn test_settings_patch() {
        let store = MemoryScenarioStore::new();
        store
            .update_settings(SettingsPatch {
                preferred_selector: Some(PreferredSelector::Css),
                auto_save: Some(false),
                ..SettingsPatch::default()
            })
            .await
            .unwrap();
        let data = store.load().await.unwrap();
        assert!(!data.settings.auto_save);
        assert_eq!(data.settings.preferred_selector, PreferredSelector::Css);
        // Untouched fields keep their defaults.
        assert!(data.settings.highlight_elements);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store
            .add_scenario(NewScenario {
                name: "s".into(),
                ..NewScenario::default()
            })
            .await
            .unwrap();
        store.clear_all().await.unwrap();
        assert!(store.load().await.unwrap().scenarios.is_empty());

        let reopened = store_in(&tmp);
        assert!(reopened.load().await.unwrap().scenarios.is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
    }
}
