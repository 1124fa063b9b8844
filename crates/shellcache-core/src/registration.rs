//! Persisted worker registration.
//!
//! Records which cache version was installed and which is in control, so a
//! host runtime restarted later can resume the worker where it left off
//! instead of re-running install.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::worker::WorkerState;

/// Registration file name in cache directory
const REGISTRATION_FILE: &str = "registration.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationData {
    /// Origin whose pages the worker controls
    pub scope: String,
    pub installed_version: Option<String>,
    pub installed_at: Option<DateTime<Utc>>,
    pub active_version: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
}

impl RegistrationData {
    /// Lifecycle state a worker for `version` can resume in.
    pub fn state_for(&self, version: &str) -> WorkerState {
        if self.active_version.as_deref() == Some(version) {
            WorkerState::Activated
        } else if self.installed_version.as_deref() == Some(version) {
            WorkerState::Installed
        } else {
            WorkerState::Parsed
        }
    }
}

pub struct Registration {
    cache_dir: PathBuf,
    pub data: RegistrationData,
}

impl Registration {
    pub fn new(cache_dir: PathBuf, scope: &str) -> Self {
        Self {
            cache_dir,
            data: RegistrationData {
                scope: scope.to_string(),
                ..Default::default()
            },
        }
    }

    /// Load registration from disk. Returns false if there is none, or if it
    /// belongs to a different scope.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.registration_path();
        if !path.exists() {
            return Ok(false);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read registration file")?;
        let data: RegistrationData = serde_json::from_str(&contents)
            .context("Failed to parse registration file")?;

        if data.scope != self.data.scope {
            return Ok(false);
        }
        self.data = data;
        Ok(true)
    }

    /// Save registration to disk
    pub fn save(&self) -> Result<()> {
        let path = self.registration_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Remove the registration record
    pub fn clear(&mut self) -> Result<()> {
        self.data = RegistrationData {
            scope: self.data.scope.clone(),
            ..Default::default()
        };
        let path = self.registration_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn mark_installed(&mut self, version: &str) {
        self.data.installed_version = Some(version.to_string());
        self.data.installed_at = Some(Utc::now());
    }

    pub fn mark_activated(&mut self, version: &str) {
        self.data.active_version = Some(version.to_string());
        self.data.activated_at = Some(Utc::now());
    }

    pub fn state_for(&self, version: &str) -> WorkerState {
        self.data.state_for(version)
    }

    fn registration_path(&self) -> PathBuf {
        self.cache_dir.join(REGISTRATION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &str = "https://kedai.example/";

    #[test]
    fn test_state_for_version() {
        let mut data = RegistrationData::default();
        assert_eq!(data.state_for("v2"), WorkerState::Parsed);

        data.installed_version = Some("v2".to_string());
        data.active_version = Some("v1".to_string());
        assert_eq!(data.state_for("v2"), WorkerState::Installed);
        assert_eq!(data.state_for("v1"), WorkerState::Activated);
        assert_eq!(data.state_for("v3"), WorkerState::Parsed);
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut reg = Registration::new(dir.path().to_path_buf(), SCOPE);
        assert!(!reg.load().expect("load"));

        reg.mark_installed("app-cache-v1");
        reg.mark_activated("app-cache-v1");
        reg.save().expect("save");

        let mut reloaded = Registration::new(dir.path().to_path_buf(), SCOPE);
        assert!(reloaded.load().expect("load"));
        assert_eq!(reloaded.state_for("app-cache-v1"), WorkerState::Activated);
        assert!(reloaded.data.activated_at.is_some());

        reloaded.clear().expect("clear");
        assert!(!Registration::new(dir.path().to_path_buf(), SCOPE)
            .load()
            .expect("load"));
    }

    #[test]
    fn test_other_scope_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut reg = Registration::new(dir.path().to_path_buf(), SCOPE);
        reg.mark_installed("v1");
        reg.save().expect("save");

        let mut other = Registration::new(dir.path().to_path_buf(), "http://localhost:5173/");
        assert!(!other.load().expect("load"));
        assert_eq!(other.state_for("v1"), WorkerState::Parsed);
    }
}
