//! Application configuration management.
//!
//! This module handles loading and saving the worker configuration: the
//! origin the storefront is served from, the cache version tag of the
//! current deployment, and the shell manifest pre-cached on install.
//!
//! Configuration is stored at `~/.config/shellcache/config.json`. The
//! `SHELLCACHE_ORIGIN` and `SHELLCACHE_VERSION_TAG` environment variables
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::worker::WorkerSettings;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "shellcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ORIGIN_ENV: &str = "SHELLCACHE_ORIGIN";
const VERSION_TAG_ENV: &str = "SHELLCACHE_VERSION_TAG";

const DEFAULT_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_VERSION_TAG: &str = "app-cache-v1";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// App shell plus the landing-page images.
const DEFAULT_PRECACHE: &[&str] = &[
    "/",
    "/index.html",
    "/vite.svg",
    "/react.svg",
    "/manifest.json",
    "/assets/icons_new/servis_kompor.jpeg",
    "/assets/icons_new/bersih_rumah.jpeg",
    "/assets/icons_new/cat_rumah.jpeg",
    "/assets/icons_new/bersih_kebun.jpeg",
    "/assets/icons_new/default_kedai.jpeg",
    "/assets/home_services_card_bg.jpeg",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin the storefront is served from
    pub origin: String,
    /// Name of the current cache store; bump on every deployment
    pub version_tag: String,
    /// URLs pre-cached on install, absolute or relative to `origin`
    pub precache: Vec<String>,
    pub request_timeout_secs: u64,
    /// Overrides the platform cache directory
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            version_tag: DEFAULT_VERSION_TAG.to_string(),
            precache: DEFAULT_PRECACHE.iter().map(|p| p.to_string()).collect(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cache_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults if absent.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(origin) = std::env::var(ORIGIN_ENV) {
            self.origin = origin;
        }
        if let Ok(tag) = std::env::var(VERSION_TAG_ENV) {
            self.version_tag = tag;
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin: {}", self.origin))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate and resolve into the settings a worker is built with.
    pub fn worker_settings(&self) -> Result<WorkerSettings> {
        let origin = self.origin_url()?;
        crate::cache::validate_name(&self.version_tag)
            .with_context(|| format!("Invalid version tag: {:?}", self.version_tag))?;

        let precache = self
            .precache
            .iter()
            .map(|entry| {
                origin
                    .join(entry)
                    .with_context(|| format!("Invalid precache URL: {}", entry))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(WorkerSettings {
            cache_name: self.version_tag.clone(),
            origin,
            precache,
        })
    }
}
