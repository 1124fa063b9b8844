//! CLI command implementations.

pub mod fetch;
pub mod lifecycle;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use shellcache_core::{Config, DiskCacheStorage, Registration, WorkerSettings};
use tracing::debug;

/// Subdirectory of the cache directory holding the cache stores
const STORES_DIR: &str = "caches";

/// State shared by every command.
pub struct Context {
    pub config: Config,
    pub settings: WorkerSettings,
    pub storage: Arc<DiskCacheStorage>,
    pub registration: Registration,
}

impl Context {
    pub fn load(config_path: Option<&Path>, cache_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if cache_dir.is_some() {
            config.cache_dir = cache_dir;
        }

        let settings = config.worker_settings()?;
        let cache_dir = config.cache_dir()?;
        debug!(?cache_dir, cache = %settings.cache_name, origin = %settings.origin, "Config loaded");

        let storage = Arc::new(DiskCacheStorage::new(cache_dir.join(STORES_DIR)));

        let mut registration = Registration::new(cache_dir, settings.origin.as_str());
        let found = registration.load()?;
        debug!(found, "Registration loaded");

        Ok(Self {
            config,
            settings,
            storage,
            registration,
        })
    }

    pub fn version(&self) -> &str {
        &self.settings.cache_name
    }
}

/// Write the default configuration to `path` (or the platform config file).
pub fn init(path: Option<&Path>, force: bool) -> Result<()> {
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    if target.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", target.display());
    }

    let config = Config::default();
    match path {
        Some(path) => config.save_to(path)?,
        None => config.save()?,
    }
    println!("Wrote {}", target.display());
    Ok(())
}
