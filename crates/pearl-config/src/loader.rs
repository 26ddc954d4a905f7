use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::schema::PearlConfig;
use pearl_core::PearlError;

/// Loads and optionally hot-reloads the Pearl configuration.
pub struct ConfigLoader {
    config: Arc<RwLock<PearlConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > PEARL_CONFIG env > ~/.pearl/pearl.toml
    fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("PEARL_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pearl")
            .join("pearl.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> pearl_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::read_validated(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            Self::validated(Self::apply_env_overrides(PearlConfig::default()))?
        };

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Parse, apply env overrides, validate. Warnings are logged.
    fn read_validated(path: &Path) -> pearl_core::Result<PearlConfig> {
        let raw = std::fs::read_to_string(path)?;
        let parsed = toml::from_str::<PearlConfig>(&raw).map_err(|e| {
            PearlError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        Self::validated(Self::apply_env_overrides(parsed))
    }

    fn validated(config: PearlConfig) -> pearl_core::Result<PearlConfig> {
        for w in config.validate()? {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> PearlConfig {
        self.config.read().clone()
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (PEARL_MODEL, PEARL_DB_PATH, etc.)
    fn apply_env_overrides(mut config: PearlConfig) -> PearlConfig {
        if let Ok(v) = std::env::var("PEARL_MODEL") {
            config.reasoning.model = v;
        }
        if let Ok(v) = std::env::var("PEARL_DB_PATH") {
            config.memory.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PEARL_SERVER_LISTEN") {
            config.server.listen = v;
        }
        if let Ok(v) = std::env::var("PEARL_LOG_LEVEL") {
            config.logging.level = v;
        }
        // API keys: the config file wins, env is the fallback.
        let services = &mut config.services;
        if services.gemini_api_key.is_none()
            && let Ok(v) = std::env::var("GEMINI_API_KEY")
        {
            services.gemini_api_key = Some(v);
        }
        if services.openai_api_key.is_none()
            && let Ok(v) = std::env::var("OPENAI_API_KEY")
        {
            services.openai_api_key = Some(v);
        }
        config
    }

    /// Start a background file watcher that swaps in the new config when the
    /// file changes. The returned watcher must be kept alive.
    pub fn watch(&self) -> pearl_core::Result<notify::RecommendedWatcher> {
        let config = Arc::clone(&self.config);
        let path_for_event = self.config_path.clone();

        info!(config_path = ?self.config_path, "starting config file watcher");

        let mut watcher =
            notify::recommended_watcher(move |res: Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let is_our_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == path_for_event.file_name());
                    if !is_our_file {
                        return;
                    }

                    info!("config file changed, reloading");
                    match ConfigLoader::read_validated(&path_for_event) {
                        Ok(new_config) => {
                            *config.write() = new_config;
                            info!("configuration hot-reloaded");
                        }
                        Err(e) => {
                            warn!(error = %e, "config file has errors, keeping current config");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "file watcher error");
                }
            })
            .map_err(|e| PearlError::Config(format!("failed to create file watcher: {}", e)))?;

        // Watch the parent directory (some editors create temp files + rename)
        let watch_path = self.config_path.parent().unwrap_or(Path::new("."));
        watcher
            .watch(watch_path, RecursiveMode::NonRecursive)
            .map_err(|e| PearlError::Config(format!("failed to watch config directory: {}", e)))?;

        Ok(watcher)
    }
}
