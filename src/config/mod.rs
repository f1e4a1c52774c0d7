//! Engine configuration.
//!
//! The configuration controls where backend module manifests are looked up
//! and how the registry behaves. It is read from TOML or JSON, picked by file
//! extension.
//!
//! # Locations
//!
//! - Config file: `<config dir>/org.colorpipe/colorpipe.toml`
//! - Default module directory: `<data dir>/org.colorpipe/modules`
//!
//! where the base directories are platform dependent (`~/.config` and
//! `~/.local/share` on Linux).
//!
//! The `COLORPIPE_MODULE_PATH` environment variable adds module directories
//! in front of the configured ones, separated like `PATH`.
//!
//! # Example
//!
//! ```ignore
//! use colorpipe::config::EngineConfig;
//!
//! let config = EngineConfig::load_or_default();
//! let registry = config.build_registry();
//! let node = registry.create_node("//imaging/gain", None)?;
//! ```

use crate::error::{ColorPipeError, Result};
use crate::registry::{ImplementationTable, ManifestLoader, ModuleCache, Registry, Version};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Application identifier for config and data directories
pub const APP_ID: &str = "org.colorpipe";

/// Config filename
pub const CONFIG_FILE: &str = "colorpipe.toml";

/// Environment variable with extra module directories
pub const MODULE_PATH_ENV: &str = "COLORPIPE_MODULE_PATH";

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info,colorpipe=debug";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Default directory for module manifests
pub fn default_module_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID).join("modules"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Extra directories searched for module manifests
    pub module_paths: Vec<PathBuf>,

    /// Manifest file suffix
    pub manifest_extension: String,

    /// Also search the platform default module directory
    pub include_default_paths: bool,

    /// Host version modules are compared against; the crate version if unset
    pub host_version: Option<Version>,

    /// Cache resolution results in the registry
    pub cache_resolutions: bool,

    /// Tracing filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            module_paths: Vec::new(),
            manifest_extension: crate::registry::MANIFEST_EXTENSION.to_string(),
            include_default_paths: true,
            host_version: None,
            cache_resolutions: true,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load a config file, TOML or JSON by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ColorPipeError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        match Format::of(path) {
            Format::Json => serde_json::from_str(&content).map_err(|e| {
                ColorPipeError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            }),
            Format::Toml => toml::from_str(&content).map_err(|e| {
                ColorPipeError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            }),
        }
    }

    /// Load from the default location. A missing file yields the defaults.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path().ok_or_else(|| {
            ColorPipeError::Config("Could not determine config directory".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Load the default config, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_default().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to `path`, TOML or JSON by extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ColorPipeError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = match Format::of(path) {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content).map_err(|e| {
            ColorPipeError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Module directories in search order: environment, configured, default.
    /// Duplicates are dropped.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();

        if let Some(value) = std::env::var_os(MODULE_PATH_ENV) {
            paths.extend(std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()));
        }
        paths.extend(self.module_paths.iter().cloned());
        if self.include_default_paths {
            paths.extend(default_module_dir());
        }

        let mut unique = Vec::with_capacity(paths.len());
        for path in paths {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        unique
    }

    /// Registry with the builtin modules and a manifest loader over
    /// [`search_paths`](Self::search_paths), sharing a fresh cache.
    pub fn build_registry(&self) -> Registry {
        let manifests = ManifestLoader::new(self.search_paths(), ImplementationTable::with_builtins())
            .with_extension(self.manifest_extension.clone());

        let mut registry = Registry::new(Rc::new(ModuleCache::new()))
            .with_loader(crate::modules::builtin_loader())
            .with_loader(manifests);
        if let Some(version) = self.host_version {
            registry = registry.with_host_version(version);
        }
        registry.set_cache_resolutions(self.cache_resolutions);
        tracing::debug!("Built registry with {} loader(s)", registry.loader_count());
        registry
    }
}
