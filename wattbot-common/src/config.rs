//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `WATTBOT_ROOT_FOLDER` environment variable
//! 3. `root_folder` key of the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never stops startup: a warning is
//! logged and compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "WATTBOT_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "wattbot.db";

/// Artifact namespace directory inside the root folder
pub const ARTIFACTS_DIR: &str = "artifacts";

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

/// External detector invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Executable that runs meter digit inference
    pub command: String,
    /// Model input resolution in pixels
    pub image_size: u32,
    /// Detections below this confidence are discarded
    pub confidence_floor: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            command: "wattbot-detect".to_string(),
            image_size: 1280,
            confidence_floor: 0.5,
        }
    }
}

/// Background backfill settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillSettings {
    pub enabled: bool,
    pub batch_size: u32,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 10,
        }
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub server: ServerConfig,
    pub detector: DetectorSettings,
    pub backfill: BackfillSettings,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load from file, falling back to defaults when missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            warn!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Self::default();
        }

        match std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|content| Self::from_toml_str(&content))
        {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Failed to load config file {}: {}. Using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

/// Default location of the TOML config file
///
/// `~/.config/wattbot/config.toml` on Linux, the platform config dir elsewhere.
pub fn default_config_file() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("wattbot").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("/etc/wattbot/config.toml"))
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            dirs::data_local_dir()
                .map(|d| d.join("wattbot"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/wattbot"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("wattbot"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/wattbot"))
        } else if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("wattbot"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\wattbot"))
        } else {
            PathBuf::from("./wattbot_data")
        };

        Self { root_folder }
    }
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_config: Option<TomlConfig>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_config: None,
        }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_config = Some(config.clone());
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = self.toml_config.as_ref().and_then(|c| c.root_folder.clone()) {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout and derives paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder).map_err(|e| {
            Error::Config(format!(
                "Failed to create root folder {}: {}",
                self.root_folder.display(),
                e
            ))
        })?;
        std::fs::create_dir_all(self.artifacts_path())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn artifacts_path(&self) -> PathBuf {
        self.root_folder.join(ARTIFACTS_DIR)
    }
}
