use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dedup::{MatchMode, DEFAULT_THRESHOLD};
use library::ImportOptions;
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    /// Folder imported when `import_scan` gets no paths.
    pub music_root: String,
    pub library_path: String,
    pub duplicate_threshold: f64,
    /// Strip featured-artist suffixes before comparing titles.
    pub advanced_matching: bool,
    pub recursive_scan: bool,
    pub write_bardic_id: bool,
    pub mp3_only: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            music_root: "".to_string(),
            library_path: "library.redb".to_string(),
            duplicate_threshold: DEFAULT_THRESHOLD,
            advanced_matching: false,
            recursive_scan: true,
            write_bardic_id: true,
            mp3_only: true,
        }
    }
}

impl AppConfig {
    pub fn match_mode(&self) -> MatchMode {
        if self.advanced_matching {
            MatchMode::Advanced
        } else {
            MatchMode::Standard
        }
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            mp3_only: self.mp3_only,
            write_bardic_id: self.write_bardic_id,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("BARDIC_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Returns the config and whether it was freshly created.
pub fn load_or_create_config(path: &Path) -> Result<(AppConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: AppConfig = serde_yaml::from_str(&contents)?;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        if config.library_path.trim().is_empty() {
            config.library_path = "library.redb".to_string();
        }
        config.duplicate_threshold = clamp_threshold(config.duplicate_threshold);
        return Ok((config, false));
    }

    let config = AppConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

pub fn resolve_music_root(config_path: &Path, value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(resolve_path(config_path, trimmed))
    }
}

/// NaN falls back to the default.
pub fn clamp_threshold(value: f64) -> f64 {
    if value.is_nan() {
        DEFAULT_THRESHOLD
    } else {
        value.clamp(0.0, 1.0)
    }
}
