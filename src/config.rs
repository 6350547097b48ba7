use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::constants;

/// User preferences persisted in `prefs.toml`.
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Config {
  #[serde(default)]
  pub api_keys: Vec<String>,
  pub use_mock: Option<bool>,
  pub region_code: Option<String>,
  pub storage_path: Option<PathBuf>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = project_dirs() {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file)
        && let Ok(config) = toml::from_str(&content)
      {
        return config;
      }
    }
    Self::default()
  }

  pub fn save(&self) -> Result<()> {
    let proj_dirs = project_dirs().context("No home directory for prefs.toml")?;
    let config_dir = proj_dirs.config_dir();
    std::fs::create_dir_all(config_dir).with_context(|| format!("Failed to create {}", config_dir.display()))?;
    let content = toml::to_string(self).context("Failed to serialize prefs")?;
    std::fs::write(config_dir.join("prefs.toml"), content).context("Failed to write prefs.toml")
  }
}

pub fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "ypfeed")
}

/// Effective runtime settings: `prefs.toml`, then environment, then CLI overrides.
#[derive(Debug, Clone)]
pub struct Settings {
  /// Catalog credentials, tried in order on every request.
  pub api_keys: Vec<String>,
  pub use_mock: bool,
  pub region_code: String,
  pub api_base: String,
  pub suggest_url: String,
  /// `None` keeps everything in memory for the lifetime of the process.
  pub storage_path: Option<PathBuf>,
}

impl Default for Settings {
  fn default() -> Self {
    let c = constants();
    Self {
      api_keys: Vec::new(),
      use_mock: false,
      region_code: c.default_region.clone(),
      api_base: c.api_base.clone(),
      suggest_url: c.suggest_url.clone(),
      storage_path: None,
    }
  }
}

impl Settings {
  /// Read once at startup.
  pub fn load() -> Self {
    Self::resolve(Config::load(), |key| std::env::var(key).ok())
  }

  fn resolve(config: Config, env_lookup: impl Fn(&str) -> Option<String>) -> Self {
    let mut settings = Settings {
      api_keys: clean_keys(config.api_keys.iter().map(String::as_str)),
      use_mock: config.use_mock.unwrap_or(false),
      storage_path: config.storage_path.or_else(default_storage_path),
      ..Settings::default()
    };
    if let Some(region) = config.region_code.filter(|r| !r.trim().is_empty()) {
      settings.region_code = region.trim().to_string();
    }

    let env_keys = env_lookup("YOUTUBE_API_KEYS")
      .map(|raw| parse_key_list(&raw))
      .filter(|keys| !keys.is_empty())
      .or_else(|| env_lookup("YOUTUBE_API_KEY").map(|raw| parse_key_list(&raw)).filter(|keys| !keys.is_empty()));
    if let Some(keys) = env_keys {
      settings.api_keys = keys;
    }
    if let Some(flag) = env_lookup("YOUTUBE_USE_MOCK") {
      settings.use_mock = parse_flag(&flag);
    }
    if let Some(region) = env_lookup("YOUTUBE_REGION").filter(|r| !r.trim().is_empty()) {
      settings.region_code = region.trim().to_string();
    }
    if let Some(path) = env_lookup("YPFEED_STORAGE").filter(|p| !p.trim().is_empty()) {
      settings.storage_path = Some(PathBuf::from(path.trim()));
    }
    settings
  }
}

/// Split a comma-separated credential list, dropping blanks.
pub fn parse_key_list(raw: &str) -> Vec<String> {
  clean_keys(raw.split(','))
}

fn clean_keys<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<String> {
  keys.map(str::trim).filter(|k| !k.is_empty()).map(str::to_string).collect()
}

fn parse_flag(raw: &str) -> bool {
  matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn default_storage_path() -> Option<PathBuf> {
  project_dirs().map(|dirs| dirs.data_dir().join("storage.json"))
}
