use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub portal: PortalConfig,
  #[serde(default)]
  pub session: SessionConfig,
  #[serde(default)]
  pub query: QueryConfig,
  #[serde(default)]
  pub defaults: DefaultsConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
  /// Base URL of the portal backend (e.g., "https://portal.example.com")
  pub url: String,
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
}

impl PortalConfig {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  /// Hard upper bound on token validation during hydration
  #[serde(default = "default_validation_timeout")]
  pub validation_timeout_secs: u64,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      validation_timeout_secs: default_validation_timeout(),
    }
  }
}

impl SessionConfig {
  pub fn validation_timeout(&self) -> Duration {
    Duration::from_secs(self.validation_timeout_secs)
  }
}

/// What happens to a cache entry once its last subscriber detaches.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvictionConfig {
  #[default]
  Immediate,
  Never,
  /// Keep detached entries for `eviction_ttl_secs`
  Ttl,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
  #[serde(default = "default_stale_time")]
  pub stale_time_secs: u64,
  #[serde(default = "default_focus_throttle")]
  pub focus_throttle_secs: u64,
  /// Retries are opt-in; zero means a failed fetch is final
  #[serde(default)]
  pub retry_attempts: u32,
  #[serde(default = "default_retry_backoff")]
  pub retry_backoff_secs: u64,
  #[serde(default)]
  pub eviction: EvictionConfig,
  #[serde(default = "default_eviction_ttl")]
  pub eviction_ttl_secs: u64,
  /// Seed cold entries from the on-disk snapshot store
  #[serde(default = "default_true")]
  pub persist: bool,
}

impl Default for QueryConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: default_stale_time(),
      focus_throttle_secs: default_focus_throttle(),
      retry_attempts: 0,
      retry_backoff_secs: default_retry_backoff(),
      eviction: EvictionConfig::default(),
      eviction_ttl_secs: default_eviction_ttl(),
      persist: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
  #[serde(default = "default_per_page")]
  pub per_page: u32,
}

impl Default for DefaultsConfig {
  fn default() -> Self {
    Self {
      per_page: default_per_page(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter directive when RUST_LOG is unset
  #[serde(default = "default_log_level")]
  pub level: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
    }
  }
}

fn default_request_timeout() -> u64 {
  15
}

fn default_validation_timeout() -> u64 {
  10
}

fn default_stale_time() -> u64 {
  60
}

fn default_focus_throttle() -> u64 {
  30
}

fn default_retry_backoff() -> u64 {
  5
}

fn default_eviction_ttl() -> u64 {
  300
}

fn default_per_page() -> u32 {
  25
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./sportal.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/sportal/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/sportal/config.yaml\n\
                 with at least `portal: {{ url: https://... }}`."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("sportal.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("sportal").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.portal.url.trim().is_empty() {
      return Err(eyre!("portal.url must not be empty"));
    }
    Ok(config)
  }

  /// Directory for the SQLite store and log files.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("sportal"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::from_yaml("portal:\n  url: https://portal.example.com\n").unwrap();
    assert_eq!(config.portal.request_timeout_secs, 15);
    assert_eq!(config.session.validation_timeout(), Duration::from_secs(10));
    assert_eq!(config.query.focus_throttle_secs, 30);
    assert_eq!(config.query.retry_attempts, 0);
    assert_eq!(config.query.retry_backoff_secs, 5);
    assert_eq!(config.query.eviction, EvictionConfig::Immediate);
    assert!(config.query.persist);
    assert_eq!(config.defaults.per_page, 25);
    assert_eq!(config.log.level, "info");
  }

  #[test]
  fn test_ttl_eviction() {
    let yaml = r#"
portal:
  url: https://portal.example.com
query:
  retry_attempts: 2
  eviction: ttl
  eviction_ttl_secs: 120
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.query.retry_attempts, 2);
    assert_eq!(config.query.eviction, EvictionConfig::Ttl);
    assert_eq!(config.query.eviction_ttl_secs, 120);
  }

  #[test]
  fn test_never_eviction() {
    let yaml = "portal:\n  url: https://p.test\nquery:\n  eviction: never\n";
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.query.eviction, EvictionConfig::Never);
  }

  #[test]
  fn test_empty_url_rejected() {
    assert!(Config::from_yaml("portal:\n  url: \"  \"\n").is_err());
  }
}
