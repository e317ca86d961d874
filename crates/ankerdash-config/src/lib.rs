//! Shared configuration for ankerdash.
//!
//! TOML profiles merged with `ANKERDASH_`-prefixed environment variables,
//! and translation to `ankerdash_core::DashboardConfig`. The CLI layers
//! its flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ankerdash_core::{ChannelSelection, DashboardConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String, available: Vec<String> },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named printer profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Bridge used when no profile matches.
    #[serde(default = "default_bridge")]
    pub bridge: String,

    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Reconnect delay in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Seconds one-shot commands wait for the control channel.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            bridge: default_bridge(),
            output: default_output(),
            color: default_color(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout: default_timeout(),
        }
    }
}

fn default_bridge() -> String {
    "http://127.0.0.1:4470".into()
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_timeout() -> u64 {
    10
}

/// A named printer profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Bridge base URL (e.g., "http://192.168.1.20:4470").
    pub bridge: String,

    /// Override reconnect delay.
    pub retry_delay_ms: Option<u64>,

    /// Channels to connect.
    #[serde(default)]
    pub channels: ChannelSelection,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "ankerdash", "ankerdash").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ankerdash");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from a specific file. A missing file yields the defaults.
///
/// Environment overrides use `__` as the nesting separator, e.g.
/// `ANKERDASH_DEFAULTS__RETRY_DELAY_MS=500`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ANKERDASH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile resolution ──────────────────────────────────────────────

impl Config {
    /// Name of the profile to use: the explicit one, else `default_profile`,
    /// else `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    /// Look up a profile. An explicitly requested profile must exist; an
    /// implicit one may be absent, in which case `None` is returned.
    pub fn profile(&self, explicit: Option<&str>) -> Result<Option<&Profile>, ConfigError> {
        let name = self.active_profile_name(explicit);
        match (self.profiles.get(&name), explicit) {
            (Some(profile), _) => Ok(Some(profile)),
            (None, None) => Ok(None),
            (None, Some(_)) => Err(ConfigError::UnknownProfile {
                name,
                available: self.profiles.keys().cloned().collect(),
            }),
        }
    }

    /// Build a `DashboardConfig` for the active profile, falling back to
    /// `defaults` when no profile is configured.
    pub fn dashboard_config(&self, explicit: Option<&str>) -> Result<DashboardConfig, ConfigError> {
        match self.profile(explicit)? {
            Some(profile) => profile_to_dashboard_config(profile, &self.defaults),
            None => {
                let bridge = parse_bridge(&self.defaults.bridge)?;
                let mut config = DashboardConfig::new(bridge);
                config.retry_delay = retry_delay(self.defaults.retry_delay_ms)?;
                Ok(config)
            }
        }
    }
}

/// Build a `DashboardConfig` from a profile, filling gaps from `defaults`.
pub fn profile_to_dashboard_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<DashboardConfig, ConfigError> {
    let bridge = parse_bridge(&profile.bridge)?;
    let mut config = DashboardConfig::new(bridge);
    config.retry_delay = retry_delay(profile.retry_delay_ms.unwrap_or(defaults.retry_delay_ms))?;
    config.channels = profile.channels;
    Ok(config)
}

/// Parse and check a bridge URL.
pub fn parse_bridge(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "bridge".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    match url.scheme() {
        "http" | "https" | "ws" | "wss" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "bridge".into(),
            reason: format!("unsupported scheme '{other}' (expected http, https, ws or wss)"),
        }),
    }
}

fn retry_delay(ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::Validation {
            field: "retry_delay_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "m5"

[defaults]
retry_delay_ms = 2000

[profiles.m5]
bridge = "http://192.168.1.20:4470"

[profiles.garage]
bridge = "https://garage.lan/anker"
retry_delay_ms = 500

[profiles.garage.channels]
video = false
"#;

    fn write_sample() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, path)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert!(config.profiles.is_empty());
        assert_eq!(config.defaults.bridge, "http://127.0.0.1:4470");
    }

    #[test]
    fn profiles_load_and_resolve() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();

        let dash = config.dashboard_config(None).unwrap();
        assert_eq!(dash.bridge.as_str(), "http://192.168.1.20:4470/");
        assert_eq!(dash.retry_delay, Duration::from_millis(2000));
        assert_eq!(dash.channels, ChannelSelection::default());

        let garage = config.dashboard_config(Some("garage")).unwrap();
        assert_eq!(garage.retry_delay, Duration::from_millis(500));
        assert!(!garage.channels.video);
        assert!(garage.channels.telemetry);
    }

    #[test]
    fn unknown_explicit_profile_lists_available() {
        let (_dir, path) = write_sample();
        let config = load_config_from(&path).unwrap();
        let err = config.dashboard_config(Some("attic")).unwrap_err();
        let ConfigError::UnknownProfile { name, available } = &err else {
            panic!("expected UnknownProfile, got {err:?}");
        };
        assert_eq!(name, "attic");
        assert_eq!(available, &["garage".to_owned(), "m5".to_owned()]);
    }

    #[test]
    fn implicit_profile_falls_back_to_defaults() {
        let config = Config::default();
        let dash = config.dashboard_config(None).unwrap();
        assert_eq!(dash.bridge.as_str(), "http://127.0.0.1:4470/");
        assert_eq!(dash.retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                bridge: "http://10.0.0.5:4470".into(),
                retry_delay_ms: Some(250),
                channels: ChannelSelection::control_only(),
            },
        );
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles, config.profiles);
    }

    #[test]
    fn bridge_validation() {
        assert!(parse_bridge("wss://printer.lan").is_ok());
        assert!(matches!(
            parse_bridge("not a url"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            parse_bridge("ftp://printer.lan"),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn zero_retry_delay_is_rejected() {
        let profile = Profile {
            bridge: "http://printer.lan".into(),
            retry_delay_ms: Some(0),
            channels: ChannelSelection::default(),
        };
        let err = profile_to_dashboard_config(&profile, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "retry_delay_ms"));
    }
}
