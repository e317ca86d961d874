//! Runtime settings: config file and profile first, CLI flags on top.

use std::time::Duration;

use clap::ValueEnum;

use ankerdash_config::Config;
use ankerdash_core::DashboardConfig;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Presentation settings shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub output: OutputFormat,
    pub color: ColorMode,
    pub quiet: bool,
    /// How long to wait for the bridge to accept a connection.
    pub timeout: Duration,
}

/// Everything a device command needs.
#[derive(Debug, Clone)]
pub struct Context {
    pub dashboard: DashboardConfig,
    pub settings: Settings,
}

impl Context {
    /// Load the config file and resolve it against `global`.
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let cfg = ankerdash_config::load_config()?;
        Self::resolve(global, &cfg)
    }

    pub fn resolve(global: &GlobalOpts, cfg: &Config) -> Result<Self, CliError> {
        Ok(Self {
            dashboard: dashboard_config(global, cfg)?,
            settings: settings(global, cfg)?,
        })
    }
}

/// The active profile's dashboard config with `--bridge` and
/// `--retry-delay-ms` applied.
pub fn dashboard_config(global: &GlobalOpts, cfg: &Config) -> Result<DashboardConfig, CliError> {
    let mut config = match &global.bridge {
        // An explicit bridge wins even if the profile's own URL is unusable.
        Some(bridge) => {
            let mut config = DashboardConfig::new(ankerdash_config::parse_bridge(bridge)?);
            if let Some(profile) = cfg.profile(global.profile.as_deref())? {
                config.channels = profile.channels;
                config.retry_delay = millis(
                    profile
                        .retry_delay_ms
                        .unwrap_or(cfg.defaults.retry_delay_ms),
                )?;
            } else {
                config.retry_delay = millis(cfg.defaults.retry_delay_ms)?;
            }
            config
        }
        None => cfg.dashboard_config(global.profile.as_deref())?,
    };

    if let Some(ms) = global.retry_delay_ms {
        config.retry_delay = millis(ms)?;
    }
    Ok(config)
}

pub fn settings(global: &GlobalOpts, cfg: &Config) -> Result<Settings, CliError> {
    let output = match global.output {
        Some(output) => output,
        None => parse_enum("defaults.output", &cfg.defaults.output)?,
    };
    let color = match global.color {
        Some(color) => color,
        None => parse_enum("defaults.color", &cfg.defaults.color)?,
    };
    let timeout = global.timeout.unwrap_or(cfg.defaults.timeout);
    if timeout == 0 {
        return Err(CliError::Validation {
            field: "timeout".into(),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(Settings {
        output,
        color,
        quiet: global.quiet,
        timeout: Duration::from_secs(timeout),
    })
}

fn parse_enum<T: ValueEnum>(field: &str, raw: &str) -> Result<T, CliError> {
    T::from_str(raw, true).map_err(|reason| CliError::Validation {
        field: field.into(),
        reason,
    })
}

fn millis(ms: u64) -> Result<Duration, CliError> {
    if ms == 0 {
        return Err(CliError::Validation {
            field: "retry_delay_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use ankerdash_config::Profile;
    use ankerdash_core::ChannelSelection;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["ankerdash"];
        argv.extend_from_slice(args);
        argv.push("stop");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn garage() -> Config {
        let mut cfg = Config::default();
        cfg.default_profile = Some("garage".into());
        cfg.profiles.insert(
            "garage".into(),
            Profile {
                bridge: "http://10.0.0.7:4470".into(),
                retry_delay_ms: Some(2500),
                channels: ChannelSelection::control_only(),
            },
        );
        cfg
    }

    #[test]
    fn profile_values_apply_without_flags() {
        let config = dashboard_config(&global(&[]), &garage()).unwrap();
        assert_eq!(config.bridge.as_str(), "http://10.0.0.7:4470/");
        assert_eq!(config.retry_delay, Duration::from_millis(2500));
        assert_eq!(config.channels, ChannelSelection::control_only());
    }

    #[test]
    fn flags_override_profile() {
        let config = dashboard_config(
            &global(&["--bridge", "ws://printer.lan:9000", "--retry-delay-ms", "200"]),
            &garage(),
        )
        .unwrap();
        assert_eq!(config.bridge.as_str(), "ws://printer.lan:9000/");
        assert_eq!(config.retry_delay, Duration::from_millis(200));
        assert_eq!(config.channels, ChannelSelection::control_only());
    }

    #[test]
    fn bad_flags_are_usage_errors() {
        let err = dashboard_config(&global(&["--bridge", "ftp://x"]), &garage()).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "bridge"));

        let err = dashboard_config(&global(&["--retry-delay-ms", "0"]), &garage()).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));

        let err = settings(&global(&["--timeout", "0"]), &garage()).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "timeout"));
    }

    #[test]
    fn settings_fall_back_to_config_defaults() {
        let mut cfg = Config::default();
        cfg.defaults.output = "json-compact".into();
        cfg.defaults.color = "never".into();
        cfg.defaults.timeout = 3;

        let resolved = settings(&global(&[]), &cfg).unwrap();
        assert_eq!(resolved.output, OutputFormat::JsonCompact);
        assert_eq!(resolved.color, ColorMode::Never);
        assert_eq!(resolved.timeout, Duration::from_secs(3));

        let resolved = settings(&global(&["-o", "yaml", "-q"]), &cfg).unwrap();
        assert_eq!(resolved.output, OutputFormat::Yaml);
        assert!(resolved.quiet);
    }

    #[test]
    fn unknown_output_in_config_is_reported() {
        let mut cfg = Config::default();
        cfg.defaults.output = "xml".into();
        let err = settings(&global(&[]), &cfg).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "defaults.output"));
    }
}
