//! Config subcommand handlers.

use ankerdash_config::{self as config, Config, Profile};
use ankerdash_core::ChannelSelection;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            // Renders the defaults when no file exists yet.
            let cfg = config::load_config_or_default();
            let out = match global.output.unwrap_or(OutputFormat::Table) {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
                OutputFormat::JsonCompact => serde_json::to_string(&cfg)?,
                OutputFormat::Yaml => serde_yaml::to_string(&cfg)?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = config::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let cfg = initial_config(global)?;
            let written = config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Wrote {}", written.display());
            }
            Ok(())
        }
    }
}

/// A config with one profile built from `--profile`, `--bridge` and
/// `--retry-delay-ms`.
fn initial_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = Config::default();
    let name = global.profile.clone().unwrap_or_else(|| "default".into());

    let bridge = global
        .bridge
        .clone()
        .unwrap_or_else(|| cfg.defaults.bridge.clone());
    // Reject what the dashboard would reject later.
    config::parse_bridge(&bridge)?;
    if global.retry_delay_ms == Some(0) {
        return Err(CliError::Validation {
            field: "retry_delay_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }

    cfg.profiles.insert(
        name.clone(),
        Profile {
            bridge,
            retry_delay_ms: global.retry_delay_ms,
            channels: ChannelSelection::default(),
        },
    );
    cfg.default_profile = Some(name);
    Ok(cfg)
}
