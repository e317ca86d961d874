//! Clap derive structures for the `ankerdash` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so nothing here may
//! reference other crate modules.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ankerdash -- live status and remote control for a bridged 3D printer
#[derive(Debug, Parser)]
#[command(
    name = "ankerdash",
    version,
    about = "Watch and drive a 3D printer through its WebSocket bridge",
    long_about = "Connects to the printer bridge over four WebSocket channels \
        (telemetry, video, control, link status), keeps each one alive with \
        automatic reconnects, and renders what the printer reports.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config profile to use
    #[arg(long, short = 'p', env = "ANKERDASH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Bridge base URL, e.g. http://192.168.1.20:4470 (overrides profile)
    #[arg(long, short = 'b', env = "ANKERDASH_BRIDGE", global = true)]
    pub bridge: Option<String>,

    /// Delay between reconnect attempts in milliseconds
    #[arg(long, env = "ANKERDASH_RETRY_DELAY_MS", global = true)]
    pub retry_delay_ms: Option<u64>,

    /// Output format [default: table]
    #[arg(long, short = 'o', env = "ANKERDASH_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: auto]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Seconds to wait for the bridge to accept a connection [default: 10]
    #[arg(long, env = "ANKERDASH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines and tables
    Table,
    /// Pretty-printed JSON (one line per live event)
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text without decoration
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Color if stdout is a terminal and NO_COLOR is unset
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live printer status until interrupted
    #[command(alias = "mon")]
    Monitor(MonitorArgs),

    /// Set a heater's preheat target
    Temp(TempArgs),

    /// Retract filament (unload)
    Retract(ActionArgs),

    /// Extrude filament (load)
    Extrude(ActionArgs),

    /// Stop a running retract or extrude
    Stop,

    /// Switch the printer light
    Light(LightArgs),

    /// Set the camera stream quality
    Quality(QualityArgs),

    /// Inspect or create the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Append raw video frames to this file
    #[arg(long, value_name = "FILE")]
    pub video_out: Option<PathBuf>,

    /// Stop after this long, e.g. 30s or 5m (default: until Ctrl-C)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct TempArgs {
    /// Which heater to set
    pub heater: HeaterArg,

    /// Target in whole degrees Celsius
    pub celsius: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HeaterArg {
    Nozzle,
    #[value(alias = "heatbed")]
    Bed,
}

#[derive(Debug, Args)]
pub struct ActionArgs {
    /// Return once the command is sent instead of following progress
    #[arg(long)]
    pub detach: bool,
}

#[derive(Debug, Args)]
pub struct LightArgs {
    pub state: Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct QualityArgs {
    pub level: QualityArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QualityArg {
    Low,
    High,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the config file location
    Path,

    /// Write a config file with one profile (named by --profile, bridge from --bridge)
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}
