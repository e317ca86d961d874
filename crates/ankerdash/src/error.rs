//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use ankerdash_config::ConfigError;
use ankerdash_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the bridge at {url} within {seconds}s")]
    #[diagnostic(
        code(ankerdash::bridge_unreachable),
        help(
            "Check that the bridge is running and reachable.\n\
             Set the address with --bridge or in your profile (ankerdash config path)."
        )
    )]
    BridgeUnreachable { url: String, seconds: u64 },

    #[error("Cannot connect to bridge at {url}: {reason}")]
    #[diagnostic(code(ankerdash::connection_failed))]
    ConnectionFailed { url: String, reason: String },

    #[error("The {channel} channel is not open")]
    #[diagnostic(
        code(ankerdash::channel_not_open),
        help("The bridge dropped the connection. Retry the command.")
    )]
    ChannelNotOpen { channel: String },

    #[error("Lost the {channel} channel while waiting for the printer")]
    #[diagnostic(
        code(ankerdash::connection_lost),
        help("Check the printer state with: ankerdash monitor")
    )]
    ConnectionLost { channel: String },

    // ── Actions ──────────────────────────────────────────────────────
    #[error("A {active} is already in progress")]
    #[diagnostic(
        code(ankerdash::action_in_progress),
        help("Wait for it to finish, or run: ankerdash stop")
    )]
    ActionInProgress { active: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(ankerdash::timeout),
        help("Increase the wait with --timeout.")
    )]
    Timeout { seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ankerdash::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(ankerdash::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: ankerdash --profile {name} --bridge <URL> config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(ankerdash::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(ankerdash::config))]
    Config(Box<figment::Error>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Internal error: {message}")]
    #[diagnostic(code(ankerdash::internal))]
    Internal { message: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BridgeUnreachable { .. }
            | Self::ConnectionFailed { .. }
            | Self::ChannelNotOpen { .. }
            | Self::ConnectionLost { .. } => exit_code::CONNECTION,
            Self::ActionInProgress { .. } | Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ChannelNotOpen { name } => Self::ChannelNotOpen { channel: name },
            CoreError::ActionAlreadyInProgress { active } => Self::ActionInProgress { active },
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Config { message } => Self::Validation {
                field: "bridge".into(),
                reason: message,
            },
            CoreError::DuplicateChannel { .. }
            | CoreError::UnknownChannel { .. }
            | CoreError::MalformedPayload { .. } => Self::Internal {
                message: err.to_string(),
            },
            CoreError::Internal(message) => Self::Internal { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { name, available } => Self::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            ConfigError::Serialization(e) => Self::Toml(e),
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_exit_codes() {
        let busy: CliError = CoreError::ActionAlreadyInProgress {
            active: "retract".into(),
        }
        .into();
        assert_eq!(busy.exit_code(), exit_code::CONFLICT);
        assert_eq!(busy.to_string(), "A retract is already in progress");

        let closed: CliError = CoreError::ChannelNotOpen {
            name: "control".into(),
        }
        .into();
        assert_eq!(closed.exit_code(), exit_code::CONNECTION);

        let timeout: CliError = CoreError::Timeout { timeout_secs: 3 }.into();
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let bad_scheme: CliError = CoreError::Config {
            message: "unsupported scheme".into(),
        }
        .into();
        assert_eq!(bad_scheme.exit_code(), exit_code::USAGE);
    }

    #[test]
    fn unknown_profile_lists_alternatives() {
        let err: CliError = ConfigError::UnknownProfile {
            name: "attic".into(),
            available: vec!["garage".into(), "m5".into()],
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        let CliError::ProfileNotFound { available, .. } = &err else {
            panic!("expected ProfileNotFound, got {err:?}");
        };
        assert_eq!(available, "garage, m5");

        let none: CliError = ConfigError::UnknownProfile {
            name: "attic".into(),
            available: Vec::new(),
        }
        .into();
        assert!(matches!(none, CliError::ProfileNotFound { ref available, .. } if available == "(none)"));
    }
}
