//! Command dispatch: CLI args -> dashboard operations -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod material;
pub mod monitor;
pub mod util;

use ankerdash_core::ActionKind;

use crate::cli::Command;
use crate::config::Context;
use crate::error::CliError;

/// Dispatch a bridge-bound command to its handler.
pub async fn dispatch(cmd: Command, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::Monitor(args) => monitor::handle(args, ctx).await,
        Command::Temp(args) => control::temp(args, ctx).await,
        Command::Retract(args) => material::handle(ActionKind::Retract, args, ctx).await,
        Command::Extrude(args) => material::handle(ActionKind::Extrude, args, ctx).await,
        Command::Stop => control::stop(ctx).await,
        Command::Light(args) => control::light(args, ctx).await,
        Command::Quality(args) => control::quality(args, ctx).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "command does not use the bridge".into(),
        }),
    }
}
