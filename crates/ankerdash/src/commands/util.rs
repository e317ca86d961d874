//! Shared helpers for bridge-bound commands.

use std::sync::Arc;

use ankerdash_api::ChannelKind;
use ankerdash_core::{ChannelSelection, CoreError, Dashboard, NullSink};
use serde::Serialize;
use tracing::debug;

use crate::config::Context;
use crate::error::CliError;
use crate::output;

/// Start a control-only dashboard and wait for its transport to open.
pub async fn connect_control(ctx: &Context) -> Result<Dashboard, CliError> {
    let mut config = ctx.dashboard.clone();
    config.channels = ChannelSelection::control_only();

    let dash = Dashboard::new(config, Arc::new(NullSink), None)?;
    dash.start()?;

    let timeout = ctx.settings.timeout;
    match dash.wait_until_open(ChannelKind::Control, timeout).await {
        Ok(()) => {
            debug!(bridge = %ctx.dashboard.bridge, "control channel open");
            Ok(dash)
        }
        Err(CoreError::Timeout { timeout_secs }) => {
            dash.shutdown();
            Err(CliError::BridgeUnreachable {
                url: ctx.dashboard.bridge.to_string(),
                seconds: timeout_secs,
            })
        }
        Err(e) => {
            dash.shutdown();
            Err(e.into())
        }
    }
}

/// Flush queued control requests, then tear the dashboard down.
pub async fn finish(dash: &Dashboard) -> Result<(), CliError> {
    let flushed = dash.flush_control().await;
    dash.shutdown();
    flushed.map_err(CliError::from)
}

/// Connect, issue one control request, and make sure it was written.
pub async fn send_once(
    ctx: &Context,
    send: impl FnOnce(&Dashboard) -> Result<(), CoreError>,
) -> Result<(), CliError> {
    let dash = connect_control(ctx).await?;
    if let Err(e) = send(&dash) {
        dash.shutdown();
        return Err(e.into());
    }
    finish(&dash).await
}

/// Acknowledgement printed after a one-shot command.
#[derive(Debug, Serialize)]
pub struct Sent {
    pub command: &'static str,
    pub detail: String,
}

pub fn print_sent(sent: &Sent, ctx: &Context) -> Result<(), CliError> {
    let out = output::render_single(
        ctx.settings.output,
        sent,
        |s| s.detail.clone(),
        |s| s.command.to_owned(),
    )?;
    output::print_output(&out, ctx.settings.quiet);
    Ok(())
}
