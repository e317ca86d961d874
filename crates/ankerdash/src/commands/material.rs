//! Retract / extrude with live progress.

use std::time::Duration;

use ankerdash_api::ChannelKind;
use ankerdash_core::{ActionKind, ChannelBadge, Dashboard, DashboardView};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::info;

use crate::cli::{ActionArgs, OutputFormat};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    /// Sent; progress not followed.
    Sent,
    Complete,
    /// Interrupted with Ctrl-C; a stop command was sent.
    Stopped,
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Self::Sent => "requested",
            Self::Complete => "complete",
            Self::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Serialize)]
struct ActionReport {
    action: ActionKind,
    outcome: Outcome,
}

pub async fn handle(kind: ActionKind, args: ActionArgs, ctx: &Context) -> Result<(), CliError> {
    let dash = util::connect_control(ctx).await?;

    // Subscribe before starting so no transition is missed.
    let updates = WatchStream::new(dash.subscribe());
    if let Err(e) = dash.start_action(kind) {
        dash.shutdown();
        return Err(e.into());
    }

    let outcome = if args.detach {
        Ok(Outcome::Sent)
    } else {
        follow(&dash, kind, updates, progress_bar(kind, ctx)).await
    };

    let finished = util::finish(&dash).await;
    let outcome = outcome?;
    // Completion proves the start command arrived; only later sends matter.
    if outcome != Outcome::Complete {
        finished?;
    }

    info!(%kind, ?outcome, "material action finished");
    let report = ActionReport {
        action: kind,
        outcome,
    };
    let out = output::render_single(
        ctx.settings.output,
        &report,
        |r| format!("{} {}", r.action, r.outcome.label()),
        |r| r.outcome.label().to_owned(),
    )?;
    output::print_output(&out, ctx.settings.quiet);
    Ok(())
}

/// Track the action until it completes, the control channel drops, or the
/// user interrupts.
async fn follow(
    dash: &Dashboard,
    kind: ActionKind,
    mut updates: WatchStream<DashboardView>,
    bar: ProgressBar,
) -> Result<Outcome, CliError> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            interrupted = &mut ctrl_c => {
                interrupted?;
                bar.abandon_with_message(format!("{kind} stopped"));
                dash.stop_action()?;
                return Ok(Outcome::Stopped);
            }
            view = updates.next() => {
                let Some(view) = view else {
                    return Err(CliError::Internal { message: "dashboard view closed".into() });
                };
                if !view.action.is_active() {
                    bar.finish_with_message(format!("{kind} complete"));
                    return Ok(Outcome::Complete);
                }
                if view.badge(ChannelKind::Control) == Some(ChannelBadge::Disconnected) {
                    bar.abandon_with_message(format!("{kind} interrupted"));
                    return Err(CliError::ConnectionLost {
                        channel: ChannelKind::Control.name().into(),
                    });
                }
                bar.set_position(u64::from(view.action.progress_percent));
            }
        }
    }
}

fn progress_bar(kind: ActionKind, ctx: &Context) -> ProgressBar {
    let interactive = matches!(
        ctx.settings.output,
        OutputFormat::Table | OutputFormat::Plain
    );
    if ctx.settings.quiet || !interactive {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{spinner} {msg:<10} [{bar:30}] {pos:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar.set_message(kind.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
