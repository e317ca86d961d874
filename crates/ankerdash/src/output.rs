//! Output formatting: table, JSON, YAML, plain.
//!
//! One-shot results go through [`render_single`]. Live status events from
//! the dashboard are written line by line by [`TerminalSink`].

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use ankerdash_core::model::{Temperature, format_hms};
use ankerdash_core::{
    ActionSignal, ChannelBadge, DashboardView, DisplaySink, StatusEvent, Telemetry,
};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

fn paint_badge(badge: ChannelBadge, color: bool) -> String {
    let text = badge.to_string();
    if !color {
        return text;
    }
    match badge {
        ChannelBadge::Healthy => text.green().to_string(),
        ChannelBadge::Connecting => text.yellow().to_string(),
        ChannelBadge::Disconnected => text.red().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a single serde-serializable item in the chosen format.
///
/// `detail_fn` produces the table view, `id_fn` the plain one.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => id_fn(data),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Dashboard snapshot ───────────────────────────────────────────────

#[derive(Tabled)]
struct ViewRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn view_rows(view: &DashboardView, color: bool) -> Vec<ViewRow> {
    let mut rows: Vec<ViewRow> = view
        .channels
        .iter()
        .map(|(kind, badge)| ViewRow {
            field: kind.name(),
            value: paint_badge(*badge, color),
        })
        .collect();

    let dash = || "-".to_owned();
    rows.push(ViewRow {
        field: "print",
        value: view.print.as_ref().map_or_else(dash, |p| {
            format!(
                "{} {}% (elapsed {}, remaining {})",
                p.name,
                p.percent(),
                format_hms(p.total_time),
                format_hms(p.time)
            )
        }),
    });
    rows.push(ViewRow {
        field: "nozzle",
        value: view.nozzle.map_or_else(dash, describe_temperature),
    });
    rows.push(ViewRow {
        field: "bed",
        value: view.bed.map_or_else(dash, describe_temperature),
    });
    rows.push(ViewRow {
        field: "speed",
        value: view
            .speed
            .map_or_else(dash, |s| format!("{} mm/s ({})", s.value, s.factor())),
    });
    rows.push(ViewRow {
        field: "layer",
        value: view
            .layer
            .map_or_else(dash, |l| format!("{}/{}", l.real_print_layer, l.total_layer)),
    });
    rows.push(ViewRow {
        field: "material",
        value: view.action.kind.map_or_else(
            || "idle".to_owned(),
            |kind| format!("{kind} {}%", view.action.progress_percent),
        ),
    });
    rows.push(ViewRow {
        field: "printer link",
        value: view.printer_link.clone().unwrap_or_else(dash),
    });
    rows.push(ViewRow {
        field: "last telemetry",
        value: view
            .last_telemetry_at
            .map_or_else(dash, |at| at.to_rfc3339()),
    });
    rows
}

/// Render the whole dashboard view.
pub fn render_view(
    format: OutputFormat,
    view: &DashboardView,
    color: bool,
) -> Result<String, CliError> {
    render_single(
        format,
        view,
        |v| Table::new(view_rows(v, color)).with(Style::rounded()).to_string(),
        |v| {
            view_rows(v, false)
                .into_iter()
                .map(|row| format!("{}={}", row.field, row.value))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )
}

fn describe_temperature(t: Temperature) -> String {
    match t.target_celsius() {
        Some(target) => format!("{}°C -> {target}°C", t.current_celsius()),
        None => format!("{}°C", t.current_celsius()),
    }
}

// ── Live events ──────────────────────────────────────────────────────

/// One human-readable line for a status event.
pub fn describe_event(event: &StatusEvent, color: bool) -> String {
    match event {
        StatusEvent::Channel { channel, badge } => {
            format!("{:<12} {}", channel.name(), paint_badge(*badge, color))
        }
        StatusEvent::Telemetry { telemetry } => describe_telemetry(telemetry),
        StatusEvent::TelemetryReset => "telemetry    lost, readings cleared".to_owned(),
        StatusEvent::SetpointControls { enabled } => {
            let state = if *enabled { "enabled" } else { "disabled" };
            format!("setpoints    {state}")
        }
        StatusEvent::Action { signal } => match signal {
            ActionSignal::Started { kind } => format!("material     {kind} started"),
            ActionSignal::Progress { kind, percent } => format!("material     {kind} {percent}%"),
            ActionSignal::Reset => "material     idle".to_owned(),
        },
        StatusEvent::PrinterLink { status } => format!("printer      {status}"),
    }
}

fn describe_telemetry(telemetry: &Telemetry) -> String {
    match telemetry {
        Telemetry::PrintStatus(p) => format!(
            "print        {} {}% elapsed {} remaining {}",
            p.name,
            p.percent(),
            format_hms(p.total_time),
            format_hms(p.time)
        ),
        Telemetry::NozzleTemp(t) => format!("nozzle       {}", describe_temperature(*t)),
        Telemetry::BedTemp(t) => format!("bed          {}", describe_temperature(*t)),
        Telemetry::PrintSpeed(s) => format!("speed        {} mm/s ({})", s.value, s.factor()),
        Telemetry::LayerInfo(l) => format!("layer        {}/{}", l.real_print_layer, l.total_layer),
        Telemetry::MaterialAction { progress } => match progress {
            Some(p) => format!("material     report {}%", (*p).clamp(0, 100)),
            None => "material     report".to_owned(),
        },
        Telemetry::Other { command_type } => format!("event        commandType {command_type}"),
    }
}

/// [`DisplaySink`] that writes each status event to stdout.
///
/// Table prints timestamped lines and plain the same lines undecorated.
/// Both JSON formats print one compact object per line; YAML prints one
/// document per event.
#[derive(Debug, Clone, Copy)]
pub struct TerminalSink {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl TerminalSink {
    pub fn new(format: OutputFormat, color: bool, quiet: bool) -> Self {
        Self {
            format,
            color,
            quiet,
        }
    }

    fn line(&self, event: &StatusEvent) -> Result<String, CliError> {
        Ok(match self.format {
            OutputFormat::Table => {
                let ts = chrono::Local::now().format("%H:%M:%S").to_string();
                let ts = if self.color {
                    ts.dimmed().to_string()
                } else {
                    ts
                };
                format!("{ts} {}", describe_event(event, self.color))
            }
            OutputFormat::Plain => describe_event(event, false),
            OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(event)?,
            OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(event)?.trim_end()),
        })
    }
}

impl DisplaySink for TerminalSink {
    fn render(&self, event: &StatusEvent) {
        match self.line(event) {
            Ok(line) => print_output(&line, self.quiet),
            Err(e) => tracing::warn!(error = %e, "failed to render status event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use ankerdash_api::ChannelKind;
    use ankerdash_core::ActionKind;

    use super::*;

    #[test]
    fn channel_badges_render_plainly_without_color() {
        let event = StatusEvent::Channel {
            channel: ChannelKind::LinkStatus,
            badge: ChannelBadge::Healthy,
        };
        assert_eq!(describe_event(&event, false), "link-status  healthy");
    }

    #[test]
    fn telemetry_lines_use_display_units() {
        let event = StatusEvent::Telemetry {
            telemetry: Telemetry::NozzleTemp(Temperature {
                current_temp: 20950,
                target_temp: Some(21000),
            }),
        };
        assert_eq!(describe_event(&event, false), "nozzle       210°C -> 210°C");

        let action = StatusEvent::Action {
            signal: ActionSignal::Progress {
                kind: ActionKind::Retract,
                percent: 70,
            },
        };
        assert_eq!(describe_event(&action, false), "material     retract 70%");
    }

    #[test]
    fn json_sink_emits_one_object_per_line() {
        let sink = TerminalSink::new(OutputFormat::Json, false, false);
        let line = sink
            .line(&StatusEvent::SetpointControls { enabled: true })
            .unwrap();
        assert_eq!(line, r#"{"event":"setpoint_controls","enabled":true}"#);
    }

    #[test]
    fn plain_view_is_key_value_lines() {
        let mut view = DashboardView::default();
        view.channels.insert(ChannelKind::Control, ChannelBadge::Connecting);
        view.printer_link = Some("connected".into());

        let out = render_view(OutputFormat::Plain, &view, false).unwrap();
        assert!(out.starts_with("control=connecting\n"));
        assert!(out.contains("printer link=connected"));
        assert!(out.contains("material=idle"));
    }
}
