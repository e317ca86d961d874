// ── Status presenter ──
//
// Turns channel lifecycle changes, telemetry and action signals into
// display state. Output goes two ways: a typed event stream written to a
// `DisplaySink` port, and a `watch` snapshot of the whole dashboard for
// consumers that poll.

use std::collections::BTreeMap;
use std::sync::Arc;

use ankerdash_api::ChannelKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::sync::watch;

use crate::model::{LayerInfo, PrintSpeed, PrintStatus, Telemetry, Temperature};
use crate::tracker::{ActionSignal, ActionState};

/// Per-channel status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChannelBadge {
    /// Transport up, no frame seen yet.
    Connecting,
    /// At least one frame received on this connection.
    Healthy,
    Disconnected,
}

/// One display update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    Channel {
        channel: ChannelKind,
        badge: ChannelBadge,
    },
    Telemetry {
        telemetry: Telemetry,
    },
    /// Telemetry went away: clear every reading.
    TelemetryReset,
    SetpointControls {
        enabled: bool,
    },
    Action {
        signal: ActionSignal,
    },
    PrinterLink {
        status: String,
    },
}

/// Write-only output port implemented by the UI layer.
///
/// Action events are rendered while the dashboard holds its tracker lock,
/// so a sink must not call back into the dashboard.
pub trait DisplaySink: Send + Sync {
    fn render(&self, event: &StatusEvent);
}

impl<F> DisplaySink for F
where
    F: Fn(&StatusEvent) + Send + Sync,
{
    fn render(&self, event: &StatusEvent) {
        self(event);
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn render(&self, _event: &StatusEvent) {}
}

/// Everything the dashboard currently shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardView {
    pub channels: BTreeMap<ChannelKind, ChannelBadge>,
    pub print: Option<PrintStatus>,
    pub nozzle: Option<Temperature>,
    pub bed: Option<Temperature>,
    pub speed: Option<PrintSpeed>,
    pub layer: Option<LayerInfo>,
    pub setpoints_enabled: bool,
    pub action: ActionState,
    pub printer_link: Option<String>,
    pub last_telemetry_at: Option<DateTime<Utc>>,
}

impl DashboardView {
    pub fn badge(&self, kind: ChannelKind) -> Option<ChannelBadge> {
        self.channels.get(&kind).copied()
    }

    fn clear_telemetry(&mut self) {
        self.print = None;
        self.nozzle = None;
        self.bed = None;
        self.speed = None;
        self.layer = None;
    }
}

pub struct StatusPresenter {
    sink: Arc<dyn DisplaySink>,
    view: watch::Sender<DashboardView>,
}

impl std::fmt::Debug for StatusPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPresenter")
            .field("view", &*self.view.borrow())
            .finish_non_exhaustive()
    }
}

impl StatusPresenter {
    pub fn new(sink: Arc<dyn DisplaySink>) -> Self {
        let (view, _) = watch::channel(DashboardView::default());
        Self { sink, view }
    }

    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view.subscribe()
    }

    /// Record a channel lifecycle change.
    ///
    /// Telemetry health gates the set-point controls; losing telemetry
    /// also clears every reading.
    pub fn channel_badge(&self, channel: ChannelKind, badge: ChannelBadge) {
        let telemetry = channel == ChannelKind::Telemetry;
        self.view.send_modify(|view| {
            view.channels.insert(channel, badge);
            if telemetry {
                match badge {
                    ChannelBadge::Healthy => view.setpoints_enabled = true,
                    ChannelBadge::Disconnected => {
                        view.setpoints_enabled = false;
                        view.clear_telemetry();
                    }
                    ChannelBadge::Connecting => {}
                }
            }
            if channel == ChannelKind::LinkStatus && badge == ChannelBadge::Disconnected {
                view.printer_link = None;
            }
        });

        self.emit(&StatusEvent::Channel { channel, badge });
        if telemetry {
            match badge {
                ChannelBadge::Healthy => self.emit(&StatusEvent::SetpointControls { enabled: true }),
                ChannelBadge::Disconnected => {
                    self.emit(&StatusEvent::TelemetryReset);
                    self.emit(&StatusEvent::SetpointControls { enabled: false });
                }
                ChannelBadge::Connecting => {}
            }
        }
    }

    pub fn telemetry(&self, telemetry: Telemetry) {
        self.view.send_modify(|view| {
            view.last_telemetry_at = Some(Utc::now());
            match &telemetry {
                Telemetry::PrintStatus(status) => view.print = Some(status.clone()),
                Telemetry::NozzleTemp(temp) => view.nozzle = Some(*temp),
                Telemetry::BedTemp(temp) => view.bed = Some(*temp),
                Telemetry::PrintSpeed(speed) => view.speed = Some(*speed),
                Telemetry::LayerInfo(layer) => view.layer = Some(*layer),
                Telemetry::MaterialAction { .. } | Telemetry::Other { .. } => {}
            }
        });
        self.emit(&StatusEvent::Telemetry { telemetry });
    }

    /// Record a tracker transition along with the tracker state after it.
    pub fn action(&self, signal: ActionSignal, state: ActionState) {
        self.view.send_modify(|view| view.action = state);
        self.emit(&StatusEvent::Action { signal });
    }

    pub fn printer_link(&self, status: &str) {
        self.view
            .send_modify(|view| view.printer_link = Some(status.to_owned()));
        self.emit(&StatusEvent::PrinterLink {
            status: status.to_owned(),
        });
    }

    fn emit(&self, event: &StatusEvent) {
        self.sink.render(event);
    }
}
