// ── Dashboard abstraction ──
//
// Composition root for one printer session. Owns the channel registry,
// the action tracker and the presenter, and wires channel hooks so that
// inbound frames flow codec → tracker → presenter. Outbound commands go
// codec → control channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ankerdash_api::{
    ChannelClient, ChannelConfig, ChannelKind, ChannelState, Frame, LifecycleHooks, endpoint_for,
};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::codec::{
    self, ActionKind, ActionPhase, ControlRequest, Heater, VideoQuality, encode_material_action,
    encode_setpoint,
};
use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::model::Telemetry;
use crate::presenter::{ChannelBadge, DashboardView, DisplaySink, StatusPresenter};
use crate::registry::ChannelRegistry;
use crate::tracker::{ActionState, ActionTracker};

// ── VideoSink ────────────────────────────────────────────────────

/// External consumer of raw video frames.
///
/// `open` runs when the video transport connects, `close` when it drops;
/// a decoder should be created and destroyed accordingly.
pub trait VideoSink: Send + Sync {
    fn open(&self) {}
    fn frame(&self, data: &[u8]);
    fn close(&self) {}
}

// ── Dashboard ────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<DashboardInner>`.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    config: DashboardConfig,
    registry: ChannelRegistry,
    tracker: Arc<Mutex<ActionTracker>>,
    presenter: Arc<StatusPresenter>,
    has_video_sink: bool,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("bridge", &self.inner.config.bridge.as_str())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Build a dashboard and register all four channels. Does NOT connect --
    /// call [`start()`](Self::start).
    pub fn new(
        config: DashboardConfig,
        sink: Arc<dyn DisplaySink>,
        video: Option<Arc<dyn VideoSink>>,
    ) -> Result<Self, CoreError> {
        let tracker = Arc::new(Mutex::new(ActionTracker::new()));
        let presenter = Arc::new(StatusPresenter::new(sink));
        let has_video_sink = video.is_some();

        let mut registry = ChannelRegistry::new();
        for kind in ChannelKind::ALL {
            let endpoint = endpoint_for(&config.bridge, kind)?;
            let channel_config = ChannelConfig::new(kind.name(), endpoint)
                .with_binary(kind.is_binary())
                .with_retry_delay(config.retry_delay);

            let wiring = Wiring {
                kind,
                presenter: Arc::clone(&presenter),
                tracker: Arc::clone(&tracker),
                video: video.clone(),
            };
            registry.register(channel_config, wiring.hooks())?;
        }

        Ok(Self {
            inner: Arc::new(DashboardInner {
                config,
                registry,
                tracker,
                presenter,
                has_video_sink,
            }),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.inner.registry
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Connect every channel whose consumer is present. Returns the
    /// channels that were started.
    pub fn start(&self) -> Result<Vec<ChannelKind>, CoreError> {
        let mut started = Vec::new();
        for kind in ChannelKind::ALL {
            if self
                .inner
                .registry
                .start_if_present(kind.name(), || self.is_present(kind))?
            {
                started.push(kind);
            }
        }
        info!(
            bridge = %self.inner.config.bridge,
            channels = ?started,
            "dashboard started"
        );
        Ok(started)
    }

    fn is_present(&self, kind: ChannelKind) -> bool {
        self.inner.config.channels.is_enabled(kind)
            && (kind != ChannelKind::Video || self.inner.has_video_sink)
    }

    /// Stop every channel. No reconnect fires afterwards.
    pub fn shutdown(&self) {
        self.inner.registry.shutdown();
    }

    fn channel(&self, kind: ChannelKind) -> Result<&ChannelClient, CoreError> {
        self.inner.registry.get(kind.name())
    }

    pub fn channel_state(&self, kind: ChannelKind) -> Result<ChannelState, CoreError> {
        Ok(self.channel(kind)?.state())
    }

    /// Wait until `kind`'s transport is open.
    pub async fn wait_until_open(
        &self,
        kind: ChannelKind,
        timeout: Duration,
    ) -> Result<(), CoreError> {
        let mut rx = self.channel(kind)?.subscribe_state();
        let opened = tokio::time::timeout(timeout, rx.wait_for(|s| *s == ChannelState::Open));
        match opened.await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(CoreError::Internal(format!(
                "{kind} channel state stream closed"
            ))),
            Err(_) => Err(CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    /// Wait until `kind` has received its first frame.
    pub async fn wait_until_healthy(
        &self,
        kind: ChannelKind,
        timeout: Duration,
    ) -> Result<(), CoreError> {
        let mut rx = self.inner.presenter.subscribe();
        let healthy = tokio::time::timeout(
            timeout,
            rx.wait_for(|view| view.badge(kind) == Some(ChannelBadge::Healthy)),
        );
        match healthy.await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(CoreError::Internal("dashboard view closed".into())),
            Err(_) => Err(CoreError::Timeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    // ── Display state ────────────────────────────────────────────

    pub fn view(&self) -> DashboardView {
        self.inner.presenter.view()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.inner.presenter.subscribe()
    }

    pub fn action_state(&self) -> ActionState {
        lock(&self.inner.tracker).state()
    }

    // ── Commands ─────────────────────────────────────────────────

    fn send_control(&self, request: &ControlRequest) -> Result<(), CoreError> {
        let frame = request.to_frame()?;
        debug!(?request, "sending control request");
        self.inner
            .registry
            .send(ChannelKind::Control.name(), frame)
    }

    /// Send a preheat set-point in whole degrees Celsius.
    pub fn set_temperature(&self, heater: Heater, celsius: u16) -> Result<(), CoreError> {
        info!(%heater, celsius, "setting temperature");
        self.send_control(&ControlRequest::Mqtt(encode_setpoint(heater, celsius)))
    }

    /// Start a retract or extrude cycle.
    ///
    /// Fails without sending if another action is active. The controls
    /// switch to the running state before the command goes out so that
    /// progress replies always follow it; if the send fails the slot is
    /// released and the controls reset.
    pub fn start_action(&self, kind: ActionKind) -> Result<(), CoreError> {
        {
            let mut tracker = lock(&self.inner.tracker);
            let signal = tracker.start(kind)?;
            self.inner.presenter.action(signal, tracker.state());
        }

        let request = ControlRequest::Mqtt(encode_material_action(ActionPhase::Start, kind));
        if let Err(e) = self.send_control(&request) {
            warn!(%kind, error = %e, "material action not sent");
            let mut tracker = lock(&self.inner.tracker);
            if let Some(reset) = tracker.reset() {
                self.inner.presenter.action(reset, tracker.state());
            }
            return Err(e);
        }

        info!(%kind, "material action requested");
        Ok(())
    }

    /// Stop any material action. The controls reset immediately, whether
    /// or not the stop command could be sent.
    pub fn stop_action(&self) -> Result<(), CoreError> {
        let command = {
            let mut tracker = lock(&self.inner.tracker);
            let (command, signal) = tracker.stop();
            self.inner.presenter.action(signal, tracker.state());
            command
        };

        let sent = self.send_control(&ControlRequest::Mqtt(command));
        info!(sent = sent.is_ok(), "material action stopped");
        sent
    }

    pub fn set_light(&self, on: bool) -> Result<(), CoreError> {
        self.send_control(&ControlRequest::Light(on))
    }

    pub fn set_quality(&self, quality: VideoQuality) -> Result<(), CoreError> {
        self.send_control(&ControlRequest::Quality(quality))
    }

    /// Wait until every queued control request has been written.
    pub async fn flush_control(&self) -> Result<(), CoreError> {
        self.channel(ChannelKind::Control)?.flush().await?;
        Ok(())
    }
}

// ── Hook wiring ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct LinkReport {
    status: String,
}

/// Everything one channel's hooks need. Cloned into each closure.
#[derive(Clone)]
struct Wiring {
    kind: ChannelKind,
    presenter: Arc<StatusPresenter>,
    tracker: Arc<Mutex<ActionTracker>>,
    video: Option<Arc<dyn VideoSink>>,
}

impl Wiring {
    fn hooks(self) -> LifecycleHooks {
        let (connecting, connected, disconnected, errored, message) = (
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self,
        );

        LifecycleHooks::new()
            .on_connecting(move || {
                connecting
                    .presenter
                    .channel_badge(connecting.kind, ChannelBadge::Connecting);
                if let (ChannelKind::Video, Some(video)) = (connecting.kind, &connecting.video) {
                    video.open();
                }
            })
            .on_connected(move |_| {
                connected
                    .presenter
                    .channel_badge(connected.kind, ChannelBadge::Healthy);
            })
            .on_disconnected(move || {
                disconnected
                    .presenter
                    .channel_badge(disconnected.kind, ChannelBadge::Disconnected);
                if let (ChannelKind::Video, Some(video)) = (disconnected.kind, &disconnected.video)
                {
                    video.close();
                }
            })
            .on_transport_error(move |e| {
                debug!(channel = %errored.kind, error = %e, "transport error, reconnect scheduled");
            })
            .on_message(move |frame| message.dispatch(frame))
    }

    fn dispatch(&self, frame: &Frame) {
        match self.kind {
            ChannelKind::Telemetry => self.telemetry(frame),
            ChannelKind::Control => self.control(frame),
            ChannelKind::Video => {
                if let Some(video) = &self.video {
                    video.frame(frame.as_bytes());
                }
            }
            ChannelKind::LinkStatus => self.link_status(frame),
        }
    }

    fn telemetry(&self, frame: &Frame) {
        let decoded = codec::decode(frame.as_bytes())
            .and_then(|envelope| Telemetry::from_envelope(&envelope));
        match decoded {
            Ok(telemetry) => self.presenter.telemetry(telemetry),
            Err(e) => debug!(channel = %self.kind, error = %e, "dropping telemetry frame"),
        }
    }

    fn control(&self, frame: &Frame) {
        let envelope = match codec::decode(frame.as_bytes()) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(channel = %self.kind, error = %e, "dropping control frame");
                return;
            }
        };

        // Publish under the tracker lock so snapshots land in tracker order.
        let mut tracker = lock(&self.tracker);
        let signals = tracker.on_envelope(&envelope);
        let state = tracker.state();
        for signal in signals {
            self.presenter.action(signal, state);
        }
    }

    fn link_status(&self, frame: &Frame) {
        match serde_json::from_slice::<LinkReport>(frame.as_bytes()) {
            Ok(report) => self.presenter.printer_link(&report.status),
            Err(e) => debug!(channel = %self.kind, error = %e, "dropping link-status frame"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
