// ankerdash-core: Command codec, action tracking and dashboard composition.

pub mod codec;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod presenter;
pub mod registry;
pub mod tracker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use codec::{
    ActionKind, ActionPhase, CommandEnvelope, ControlRequest, Heater, VideoQuality, decode,
    encode_material_action, encode_setpoint,
};
pub use config::{ChannelSelection, DashboardConfig};
pub use dashboard::{Dashboard, VideoSink};
pub use error::CoreError;
pub use model::Telemetry;
pub use presenter::{
    ChannelBadge, DashboardView, DisplaySink, NullSink, StatusEvent, StatusPresenter,
};
pub use registry::ChannelRegistry;
pub use tracker::{ActionSignal, ActionState, ActionTracker};
