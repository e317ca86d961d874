// ankerdash-api: Self-healing WebSocket channels for the printer bridge.

pub mod channel;
pub mod endpoint;
pub mod error;
pub mod lifecycle;

pub use channel::{ChannelClient, ChannelConfig, Frame, LifecycleHooks, DEFAULT_RETRY_DELAY};
pub use endpoint::{ChannelKind, endpoint_for};
pub use error::Error;
pub use lifecycle::{ChannelState, Lifecycle};
