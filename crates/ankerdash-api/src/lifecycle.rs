// ── Channel lifecycle state machine ──
//
// Pure bookkeeping for one channel: `Closed → Connecting → Open → Closed`,
// plus the `healthy` latch that flips on the first frame of each
// connection. The transport loop drives it and fires hooks based on
// what each transition reports.

use serde::Serialize;

/// Connection state of a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Connecting,
    Open,
    #[default]
    Closed,
}

/// Lifecycle of one channel across any number of reconnects.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: ChannelState,
    healthy: bool,
    attempts: u64,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// `true` once a frame has arrived on the current connection.
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Number of connection attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// A new transport is being created. Clears the health latch.
    pub fn begin_connect(&mut self) {
        self.state = ChannelState::Connecting;
        self.healthy = false;
        self.attempts += 1;
    }

    /// The transport reported "connected". Returns `true` if this moved
    /// the channel from `Connecting` to `Open`.
    pub fn opened(&mut self) -> bool {
        if self.state != ChannelState::Connecting {
            return false;
        }
        self.state = ChannelState::Open;
        true
    }

    /// A frame arrived. Returns `true` exactly once per connection: for
    /// the first frame received while `Open`.
    pub fn message(&mut self) -> bool {
        if self.state != ChannelState::Open || self.healthy {
            return false;
        }
        self.healthy = true;
        true
    }

    /// The transport closed (cleanly, by error, or because the handshake
    /// failed). Returns `true` if the channel was not already `Closed`.
    pub fn closed(&mut self) -> bool {
        let was_live = self.state != ChannelState::Closed;
        self.state = ChannelState::Closed;
        self.healthy = false;
        was_live
    }
}
