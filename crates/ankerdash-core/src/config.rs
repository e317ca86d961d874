// ── Runtime dashboard configuration ──
//
// Describes *where* the bridge is and which channels to run. Core never
// reads config files: the CLI builds a `DashboardConfig` (usually from an
// ankerdash-config profile) and hands it in.

use std::time::Duration;

use ankerdash_api::{ChannelKind, DEFAULT_RETRY_DELAY};
use serde::{Deserialize, Serialize};
use url::Url;

/// Which channels a dashboard should connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ChannelSelection {
    pub telemetry: bool,
    pub video: bool,
    pub control: bool,
    pub link_status: bool,
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self {
            telemetry: true,
            video: true,
            control: true,
            link_status: true,
        }
    }
}

impl ChannelSelection {
    /// Only the control channel; used by one-shot commands.
    pub fn control_only() -> Self {
        Self {
            telemetry: false,
            video: false,
            control: true,
            link_status: false,
        }
    }

    pub fn is_enabled(self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Telemetry => self.telemetry,
            ChannelKind::Video => self.video,
            ChannelKind::Control => self.control,
            ChannelKind::LinkStatus => self.link_status,
        }
    }
}

/// Configuration for one dashboard session.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Bridge base URL (e.g., `http://192.168.1.20:4470`).
    pub bridge: Url,
    /// Delay between reconnect attempts, per channel.
    pub retry_delay: Duration,
    pub channels: ChannelSelection,
}

impl DashboardConfig {
    pub fn new(bridge: Url) -> Self {
        Self {
            bridge,
            retry_delay: DEFAULT_RETRY_DELAY,
            channels: ChannelSelection::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let config = DashboardConfig::new(Url::parse("http://127.0.0.1:4470").unwrap());
        assert_eq!(config.retry_delay, Duration::from_millis(1000));
        assert!(ChannelKind::ALL.iter().all(|k| config.channels.is_enabled(*k)));
    }

    #[test]
    fn control_only() {
        let sel = ChannelSelection::control_only();
        let enabled: Vec<_> = ChannelKind::ALL
            .into_iter()
            .filter(|k| sel.is_enabled(*k))
            .collect();
        assert_eq!(enabled, vec![ChannelKind::Control]);
    }
}
