// ── Channel registry ──
//
// Named set of channels owned by one dashboard. Registration order is
// kept so status output lists channels the way they were declared.
// Every channel's loop runs under a child of the registry's token, so
// tearing the registry down stops all reconnect timers at once.

use ankerdash_api::{ChannelClient, ChannelConfig, ChannelState, Frame, LifecycleHooks};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CoreError;

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: IndexMap<String, ChannelClient>,
    cancel: CancellationToken,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under `config.name`. The channel is not
    /// connected until [`start_if_present`](Self::start_if_present).
    pub fn register(
        &mut self,
        config: ChannelConfig,
        hooks: LifecycleHooks,
    ) -> Result<ChannelClient, CoreError> {
        if self.channels.contains_key(&config.name) {
            return Err(CoreError::DuplicateChannel { name: config.name });
        }

        let name = config.name.clone();
        debug!(channel = %name, url = %config.endpoint, "registering channel");
        let channel = ChannelClient::new(config, hooks, self.cancel.child_token());
        self.channels.insert(name, channel.clone());
        Ok(channel)
    }

    pub fn get(&self, name: &str) -> Result<&ChannelClient, CoreError> {
        self.channels
            .get(name)
            .ok_or_else(|| CoreError::UnknownChannel {
                name: name.to_owned(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelClient> {
        self.channels.values()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Connect `name` only if `presence` says its consumer exists.
    /// Returns whether the channel was started.
    pub fn start_if_present(
        &self,
        name: &str,
        presence: impl FnOnce() -> bool,
    ) -> Result<bool, CoreError> {
        let channel = self.get(name)?;
        if !presence() {
            debug!(channel = name, "consumer absent, not connecting");
            return Ok(false);
        }
        channel.connect();
        Ok(true)
    }

    /// Fire-and-forget send on an open channel.
    pub fn send(&self, name: &str, frame: Frame) -> Result<(), CoreError> {
        self.get(name)?.send(frame).map_err(CoreError::from)
    }

    pub fn state(&self, name: &str) -> Result<ChannelState, CoreError> {
        Ok(self.get(name)?.state())
    }

    /// Stop every channel and cancel pending reconnects.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        for channel in self.channels.values() {
            channel.shutdown();
        }
        info!(channels = self.channels.len(), "channel registry shut down");
    }
}

impl Drop for ChannelRegistry {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use url::Url;

    use super::*;

    fn config(name: &str) -> ChannelConfig {
        ChannelConfig::new(name, Url::parse("ws://127.0.0.1:9/ws/ctrl").unwrap())
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ChannelRegistry::new();
        registry.register(config("control"), LifecycleHooks::new()).unwrap();

        let err = registry
            .register(config("control"), LifecycleHooks::new())
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateChannel { ref name } if name == "control"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn names_keep_registration_order() {
        let mut registry = ChannelRegistry::new();
        for name in ["telemetry", "video", "control", "link-status"] {
            registry.register(config(name), LifecycleHooks::new()).unwrap();
        }
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["telemetry", "video", "control", "link-status"]);
    }

    #[test]
    fn unknown_channel() {
        let registry = ChannelRegistry::new();
        assert!(matches!(
            registry.get("video"),
            Err(CoreError::UnknownChannel { .. })
        ));
        assert!(matches!(
            registry.send("video", Frame::Text(String::new())),
            Err(CoreError::UnknownChannel { .. })
        ));
    }

    #[test]
    fn send_on_unopened_channel_fails() {
        let mut registry = ChannelRegistry::new();
        registry.register(config("control"), LifecycleHooks::new()).unwrap();

        let err = registry
            .send("control", Frame::Text("{}".into()))
            .unwrap_err();
        assert!(matches!(err, CoreError::ChannelNotOpen { ref name } if name == "control"));
    }

    #[test]
    fn absent_consumer_is_not_started() {
        let mut registry = ChannelRegistry::new();
        registry.register(config("video"), LifecycleHooks::new()).unwrap();

        let asked = Cell::new(false);
        let started = registry
            .start_if_present("video", || {
                asked.set(true);
                false
            })
            .unwrap();

        assert!(asked.get());
        assert!(!started);
        assert_eq!(registry.state("video").unwrap(), ChannelState::Closed);
        assert_eq!(registry.get("video").unwrap().attempts(), 0);
    }

    #[tokio::test]
    async fn present_consumer_is_started() {
        let mut registry = ChannelRegistry::new();
        registry.register(config("control"), LifecycleHooks::new()).unwrap();

        assert!(registry.start_if_present("control", || true).unwrap());
        registry.shutdown();
    }

    #[test]
    fn shutdown_prevents_later_connects() {
        let mut registry = ChannelRegistry::new();
        let channel = registry.register(config("control"), LifecycleHooks::new()).unwrap();
        registry.shutdown();

        // No runtime: a live connect would panic on spawn.
        channel.connect();
        assert_eq!(channel.attempts(), 0);
    }
}
