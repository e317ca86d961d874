// Channel endpoints on the printer bridge.
//
// Every channel lives on the same host as the bridge's web UI; only the
// path suffix differs. HTTP schemes map onto their WebSocket twins.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use url::Url;

use crate::error::Error;

/// The logical channels the bridge exposes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ChannelKind {
    /// JSON telemetry relayed from the printer's MQTT broker.
    Telemetry,
    /// Raw H.264 frames from the camera.
    Video,
    /// Commands towards the printer (and their echoes/progress).
    Control,
    /// Peer-to-peer link state between bridge and printer.
    LinkStatus,
}

impl ChannelKind {
    pub const ALL: [Self; 4] = [Self::Telemetry, Self::Video, Self::Control, Self::LinkStatus];

    /// Registry name of the channel (`"telemetry"`, `"link-status"`, ...).
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Path suffix on the bridge.
    pub fn path(self) -> &'static str {
        match self {
            Self::Telemetry => "/ws/mqtt",
            Self::Video => "/ws/video",
            Self::Control => "/ws/ctrl",
            Self::LinkStatus => "/ws/pppp-state",
        }
    }

    /// Whether frames on this channel are opaque bytes rather than JSON text.
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Video)
    }
}

/// Derive the WebSocket endpoint for `kind` from the bridge base URL.
///
/// `http` becomes `ws`, `https` becomes `wss`; `ws`/`wss` are kept. Any path
/// prefix on the bridge URL is preserved (reverse-proxy deployments), while
/// query and fragment are dropped.
pub fn endpoint_for(bridge: &Url, kind: ChannelKind) -> Result<Url, Error> {
    let scheme = match bridge.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };

    let mut url = bridge.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::UnsupportedScheme {
            scheme: bridge.scheme().to_owned(),
        })?;

    let prefix = bridge.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}{}", kind.path()));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;

    fn bridge(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn http_maps_to_ws() {
        let url = endpoint_for(&bridge("http://192.168.1.20:4470"), ChannelKind::Telemetry).unwrap();
        assert_eq!(url.as_str(), "ws://192.168.1.20:4470/ws/mqtt");
    }

    #[test]
    fn https_maps_to_wss() {
        let url = endpoint_for(&bridge("https://printer.lan/"), ChannelKind::Control).unwrap();
        assert_eq!(url.as_str(), "wss://printer.lan/ws/ctrl");
    }

    #[test]
    fn path_prefix_is_preserved() {
        let url =
            endpoint_for(&bridge("https://home.example/anker/?tab=1#x"), ChannelKind::LinkStatus)
                .unwrap();
        assert_eq!(url.as_str(), "wss://home.example/anker/ws/pppp-state");
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let err = endpoint_for(&bridge("ftp://printer.lan"), ChannelKind::Video).unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme { ref scheme } if scheme == "ftp"));
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in ChannelKind::ALL {
            assert_eq!(ChannelKind::from_str(kind.name()).unwrap(), kind);
        }
        assert_eq!(ChannelKind::LinkStatus.name(), "link-status");
    }

    #[test]
    fn only_video_is_binary() {
        let binary: Vec<_> = ChannelKind::ALL.into_iter().filter(|k| k.is_binary()).collect();
        assert_eq!(binary, vec![ChannelKind::Video]);
    }
}
