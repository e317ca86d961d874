// Outbound control-channel requests.
//
// The control endpoint accepts a small set of single-key JSON objects:
// `{"mqtt": <envelope>}` forwards a command to the printer, `light` and
// `quality` toggle camera settings on the bridge.

use ankerdash_api::Frame;
use serde::{Serialize, Serializer};
use strum::{Display, EnumString};

use super::CommandEnvelope;
use crate::error::CoreError;

/// Camera stream quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum VideoQuality {
    Low,
    High,
}

impl VideoQuality {
    pub fn level(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

impl Serialize for VideoQuality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.level())
    }
}

/// One frame's worth of control-channel request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlRequest {
    Mqtt(CommandEnvelope),
    Light(bool),
    Quality(VideoQuality),
}

impl ControlRequest {
    /// Serialize into a text frame for the control channel.
    pub fn to_frame(&self) -> Result<Frame, CoreError> {
        Ok(Frame::Text(serde_json::to_string(self)?))
    }
}

impl From<CommandEnvelope> for ControlRequest {
    fn from(envelope: CommandEnvelope) -> Self {
        Self::Mqtt(envelope)
    }
}
