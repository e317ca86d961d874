// ── Telemetry domain types ──

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{CommandEnvelope, command_type};
use crate::error::CoreError;

/// Job progress as reported by the printer (1001).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintStatus {
    #[serde(default)]
    pub name: String,
    /// Elapsed seconds.
    #[serde(default)]
    pub total_time: u64,
    /// Remaining seconds.
    #[serde(default)]
    pub time: u64,
    /// Progress in hundredths of a percent.
    #[serde(default)]
    pub progress: i64,
}

impl PrintStatus {
    /// Whole-percent progress, rounded.
    pub fn percent(&self) -> i64 {
        from_centi(self.progress)
    }
}

/// Heater reading in centi-degrees (1003 / 1004).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Temperature {
    #[serde(default)]
    pub current_temp: i64,
    #[serde(default)]
    pub target_temp: Option<i64>,
}

impl Temperature {
    pub fn current_celsius(&self) -> i64 {
        from_centi(self.current_temp)
    }

    pub fn target_celsius(&self) -> Option<i64> {
        self.target_temp.map(from_centi)
    }
}

/// Print head speed (1006).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintSpeed {
    /// mm/s
    #[serde(default)]
    pub value: u32,
}

impl PrintSpeed {
    /// Multiplier relative to the 50 mm/s baseline, e.g. `X5`.
    pub fn factor(self) -> String {
        format!("X{}", f64::from(self.value) / 50.0)
    }
}

/// Current / total layer (1052).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    #[serde(default)]
    pub real_print_layer: u32,
    #[serde(default)]
    pub total_layer: u32,
}

/// Typed projection of an inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Telemetry {
    PrintStatus(PrintStatus),
    NozzleTemp(Temperature),
    BedTemp(Temperature),
    PrintSpeed(PrintSpeed),
    LayerInfo(LayerInfo),
    MaterialAction { progress: Option<i64> },
    Other { command_type: i64 },
}

impl Telemetry {
    /// Project a decoded envelope onto the known command types.
    ///
    /// Unknown command types map to [`Telemetry::Other`]; a known type whose
    /// fields have the wrong shape is a [`CoreError::MalformedPayload`].
    pub fn from_envelope(envelope: &CommandEnvelope) -> Result<Self, CoreError> {
        let telemetry = match envelope.command_type {
            command_type::PRINT_STATUS => Self::PrintStatus(fields(envelope)?),
            command_type::NOZZLE_TEMP => Self::NozzleTemp(fields(envelope)?),
            command_type::BED_TEMP => Self::BedTemp(fields(envelope)?),
            command_type::PRINT_SPEED => Self::PrintSpeed(fields(envelope)?),
            command_type::LAYER_INFO => Self::LayerInfo(fields(envelope)?),
            command_type::MATERIAL_ACTION => Self::MaterialAction {
                progress: envelope.progress(),
            },
            other => Self::Other {
                command_type: other,
            },
        };
        Ok(telemetry)
    }
}

fn fields<T: DeserializeOwned>(envelope: &CommandEnvelope) -> Result<T, CoreError> {
    serde_json::from_value(Value::Object(envelope.fields.clone())).map_err(|e| {
        CoreError::MalformedPayload {
            reason: format!("commandType {}: {e}", envelope.command_type),
        }
    })
}

// ── Display helpers ─────────────────────────────────────────────────

/// Divide by 100, rounding half up. Used for centi-degrees and the
/// printer's hundredths-of-a-percent progress.
pub fn from_centi(centi: i64) -> i64 {
    (centi + 50).div_euclid(100)
}

/// `HH:MM:SS` from seconds.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
