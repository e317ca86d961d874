// ── Command codec ──
//
// Builds outbound printer commands and decodes inbound ones. The printer
// speaks JSON objects tagged by an integer `commandType`; everything else
// in the object is command-specific. Material actions arrive in two
// shapes (nested under `enter_or_quit_materiel`, or flat) and decoding
// folds both into a single top-level `progress`.

mod request;

pub use request::{ControlRequest, VideoQuality};

use serde::Serialize;
use serde_json::{Map, Value};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::CoreError;

/// Known `commandType` values.
pub mod command_type {
    pub const PRINT_STATUS: i64 = 1001;
    pub const NOZZLE_TEMP: i64 = 1003;
    pub const BED_TEMP: i64 = 1004;
    pub const PRINT_SPEED: i64 = 1006;
    pub const MATERIAL_ACTION: i64 = 1023;
    pub const PREHEAT_CONFIG: i64 = 1037;
    pub const LAYER_INFO: i64 = 1052;
}

/// Group key of the nested material-action shape.
pub const MATERIAL_GROUP: &str = "enter_or_quit_materiel";

/// Opaque step length sent with every material action.
const MATERIAL_STEP_LEN: i64 = 80;

// ── Envelope ─────────────────────────────────────────────────────────

/// A printer command: its type tag plus free-form fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandEnvelope {
    #[serde(rename = "commandType")]
    pub command_type: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CommandEnvelope {
    pub fn new(command_type: i64) -> Self {
        Self {
            command_type,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Integer field, if present and integral.
    pub fn int(&self, key: &str) -> Option<i64> {
        self.field(key).and_then(Value::as_i64)
    }

    /// Normalized top-level progress of a material action. Fractional
    /// values round to the nearest whole percent.
    pub fn progress(&self) -> Option<i64> {
        let value = self.field("progress")?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|p| p.is_finite()).map(round_percent))
    }
}

/// Out-of-range values saturate; the tracker clamps for display.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn round_percent(value: f64) -> i64 {
    value.round() as i64
}

// ── Outbound ─────────────────────────────────────────────────────────

/// Heater addressed by a set-point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Heater {
    Nozzle,
    #[strum(to_string = "bed", serialize = "heatbed")]
    Bed,
}

impl Heater {
    fn wire_key(self) -> &'static str {
        match self {
            Self::Nozzle => "nozzle",
            Self::Bed => "heatbed",
        }
    }
}

/// Direction of a material action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
    Retract,
    Extrude,
}

/// Whether a material action is being started or stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Start,
    Stop,
}

/// Preheat set-point for one heater, in whole degrees Celsius.
///
/// The wire value is centi-degrees. `value: 1` rides along on every
/// preheat command.
pub fn encode_setpoint(heater: Heater, celsius: u16) -> CommandEnvelope {
    CommandEnvelope::new(command_type::PREHEAT_CONFIG)
        .with_field(heater.wire_key(), u32::from(celsius) * 100)
        .with_field("value", 1)
}

/// Start or stop a retract/extrude cycle.
///
/// Stop ignores `kind`: the printer has a single material slot.
pub fn encode_material_action(phase: ActionPhase, kind: ActionKind) -> CommandEnvelope {
    let (value, progress) = match (phase, kind) {
        (ActionPhase::Start, ActionKind::Retract) => (3, 0),
        (ActionPhase::Start, ActionKind::Extrude) => (2, 0),
        (ActionPhase::Stop, _) => (0, 100),
    };
    CommandEnvelope::new(command_type::MATERIAL_ACTION)
        .with_field("value", value)
        .with_field("progress", progress)
        .with_field("stepLen", MATERIAL_STEP_LEN)
}

// ── Inbound ──────────────────────────────────────────────────────────

/// Decode one inbound frame.
///
/// Fails with [`CoreError::MalformedPayload`] on invalid JSON, a
/// non-object payload, or a missing/non-integer `commandType`.
pub fn decode(raw: &[u8]) -> Result<CommandEnvelope, CoreError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| CoreError::malformed(format!("invalid JSON: {e}")))?;

    let Value::Object(mut fields) = value else {
        return Err(CoreError::malformed("expected a JSON object"));
    };

    let command_type = match fields.remove("commandType") {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| CoreError::malformed(format!("commandType {n} is not an integer")))?,
        Some(other) => {
            return Err(CoreError::malformed(format!(
                "commandType {other} is not an integer"
            )));
        }
        None => return Err(CoreError::malformed("missing commandType")),
    };

    if command_type == command_type::MATERIAL_ACTION {
        normalize_material(&mut fields);
    }

    Ok(CommandEnvelope {
        command_type,
        fields,
    })
}

/// A nested group, when present, is authoritative for progress.
fn normalize_material(fields: &mut Map<String, Value>) {
    let nested = match fields.get(MATERIAL_GROUP) {
        Some(Value::Object(group)) => group.get("progress").cloned(),
        _ => return,
    };
    match nested {
        Some(progress) => {
            fields.insert("progress".to_owned(), progress);
        }
        None => {
            fields.remove("progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn nozzle_setpoint_is_centi_degrees() {
        let env = encode_setpoint(Heater::Nozzle, 210);
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"commandType": 1037, "nozzle": 21000, "value": 1})
        );
    }

    #[test]
    fn bed_setpoint_uses_heatbed_key() {
        let env = encode_setpoint(Heater::Bed, 60);
        assert_eq!(env.int("heatbed"), Some(6000));
        assert_eq!(env.int("value"), Some(1));
        assert!(env.field("nozzle").is_none());
    }

    #[test]
    fn zero_setpoint_is_allowed() {
        assert_eq!(encode_setpoint(Heater::Nozzle, 0).int("nozzle"), Some(0));
    }

    #[test]
    fn material_action_values() {
        let cases = [
            (ActionPhase::Start, ActionKind::Retract, 3, 0),
            (ActionPhase::Start, ActionKind::Extrude, 2, 0),
            (ActionPhase::Stop, ActionKind::Retract, 0, 100),
            (ActionPhase::Stop, ActionKind::Extrude, 0, 100),
        ];
        for (phase, kind, value, progress) in cases {
            let env = encode_material_action(phase, kind);
            assert_eq!(env.command_type, 1023);
            assert_eq!(env.int("value"), Some(value), "{phase:?} {kind}");
            assert_eq!(env.progress(), Some(progress), "{phase:?} {kind}");
            assert_eq!(env.int("stepLen"), Some(80));
        }
    }

    #[test]
    fn decode_flat_material_progress() {
        let env = decode(br#"{"commandType":1023,"progress":40}"#).unwrap();
        assert_eq!(env.command_type, 1023);
        assert_eq!(env.progress(), Some(40));
    }

    #[test]
    fn decode_nested_material_progress() {
        let env = decode(br#"{"commandType":1023,"enter_or_quit_materiel":{"progress":40}}"#)
            .unwrap();
        assert_eq!(env.progress(), Some(40));
    }

    #[test]
    fn nested_progress_wins_over_flat() {
        let env = decode(
            br#"{"commandType":1023,"progress":10,"enter_or_quit_materiel":{"progress":55}}"#,
        )
        .unwrap();
        assert_eq!(env.progress(), Some(55));
    }

    #[test]
    fn nested_group_without_progress_hides_flat_progress() {
        let env =
            decode(br#"{"commandType":1023,"progress":10,"enter_or_quit_materiel":{"value":3}}"#)
                .unwrap();
        assert_eq!(env.progress(), None);
    }

    #[test]
    fn null_group_falls_back_to_flat() {
        let env =
            decode(br#"{"commandType":1023,"progress":20,"enter_or_quit_materiel":null}"#).unwrap();
        assert_eq!(env.progress(), Some(20));
    }

    #[test]
    fn fractional_progress_rounds() {
        let flat = decode(br#"{"commandType":1023,"progress":50.0}"#).unwrap();
        assert_eq!(flat.progress(), Some(50));

        let nested =
            decode(br#"{"commandType":1023,"enter_or_quit_materiel":{"progress":99.6}}"#).unwrap();
        assert_eq!(nested.progress(), Some(100));

        let text = decode(br#"{"commandType":1023,"progress":"50"}"#).unwrap();
        assert_eq!(text.progress(), None);
    }

    #[test]
    fn other_types_are_not_normalized() {
        let env = decode(br#"{"commandType":1001,"enter_or_quit_materiel":{"progress":5}}"#)
            .unwrap();
        assert_eq!(env.progress(), None);
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        let bad: [&[u8]; 6] = [
            b"not json",
            b"[1,2,3]",
            br#"{"ankerctl":1}"#,
            br#"{"commandType":"1001"}"#,
            br#"{"commandType":10.5}"#,
            b"",
        ];
        for raw in bad {
            let err = decode(raw).unwrap_err();
            assert!(
                matches!(err, CoreError::MalformedPayload { .. }),
                "{}",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[test]
    fn decode_strips_command_type_from_fields() {
        let env = decode(br#"{"commandType":1003,"currentTemp":2050}"#).unwrap();
        assert!(env.field("commandType").is_none());
        assert_eq!(env.int("currentTemp"), Some(2050));
    }

    #[test]
    fn heater_parses_from_cli_words() {
        assert_eq!("nozzle".parse::<Heater>().unwrap(), Heater::Nozzle);
        assert_eq!("bed".parse::<Heater>().unwrap(), Heater::Bed);
        assert_eq!("heatbed".parse::<Heater>().unwrap(), Heater::Bed);
    }
}
