// ── Material action tracker ──
//
// Single-slot state machine for the one retract/extrude cycle the
// printer can run at a time. The control channel is shared with other
// traffic, so progress is attributed by command type (1023) and by the
// slot being occupied; frames that arrive while idle are ignored.

use serde::Serialize;
use tracing::debug;

use crate::codec::{
    ActionKind, ActionPhase, CommandEnvelope, command_type, encode_material_action,
};
use crate::error::CoreError;

/// Snapshot of the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionState {
    pub kind: Option<ActionKind>,
    pub progress_percent: u8,
}

impl ActionState {
    pub fn is_active(self) -> bool {
        self.kind.is_some()
    }
}

/// What the controls should do in response to a tracker transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum ActionSignal {
    /// Disable both action controls, enable stop.
    Started { kind: ActionKind },
    /// Show progress on the active kind's control.
    Progress { kind: ActionKind, percent: u8 },
    /// Restore every control to its idle state.
    Reset,
}

#[derive(Debug, Default)]
pub struct ActionTracker {
    state: ActionState,
}

impl ActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    /// Claim the slot for `kind`. The caller sends the start command.
    pub fn start(&mut self, kind: ActionKind) -> Result<ActionSignal, CoreError> {
        if let Some(active) = self.state.kind {
            return Err(CoreError::ActionAlreadyInProgress {
                active: active.to_string(),
            });
        }
        self.state = ActionState {
            kind: Some(kind),
            progress_percent: 0,
        };
        debug!(%kind, "material action started");
        Ok(ActionSignal::Started { kind })
    }

    /// Feed a progress report.
    ///
    /// Ignored unless `command_type` is a material action and the slot is
    /// occupied. Progress at or above 100 completes the action: the
    /// returned signals end with a single [`ActionSignal::Reset`].
    pub fn on_progress(&mut self, command_type: i64, progress: i64) -> Vec<ActionSignal> {
        if command_type != command_type::MATERIAL_ACTION {
            return Vec::new();
        }
        let Some(kind) = self.state.kind else {
            debug!(progress, "progress while idle ignored");
            return Vec::new();
        };

        let percent = clamp_percent(progress);
        self.state.progress_percent = percent;
        let mut signals = vec![ActionSignal::Progress { kind, percent }];

        if progress >= 100 {
            debug!(%kind, "material action complete");
            signals.extend(self.reset());
        }
        signals
    }

    /// Feed a decoded control-channel envelope. Frames without progress
    /// are ignored.
    pub fn on_envelope(&mut self, envelope: &CommandEnvelope) -> Vec<ActionSignal> {
        match envelope.progress() {
            Some(progress) => self.on_progress(envelope.command_type, progress),
            None => Vec::new(),
        }
    }

    /// Build the stop command and reset immediately.
    ///
    /// Works whether or not an action is active; the reset does not wait
    /// for the printer to confirm.
    pub fn stop(&mut self) -> (CommandEnvelope, ActionSignal) {
        // The stop command does not depend on direction.
        let kind = self.state.kind.unwrap_or(ActionKind::Retract);
        let command = encode_material_action(ActionPhase::Stop, kind);
        self.state = ActionState::default();
        debug!("material action stopped");
        (command, ActionSignal::Reset)
    }

    /// Return to idle. A no-op (no signal) when already idle.
    pub fn reset(&mut self) -> Option<ActionSignal> {
        if !self.state.is_active() {
            return None;
        }
        self.state = ActionState::default();
        Some(ActionSignal::Reset)
    }
}

fn clamp_percent(progress: i64) -> u8 {
    u8::try_from(progress.clamp(0, 100)).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::codec::decode;

    #[test]
    fn start_claims_the_slot() {
        let mut tracker = ActionTracker::new();
        assert_eq!(
            tracker.start(ActionKind::Extrude).unwrap(),
            ActionSignal::Started {
                kind: ActionKind::Extrude
            }
        );
        assert_eq!(
            tracker.state(),
            ActionState {
                kind: Some(ActionKind::Extrude),
                progress_percent: 0,
            }
        );
    }

    #[test]
    fn second_start_is_rejected() {
        let mut tracker = ActionTracker::new();
        tracker.start(ActionKind::Retract).unwrap();

        let err = tracker.start(ActionKind::Extrude).unwrap_err();
        assert!(matches!(err, CoreError::ActionAlreadyInProgress { ref active } if active == "retract"));
        assert_eq!(tracker.state().kind, Some(ActionKind::Retract));
    }

    #[test]
    fn progress_sequence_resets_exactly_once() {
        let mut tracker = ActionTracker::new();
        tracker.start(ActionKind::Extrude).unwrap();

        let mut resets = 0;
        let mut shown = Vec::new();
        for p in [0, 25, 60, 100] {
            for signal in tracker.on_progress(1023, p) {
                match signal {
                    ActionSignal::Progress { percent, .. } => shown.push(percent),
                    ActionSignal::Reset => resets += 1,
                    ActionSignal::Started { .. } => unreachable!(),
                }
            }
        }

        assert_eq!(shown, vec![0, 25, 60, 100]);
        assert_eq!(resets, 1);
        assert_eq!(tracker.state(), ActionState::default());

        // A late completion frame after the reset does nothing.
        assert!(tracker.on_progress(1023, 100).is_empty());
    }

    #[test]
    fn retract_scenario_over_the_wire() {
        let mut tracker = ActionTracker::new();
        tracker.start(ActionKind::Retract).unwrap();

        let frames = [
            r#"{"commandType":1023,"progress":30}"#,
            r#"{"commandType":1023,"enter_or_quit_materiel":{"progress":70}}"#,
            r#"{"commandType":1023,"progress":100}"#,
        ];
        let signals: Vec<_> = frames
            .iter()
            .flat_map(|raw| tracker.on_envelope(&decode(raw.as_bytes()).unwrap()))
            .collect();

        let retract = ActionKind::Retract;
        assert_eq!(
            signals,
            vec![
                ActionSignal::Progress { kind: retract, percent: 30 },
                ActionSignal::Progress { kind: retract, percent: 70 },
                ActionSignal::Progress { kind: retract, percent: 100 },
                ActionSignal::Reset,
            ]
        );
        assert_eq!(tracker.state().kind, None);
    }

    #[test]
    fn fractional_progress_completes_the_action() {
        let mut tracker = ActionTracker::new();
        tracker.start(ActionKind::Extrude).unwrap();

        let signals =
            tracker.on_envelope(&decode(br#"{"commandType":1023,"progress":100.0}"#).unwrap());
        assert_eq!(signals.last(), Some(&ActionSignal::Reset));
        assert_eq!(tracker.state().kind, None);
    }

    #[test]
    fn other_command_types_are_ignored() {
        let mut tracker = ActionTracker::new();
        tracker.start(ActionKind::Retract).unwrap();
        assert!(tracker.on_progress(1001, 100).is_empty());
        assert!(tracker.state().is_active());
    }

    #[test]
    fn progress_while_idle_is_ignored() {
        let mut tracker = ActionTracker::new();
        assert!(tracker.on_progress(1023, 50).is_empty());
        assert!(tracker.on_progress(1023, 100).is_empty());
        assert_eq!(tracker.state(), ActionState::default());
    }

    #[test]
    fn envelope_without_progress_is_ignored() {
        let mut tracker = ActionTracker::new();
        tracker.start(ActionKind::Retract).unwrap();
        let env = decode(br#"{"commandType":1023,"enter_or_quit_materiel":{"value":3}}"#).unwrap();
        assert!(tracker.on_envelope(&env).is_empty());
    }

    #[test]
    fn progress_is_clamped_for_display() {
        let mut tracker = ActionTracker::new();
        tracker.start(ActionKind::Extrude).unwrap();
        assert_eq!(
            tracker.on_progress(1023, -5),
            vec![ActionSignal::Progress {
                kind: ActionKind::Extrude,
                percent: 0
            }]
        );
        let signals = tracker.on_progress(1023, 250);
        assert_eq!(signals.len(), 2);
        assert_eq!(
            signals[0],
            ActionSignal::Progress {
                kind: ActionKind::Extrude,
                percent: 100
            }
        );
        assert_eq!(signals[1], ActionSignal::Reset);
    }

    #[test]
    fn stop_always_resets() {
        let mut tracker = ActionTracker::new();
        let (command, signal) = tracker.stop();
        assert_eq!(command.int("value"), Some(0));
        assert_eq!(command.progress(), Some(100));
        assert_eq!(signal, ActionSignal::Reset);

        tracker.start(ActionKind::Extrude).unwrap();
        tracker.on_progress(1023, 40);
        let (_, signal) = tracker.stop();
        assert_eq!(signal, ActionSignal::Reset);
        assert_eq!(tracker.state(), ActionState::default());
        assert!(tracker.start(ActionKind::Retract).is_ok());
    }

    #[test]
    fn reset_when_idle_is_a_no_op() {
        let mut tracker = ActionTracker::new();
        assert_eq!(tracker.reset(), None);
        tracker.start(ActionKind::Retract).unwrap();
        assert_eq!(tracker.reset(), Some(ActionSignal::Reset));
        assert_eq!(tracker.reset(), None);
    }
}
