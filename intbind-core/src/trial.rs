use serde::{Deserialize, Serialize};

/// Trial state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialPhase {
    Start,
    Tone,
    Estimate,
    End,
}

/// Angle snapshots and reaction times accumulated over one trial.
///
/// Each field is populated exactly once, as the corresponding phase
/// completes; `None` means the trial ended before that event happened
/// (external abort, or a variant without the event). The record is handed
/// to the block sequencer when the trial reaches End and never mutated
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Hand angle at the self-initiated key press, if the trial has one.
    pub action_angle: Option<f64>,
    /// Hand angle at the instant tone playback was triggered.
    pub tone_angle: Option<f64>,
    /// Final hand angle set by the participant.
    pub estimate_angle: Option<f64>,
    /// Timestamp of the self-initiated key press, ns from timer epoch.
    pub action_time_ns: Option<u64>,
    /// Timestamp of estimation confirm, ns from timer epoch.
    pub estimate_time_ns: Option<u64>,
}
