use anyhow::{ensure, Result};
use intbind_core::KeyBindings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-trial configuration handed in by the block sequencer.
///
/// Defaults follow the reference task: a 200 px clock with a 2560 ms
/// revolution, 0.05 rad per keystroke, and the 400/250/1000/1000 ms
/// schedule around the tone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    /// Clock face diameter in pixels.
    pub clock_diam: u32,
    /// Milliseconds per full hand revolution.
    pub period_ms: f64,
    /// Radians applied per rotate keystroke during estimation.
    pub hand_inc: f64,
    /// Whether the trial has a self-initiated action phase. When false the
    /// tone is scheduled `tone_delay_ms` after Start entry instead.
    pub key_press: bool,
    /// Delay from Start entry to the Tone phase when `key_press` is false.
    pub tone_delay_ms: u64,
    /// Whether the tone is audible. The tone-time snapshot is taken either
    /// way, so silent baseline trials keep the exact same schedule.
    pub play_tone: bool,
    /// WAV asset for the tone. `None` lets the host synthesize a beep.
    pub tone_file: Option<PathBuf>,
    /// Settle delay between Start entry and animation onset.
    pub settle_ms: u64,
    /// Delay from Tone entry to tone onset.
    pub tone_onset_ms: u64,
    /// Delay from tone onset to stopping the clock.
    pub stop_after_tone_ms: u64,
    /// Delay from stopping the clock to the estimation phase.
    pub estimate_after_stop_ms: u64,
    /// Fixed initial hand angle in radians. `None` draws uniformly from
    /// `[0, 2π)` at trial start.
    pub start_angle: Option<f64>,
    pub keys: KeyBindings,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            clock_diam: 200,
            period_ms: 2560.0,
            hand_inc: 0.05,
            key_press: true,
            tone_delay_ms: 1000,
            play_tone: true,
            tone_file: None,
            settle_ms: 400,
            tone_onset_ms: 250,
            stop_after_tone_ms: 1000,
            estimate_after_stop_ms: 1000,
            start_angle: None,
            keys: KeyBindings::default(),
        }
    }
}

impl TrialConfig {
    /// Rejects configurations that must abort the trial before Start is
    /// entered. Nothing is silently defaulted here.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.clock_diam > 0, "clock diameter must be positive");
        ensure!(
            self.period_ms.is_finite() && self.period_ms > 0.0,
            "rotation period must be positive, got {} ms",
            self.period_ms
        );
        ensure!(
            self.hand_inc.is_finite() && self.hand_inc > 0.0,
            "hand increment must be positive, got {} rad",
            self.hand_inc
        );
        ensure!(
            self.key_press || self.tone_delay_ms > 0,
            "fixed-delay trials need a positive tone delay"
        );
        if let Some(theta) = self.start_angle {
            ensure!(theta.is_finite(), "start angle must be finite");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TrialConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_geometry() {
        let mut cfg = TrialConfig::default();
        cfg.clock_diam = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrialConfig::default();
        cfg.period_ms = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrialConfig::default();
        cfg.period_ms = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_tone_delay_without_action_phase() {
        let mut cfg = TrialConfig::default();
        cfg.key_press = false;
        cfg.tone_delay_ms = 0;
        assert!(cfg.validate().is_err());
    }
}
