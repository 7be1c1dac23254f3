use anyhow::Result;
use intbind_audio::ToneSink;
use intbind_core::clock::{BLACK, GREEN, YELLOW};
use intbind_core::{AngleClock, Key, TrialPhase, TrialRecord};
use intbind_timing::Timer;
use rand::Rng;
use std::f64::consts::TAU;

use crate::config::TrialConfig;
use crate::input::{InputController, InputSignal};
use crate::timers::PhaseTimers;

/// Transitions scheduled on the phase timer registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrialEvent {
    /// Settle delay elapsed: start the animation and arm the action wait.
    BeginAnimation,
    /// Fixed-delay variant: enter the Tone phase without an action.
    EnterTone,
    /// Trigger playback and take the anchor snapshot.
    ToneOnset,
    /// Park the hand.
    StopClock,
    /// Hand control to the participant.
    EnterEstimate,
}

/// The trial state machine: Start → Tone → Estimate → End.
///
/// All clock, timer and input state is owned here, so several sequencers
/// can coexist in one process. Every phase transition goes through a
/// cancel-before-arm step: the previous phase's timers and listeners are
/// removed before the next phase arms its own, which makes a stale
/// callback firing into a later phase unreachable.
pub struct TrialSequencer<T, A, R>
where
    T: Timer<Timestamp = u64>,
    A: ToneSink,
    R: Rng,
{
    phase: TrialPhase,
    started: bool,
    clock: AngleClock,
    record: TrialRecord,
    timers: PhaseTimers<TrialEvent>,
    input: InputController,
    config: TrialConfig,
    timer: T,
    sink: A,
    rng: R,
    /// Tone-time snapshot; the authoritative anchor the estimation hand
    /// is restored to.
    anchor: Option<f64>,
}

impl<T, A, R> TrialSequencer<T, A, R>
where
    T: Timer<Timestamp = u64>,
    A: ToneSink,
    R: Rng,
{
    /// Validates the configuration up front; a trial that would be invalid
    /// never enters Start and never produces a record.
    pub fn new(config: TrialConfig, timer: T, sink: A, rng: R) -> Result<Self> {
        config.validate()?;
        let clock = AngleClock::new(0.0, config.period_ms);
        let input = InputController::new(config.keys.clone());
        Ok(Self {
            phase: TrialPhase::Start,
            started: false,
            clock,
            record: TrialRecord::default(),
            timers: PhaseTimers::new(),
            input,
            config,
            timer,
            sink,
            rng,
            anchor: None,
        })
    }

    /// Enters the Start phase: draws the pending fixation, picks the
    /// initial hand angle, and arms the settle timer (plus the tone-delay
    /// timer in the fixed-delay variant). No action wait is armed until
    /// the animation actually starts.
    pub fn begin(&mut self) {
        let theta = match self.config.start_angle {
            Some(theta) => theta,
            None => self.rng.random_range(0.0..TAU),
        };
        self.clock = AngleClock::new(theta, self.config.period_ms);
        self.clock.fixation_color = YELLOW;

        self.phase = TrialPhase::Start;
        self.started = true;
        self.timers.cancel_all();
        self.input.cancel();

        let now = self.timer.now();
        self.timers
            .arm("settle", now, self.config.settle_ms, TrialEvent::BeginAnimation);
        if !self.config.key_press {
            self.timers
                .arm("tone-delay", now, self.config.tone_delay_ms, TrialEvent::EnterTone);
        }
        println!("Trial started at {} ns (theta = {:.4})", now, theta);
    }

    /// Advances the trial by one animation frame. The clock integrates up
    /// to `now` first, then due timers fire, so every snapshot taken by a
    /// timer callback sees the current angle.
    pub fn update(&mut self) {
        if self.phase == TrialPhase::End {
            return;
        }
        let now = self.timer.now();
        self.clock.tick(now);
        while let Some((_name, event)) = self.timers.pop_due(now) {
            self.dispatch(event, now);
            if self.phase == TrialPhase::End {
                break;
            }
        }
    }

    /// Routes one key press. Returns true when the display changed and a
    /// synchronous re-render is due.
    pub fn handle_key(&mut self, key: Key) -> bool {
        let now = self.timer.now();
        // Clock state is brought up to date before input is processed.
        self.clock.tick(now);
        match self
            .input
            .handle_key(key, now, &mut self.clock, self.config.hand_inc)
        {
            Some(InputSignal::Action { at_ns, .. }) => {
                self.record.action_angle = Some(self.clock.snapshot());
                self.record.action_time_ns = Some(at_ns);
                println!(
                    "Action at {} ns (theta = {:.4})",
                    at_ns,
                    self.clock.snapshot()
                );
                self.enter_tone(now);
                false
            }
            Some(InputSignal::Confirm { at_ns }) => {
                self.record.estimate_angle = Some(self.clock.snapshot());
                self.record.estimate_time_ns = Some(at_ns);
                self.enter_end();
                true
            }
            Some(InputSignal::Adjusted) => true,
            None => false,
        }
    }

    /// External abort (window closed, block cancelled): an implicit
    /// transition to End with whatever the record holds so far. Safe to
    /// call at any time, including repeatedly.
    pub fn abort(&mut self) {
        self.enter_end();
    }

    fn dispatch(&mut self, event: TrialEvent, now: u64) {
        match event {
            TrialEvent::BeginAnimation => {
                self.clock.fixation_color = BLACK;
                self.clock.hand_color = BLACK;
                self.clock.start();
                // Anchor the integration at the instant animation begins.
                self.clock.tick(now);
                if self.config.key_press {
                    self.input.await_single_action();
                }
            }
            TrialEvent::EnterTone => self.enter_tone(now),
            TrialEvent::ToneOnset => {
                if self.config.play_tone {
                    if let Err(e) = self.sink.play_now() {
                        eprintln!("tone playback failed: {e}");
                    }
                }
                let theta = self.clock.snapshot();
                self.record.tone_angle = Some(theta);
                self.anchor = Some(theta);
                println!("Tone at {} ns (theta = {:.4})", now, theta);
                self.timers.arm(
                    "stop",
                    now,
                    self.config.stop_after_tone_ms,
                    TrialEvent::StopClock,
                );
            }
            TrialEvent::StopClock => {
                self.clock.stop();
                self.timers.arm(
                    "estimate",
                    now,
                    self.config.estimate_after_stop_ms,
                    TrialEvent::EnterEstimate,
                );
            }
            TrialEvent::EnterEstimate => self.enter_estimate(),
        }
    }

    fn enter_tone(&mut self, now: u64) {
        self.timers.cancel_all();
        self.input.cancel();
        self.phase = TrialPhase::Tone;
        self.timers
            .arm("tone-onset", now, self.config.tone_onset_ms, TrialEvent::ToneOnset);
    }

    fn enter_estimate(&mut self) {
        self.timers.cancel_all();
        self.input.cancel();
        self.phase = TrialPhase::Estimate;
        // The hand reappears exactly where the tone was triggered,
        // recolored to signal interactivity.
        if let Some(anchor) = self.anchor {
            self.clock.set_angle(anchor);
        }
        self.clock.hand_color = GREEN;
        self.clock.hand_visible = true;
        self.input.begin_adjustment();
    }

    fn enter_end(&mut self) {
        self.timers.cancel_all();
        self.input.cancel();
        self.clock.stop();
        if self.phase != TrialPhase::End {
            self.phase = TrialPhase::End;
            println!("Trial ended");
        }
    }

    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    /// View of the clock for the renderer.
    pub fn clock(&self) -> &AngleClock {
        &self.clock
    }

    /// The completed record, available once the trial has reached End.
    /// A trial that never entered Start yields nothing.
    pub fn record(&self) -> Option<&TrialRecord> {
        if self.started && self.phase == TrialPhase::End {
            Some(&self.record)
        } else {
            None
        }
    }

    pub fn is_finished(&self) -> bool {
        self.record().is_some()
    }

    /// Outstanding timer registrations; zero after End.
    pub fn armed_timers(&self) -> usize {
        self.timers.pending()
    }

    /// True when no keyboard listener is registered; always true after End.
    pub fn input_idle(&self) -> bool {
        self.input.is_idle()
    }
}
