use intbind_audio::NullSink;
use intbind_core::{wrap_angle, Key, TrialPhase};
use intbind_engine::{TrialConfig, TrialSequencer};
use intbind_timing::ManualTimer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::f64::consts::TAU;

type Sequencer = TrialSequencer<ManualTimer, NullSink, StdRng>;

fn sequencer(config: TrialConfig) -> (Sequencer, ManualTimer, NullSink) {
    let timer = ManualTimer::new();
    let handle = timer.clone();
    let sink = NullSink::new();
    let sink_handle = sink.clone();
    let seq = TrialSequencer::new(config, timer, sink, StdRng::seed_from_u64(7)).unwrap();
    (seq, handle, sink_handle)
}

fn at(timer: &ManualTimer, ms: u64, seq: &mut Sequencer) {
    timer.set_ns(ms * 1_000_000);
    seq.update();
}

#[test]
fn action_initiated_trial_end_to_end() {
    // Scenario: diameter 200, period 2560 ms, known start angle of 1.0 rad.
    let config = TrialConfig {
        start_angle: Some(1.0),
        ..TrialConfig::default()
    };
    let (mut seq, timer, sink) = sequencer(config);

    seq.begin();
    assert_eq!(seq.phase(), TrialPhase::Start);
    assert!(!seq.clock().running());

    // Settle delay elapses: animation starts, action wait armed.
    at(&timer, 400, &mut seq);
    assert!(seq.clock().running());
    assert!(!seq.input_idle());

    // Action key 500 ms after animation onset.
    at(&timer, 900, &mut seq);
    assert!(seq.handle_key(Key::Space) == false);
    assert_eq!(seq.phase(), TrialPhase::Tone);
    assert!(seq.input_idle());

    // Tone fires 250 ms after the action.
    at(&timer, 1150, &mut seq);
    assert_eq!(sink.play_count(), 1);

    // Clock parks 1000 ms after the tone.
    at(&timer, 2150, &mut seq);
    assert!(!seq.clock().running());
    assert!(!seq.clock().hand_visible);

    // Estimation opens 1000 ms after the stop, hand restored to the
    // tone-time angle.
    at(&timer, 3150, &mut seq);
    assert_eq!(seq.phase(), TrialPhase::Estimate);
    assert!(seq.clock().hand_visible);
    let estimate_entry = seq.clock().snapshot();
    let expected_tone = wrap_angle(1.0 - 750.0 / 2560.0 * TAU);
    assert!((estimate_entry - expected_tone).abs() < 1e-9);

    // Ten rotate-left presses move the hand by exactly +0.5 rad, then
    // confirm closes the trial.
    for _ in 0..10 {
        assert!(seq.handle_key(Key::ArrowLeft));
    }
    timer.set_ns(5_000 * 1_000_000);
    assert!(seq.handle_key(Key::Enter));
    assert_eq!(seq.phase(), TrialPhase::End);

    let record = seq.record().expect("completed trial must yield a record");
    let expected_action = wrap_angle(1.0 - 500.0 / 2560.0 * TAU);
    assert!((record.action_angle.unwrap() - expected_action).abs() < 1e-9);
    assert_eq!(record.action_time_ns, Some(900 * 1_000_000));
    // Estimation opened at exactly the recorded tone angle.
    assert_eq!(record.tone_angle, Some(estimate_entry));
    let expected_estimate = wrap_angle(estimate_entry + 10.0 * 0.05);
    assert!((record.estimate_angle.unwrap() - expected_estimate).abs() < 1e-9);
    assert_eq!(record.estimate_time_ns, Some(5_000 * 1_000_000));

    // Cleanup is total.
    assert_eq!(seq.armed_timers(), 0);
    assert!(seq.input_idle());
}

#[test]
fn fixed_delay_variant_never_arms_an_action_wait() {
    let config = TrialConfig {
        key_press: false,
        tone_delay_ms: 1000,
        start_angle: Some(2.0),
        ..TrialConfig::default()
    };
    let (mut seq, timer, sink) = sequencer(config);

    seq.begin();
    at(&timer, 400, &mut seq);
    assert!(seq.clock().running());
    assert!(seq.input_idle(), "no action wait in the fixed-delay variant");
    // A key press during the wait does nothing.
    assert!(!seq.handle_key(Key::Space));
    assert_eq!(seq.phase(), TrialPhase::Start);

    // Tone phase entered exactly 1000 ms after Start entry.
    at(&timer, 999, &mut seq);
    assert_eq!(seq.phase(), TrialPhase::Start);
    at(&timer, 1000, &mut seq);
    assert_eq!(seq.phase(), TrialPhase::Tone);

    at(&timer, 1250, &mut seq);
    assert_eq!(sink.play_count(), 1);
    at(&timer, 2250, &mut seq);
    at(&timer, 3250, &mut seq);
    assert_eq!(seq.phase(), TrialPhase::Estimate);
    assert!(seq.handle_key(Key::Enter));

    let record = seq.record().unwrap();
    assert_eq!(record.action_angle, None);
    assert_eq!(record.action_time_ns, None);
    assert!(record.tone_angle.is_some());
    assert!(record.estimate_angle.is_some());
}

#[test]
fn silent_variant_keeps_the_schedule_but_never_plays() {
    let config = TrialConfig {
        play_tone: false,
        start_angle: Some(0.25),
        ..TrialConfig::default()
    };
    let (mut seq, timer, sink) = sequencer(config);

    seq.begin();
    at(&timer, 400, &mut seq);
    at(&timer, 600, &mut seq);
    seq.handle_key(Key::Space);
    at(&timer, 850, &mut seq);
    assert_eq!(sink.play_count(), 0);
    at(&timer, 1850, &mut seq);
    at(&timer, 2850, &mut seq);
    assert_eq!(seq.phase(), TrialPhase::Estimate);

    // The anchor snapshot exists even though nothing was audible.
    let anchor = seq.clock().snapshot();
    seq.handle_key(Key::Enter);
    let record = seq.record().unwrap();
    assert_eq!(record.tone_angle, Some(anchor));
    assert_eq!(sink.play_count(), 0);
}

#[test]
fn estimate_reopens_at_tone_angle_not_stop_angle() {
    let config = TrialConfig {
        start_angle: Some(3.0),
        ..TrialConfig::default()
    };
    let (mut seq, timer, _) = sequencer(config);

    seq.begin();
    at(&timer, 400, &mut seq);
    seq.handle_key(Key::Space);
    at(&timer, 650, &mut seq);
    let tone_angle = seq.clock().snapshot();

    // The clock keeps sweeping for another second before parking, so the
    // parked angle differs from the tone angle.
    at(&timer, 1650, &mut seq);
    let parked = seq.clock().snapshot();
    assert!((parked - tone_angle).abs() > 1e-3);

    at(&timer, 2650, &mut seq);
    assert_eq!(seq.phase(), TrialPhase::Estimate);
    assert_eq!(seq.clock().snapshot(), tone_angle);
}

#[test]
fn nothing_fires_after_end() {
    let config = TrialConfig {
        start_angle: Some(1.5),
        ..TrialConfig::default()
    };
    let (mut seq, timer, sink) = sequencer(config);

    seq.begin();
    at(&timer, 400, &mut seq);
    seq.handle_key(Key::Space);
    seq.abort();
    assert_eq!(seq.phase(), TrialPhase::End);
    assert_eq!(seq.armed_timers(), 0);
    assert!(seq.input_idle());

    let record_before = seq.record().unwrap().clone();
    let angle_before = seq.clock().snapshot();

    // Advance past every deadline the trial would ever have armed and
    // replay every input; none of it may mutate state.
    timer.set_ns(60_000 * 1_000_000);
    seq.update();
    for key in [Key::Space, Key::ArrowLeft, Key::ArrowRight, Key::Enter] {
        assert!(!seq.handle_key(key));
    }
    assert_eq!(seq.record().unwrap(), &record_before);
    assert_eq!(seq.clock().snapshot(), angle_before);
    assert_eq!(sink.play_count(), 0);

    // Abort stays idempotent.
    seq.abort();
    assert_eq!(seq.armed_timers(), 0);
}

#[test]
fn abort_mid_tone_yields_partial_record() {
    let config = TrialConfig {
        start_angle: Some(0.5),
        ..TrialConfig::default()
    };
    let (mut seq, timer, _) = sequencer(config);

    seq.begin();
    at(&timer, 400, &mut seq);
    seq.handle_key(Key::Space);
    at(&timer, 650, &mut seq);
    seq.abort();

    let record = seq.record().unwrap();
    assert!(record.action_angle.is_some());
    assert!(record.tone_angle.is_some());
    assert_eq!(record.estimate_angle, None);
    assert_eq!(record.estimate_time_ns, None);
}

#[test]
fn no_record_before_end_or_before_begin() {
    let (mut seq, timer, _) = sequencer(TrialConfig::default());
    assert!(seq.record().is_none());
    seq.begin();
    at(&timer, 400, &mut seq);
    assert!(seq.record().is_none());
    seq.abort();
    assert!(seq.record().is_some());
}

#[test]
fn invalid_config_never_starts_a_trial() {
    let mut config = TrialConfig::default();
    config.period_ms = -1.0;
    let timer = ManualTimer::new();
    let result = TrialSequencer::new(config, timer, NullSink::new(), StdRng::seed_from_u64(1));
    assert!(result.is_err());
}

#[test]
fn random_start_angle_is_in_range() {
    let (mut seq, _timer, _) = sequencer(TrialConfig::default());
    seq.begin();
    let theta = seq.clock().snapshot();
    assert!((0.0..TAU).contains(&theta));
}
