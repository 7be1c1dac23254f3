use intbind_core::{AngleClock, Key, KeyBindings};

/// What a key event meant to the sequencer, given the active mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSignal {
    /// The awaited self-initiated action key arrived.
    Action { at_ns: u64, key: Key },
    /// The participant confirmed the estimate.
    Confirm { at_ns: u64 },
    /// The hand was nudged; a synchronous re-render is due.
    Adjusted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    AwaitAction,
    Adjust,
}

/// Keyboard registration owned by the sequencer. Two listener shapes:
/// a one-shot wait for the action key, and repeated rotate/confirm
/// handling during estimation. `cancel` removes whichever is active.
#[derive(Debug)]
pub struct InputController {
    mode: Mode,
    bindings: KeyBindings,
}

impl InputController {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            mode: Mode::Idle,
            bindings,
        }
    }

    /// Arms the one-shot action wait. The first qualifying key disarms it,
    /// so a held key cannot complete the wait twice.
    pub fn await_single_action(&mut self) {
        self.mode = Mode::AwaitAction;
    }

    /// Arms continuous rotate/confirm handling for estimation. Held keys
    /// are expected to repeat at the platform rate; the host forwards
    /// repeats as ordinary events.
    pub fn begin_adjustment(&mut self) {
        self.mode = Mode::Adjust;
    }

    /// Removes all active listeners. Idempotent.
    pub fn cancel(&mut self) {
        self.mode = Mode::Idle;
    }

    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Idle
    }

    /// Routes one key event. In adjustment mode the rotate keys mutate the
    /// clock angle directly; everything else is reduced to a signal.
    pub fn handle_key(
        &mut self,
        key: Key,
        now_ns: u64,
        clock: &mut AngleClock,
        hand_inc: f64,
    ) -> Option<InputSignal> {
        match self.mode {
            Mode::Idle => None,
            Mode::AwaitAction => {
                if self.bindings.mark_action.matches(key) {
                    // Disarm before reporting: exactly one completion.
                    self.mode = Mode::Idle;
                    Some(InputSignal::Action { at_ns: now_ns, key })
                } else {
                    None
                }
            }
            Mode::Adjust => {
                if key == self.bindings.rotate_left {
                    clock.adjust(hand_inc);
                    Some(InputSignal::Adjusted)
                } else if key == self.bindings.rotate_right {
                    clock.adjust(-hand_inc);
                    Some(InputSignal::Adjusted)
                } else if key == self.bindings.confirm {
                    self.mode = Mode::Idle;
                    Some(InputSignal::Confirm { at_ns: now_ns })
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intbind_core::KeyRule;

    fn clock() -> AngleClock {
        AngleClock::new(1.0, 2560.0)
    }

    #[test]
    fn action_wait_completes_exactly_once() {
        let mut input = InputController::new(KeyBindings::default());
        let mut clk = clock();
        input.await_single_action();
        let first = input.handle_key(Key::Space, 5, &mut clk, 0.05);
        assert_eq!(
            first,
            Some(InputSignal::Action {
                at_ns: 5,
                key: Key::Space
            })
        );
        assert!(input.is_idle());
        assert_eq!(input.handle_key(Key::Space, 6, &mut clk, 0.05), None);
    }

    #[test]
    fn action_wait_honors_key_restriction() {
        let mut bindings = KeyBindings::default();
        bindings.mark_action = KeyRule::OneOf(vec![Key::Space]);
        let mut input = InputController::new(bindings);
        let mut clk = clock();
        input.await_single_action();
        assert_eq!(input.handle_key(Key::Enter, 1, &mut clk, 0.05), None);
        assert!(input.handle_key(Key::Space, 2, &mut clk, 0.05).is_some());
    }

    #[test]
    fn adjustment_moves_the_hand_and_confirms() {
        let mut input = InputController::new(KeyBindings::default());
        let mut clk = clock();
        input.begin_adjustment();
        input.handle_key(Key::ArrowLeft, 1, &mut clk, 0.05);
        assert!((clk.snapshot() - 1.05).abs() < 1e-12);
        input.handle_key(Key::ArrowRight, 2, &mut clk, 0.05);
        assert!((clk.snapshot() - 1.0).abs() < 1e-12);
        assert_eq!(
            input.handle_key(Key::Enter, 3, &mut clk, 0.05),
            Some(InputSignal::Confirm { at_ns: 3 })
        );
        assert!(input.is_idle());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut input = InputController::new(KeyBindings::default());
        let mut clk = clock();
        input.begin_adjustment();
        input.cancel();
        input.cancel();
        assert_eq!(input.handle_key(Key::ArrowLeft, 1, &mut clk, 0.05), None);
        assert_eq!(clk.snapshot(), 1.0);
    }
}
