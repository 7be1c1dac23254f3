/// Named, cancelable deadlines armed per phase and polled from the frame
/// loop. Cancellation always clears the whole group, so a callback from a
/// superseded phase can never fire into its successor.
#[derive(Debug)]
pub struct PhaseTimers<E> {
    armed: Vec<Slot<E>>,
}

#[derive(Debug)]
struct Slot<E> {
    name: &'static str,
    deadline_ns: u64,
    event: E,
}

impl<E: Copy> PhaseTimers<E> {
    pub fn new() -> Self {
        Self { armed: Vec::new() }
    }

    /// Schedules `event` to fire `delay_ms` after `now_ns`.
    pub fn arm(&mut self, name: &'static str, now_ns: u64, delay_ms: u64, event: E) {
        self.armed.push(Slot {
            name,
            deadline_ns: now_ns + delay_ms * 1_000_000,
            event,
        });
    }

    /// Removes every armed deadline. Idempotent.
    pub fn cancel_all(&mut self) {
        self.armed.clear();
    }

    pub fn pending(&self) -> usize {
        self.armed.len()
    }

    /// Removes and returns the earliest deadline that has elapsed by
    /// `now_ns`, if any. Callers poll in a loop so that firing one event
    /// can cancel or re-arm before the next is considered.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<(&'static str, E)> {
        let idx = self
            .armed
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.deadline_ns <= now_ns)
            .min_by_key(|(_, slot)| slot.deadline_ns)
            .map(|(i, _)| i)?;
        let slot = self.armed.swap_remove(idx);
        Some((slot.name, slot.event))
    }
}

impl<E: Copy> Default for PhaseTimers<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut timers = PhaseTimers::new();
        timers.arm("b", 0, 500, 'b');
        timers.arm("a", 0, 250, 'a');
        assert_eq!(timers.pop_due(100_000_000), None);
        assert_eq!(timers.pop_due(600_000_000), Some(("a", 'a')));
        assert_eq!(timers.pop_due(600_000_000), Some(("b", 'b')));
        assert_eq!(timers.pop_due(600_000_000), None);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn cancel_all_is_total_and_idempotent() {
        let mut timers = PhaseTimers::new();
        timers.arm("a", 0, 10, 1u8);
        timers.arm("b", 0, 20, 2u8);
        timers.cancel_all();
        timers.cancel_all();
        assert_eq!(timers.pending(), 0);
        assert_eq!(timers.pop_due(u64::MAX), None);
    }
}
