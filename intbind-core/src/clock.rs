use std::f64::consts::TAU;

/// RGBA presentation color, straight alpha.
pub type Color = [u8; 4];

pub const BLACK: Color = [0, 0, 0, 255];
pub const YELLOW: Color = [210, 190, 0, 255];
pub const GREEN: Color = [0, 160, 0, 255];

/// Reduces an angle into `[0, 2π)`.
pub fn wrap_angle(theta: f64) -> f64 {
    theta.rem_euclid(TAU)
}

/// The rotating clock hand: one continuous angular state variable driven by
/// elapsed wall-clock time, plus the presentation attributes the renderer
/// reads. 0 rad is the 3 o'clock position; increasing angle is visually
/// counter-clockwise, so the hand sweeping clockwise means the angle
/// decreases over time.
#[derive(Debug, Clone)]
pub struct AngleClock {
    angle: f64,
    period_ms: f64,
    running: bool,
    last_frame_ns: Option<u64>,
    pub hand_color: Color,
    pub fixation_color: Color,
    pub hand_visible: bool,
}

impl AngleClock {
    pub fn new(initial_angle: f64, period_ms: f64) -> Self {
        Self {
            angle: wrap_angle(initial_angle),
            period_ms,
            running: false,
            last_frame_ns: None,
            hand_color: BLACK,
            fixation_color: BLACK,
            hand_visible: false,
        }
    }

    /// Marks the clock running. Integration anchors on the next `tick`:
    /// the first frame after `start` applies a zero delta.
    pub fn start(&mut self) {
        self.running = true;
        self.last_frame_ns = None;
        self.hand_visible = true;
    }

    /// Halts integration and hides the hand.
    pub fn stop(&mut self) {
        self.running = false;
        self.last_frame_ns = None;
        self.hand_visible = false;
    }

    /// Advances the angle by the wall-clock time elapsed since the previous
    /// frame. No-op while stopped. Must be called once per animation frame
    /// with a monotonic timestamp in nanoseconds.
    pub fn tick(&mut self, now_ns: u64) {
        if !self.running {
            return;
        }
        match self.last_frame_ns {
            None => {
                self.last_frame_ns = Some(now_ns);
            }
            Some(prev_ns) => {
                let elapsed_ms = now_ns.saturating_sub(prev_ns) as f64 / 1e6;
                self.angle = wrap_angle(self.angle - elapsed_ms / self.period_ms * TAU);
                self.last_frame_ns = Some(now_ns);
            }
        }
    }

    /// Applies an instantaneous angle change, independent of elapsed time.
    /// Legal whether or not the clock is running.
    pub fn adjust(&mut self, delta: f64) {
        self.angle = wrap_angle(self.angle + delta);
    }

    /// Repositions the hand exactly, discarding the current angle.
    pub fn set_angle(&mut self, angle: f64) {
        self.angle = wrap_angle(angle);
    }

    /// Instantaneous read of the current angle, in `[0, 2π)`.
    pub fn snapshot(&self) -> f64 {
        self.angle
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn period_ms(&self) -> f64 {
        self.period_ms
    }
}
