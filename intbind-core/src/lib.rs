pub mod clock;
pub mod keys;
pub mod trial;

pub use clock::{wrap_angle, AngleClock, Color};
pub use keys::{Key, KeyBindings, KeyRule};
pub use trial::{TrialPhase, TrialRecord};
