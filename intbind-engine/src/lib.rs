pub mod config;
pub mod input;
pub mod sequencer;
pub mod timers;

pub use config::TrialConfig;
pub use input::{InputController, InputSignal};
pub use sequencer::TrialSequencer;
pub use timers::PhaseTimers;
