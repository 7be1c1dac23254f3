use serde::{Deserialize, Serialize};

/// Key identities the engine understands, decoupled from any window library.
/// The host loop translates its native key events into these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Enter,
    Space,
    Escape,
    Other,
}

/// Which keys qualify for the single-action wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyRule {
    /// Any key press qualifies.
    Any,
    /// Only the listed keys qualify.
    OneOf(Vec<Key>),
}

impl KeyRule {
    pub fn matches(&self, key: Key) -> bool {
        match self {
            KeyRule::Any => true,
            KeyRule::OneOf(keys) => keys.contains(&key),
        }
    }
}

/// Per-trial mapping from recognized keys to semantic actions. The input
/// controller consults different fields depending on the active mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindings {
    pub rotate_left: Key,
    pub rotate_right: Key,
    pub confirm: Key,
    pub mark_action: KeyRule,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            rotate_left: Key::ArrowLeft,
            rotate_right: Key::ArrowRight,
            confirm: Key::Enter,
            mark_action: KeyRule::Any,
        }
    }
}
