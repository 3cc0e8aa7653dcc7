//! Difficulty mode. Chosen once per world; after the first assignment it is
//! frozen.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// Progression is off; nothing is gated.
    #[default]
    Disabled,
    Easy,
    Extreme,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Disabled, Mode::Easy, Mode::Extreme];

    /// Does this mode gate the world at all?
    pub fn is_active(self) -> bool {
        self != Mode::Disabled
    }

    /// Name as stored in the save file.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Disabled => "DISABLED",
            Mode::Easy => "EASY",
            Mode::Extreme => "EXTREME",
        }
    }

    /// Parse a stored name. Case-insensitive; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Mode> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    #[error("mode is already set to {current} and cannot be changed")]
    AlreadySet { current: Mode },
}
