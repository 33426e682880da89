//! Discrete action presets.
//!
//! A preset is a fixed table from integer id to button combination.
//! Policies are trained against one table's index order, so the tables
//! below are append-only: never reorder an existing entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::entity::GameAction;
use crate::error::Error;

const NOOP: GameAction = GameAction::NOOP;
const LEFT: GameAction = GameAction { left: true, ..NOOP };
const RIGHT: GameAction = GameAction { right: true, ..NOOP };
const JUMP: GameAction = GameAction { jump: true, ..NOOP };
const SHOOT: GameAction = GameAction { shoot: true, ..NOOP };
const LEFT_JUMP: GameAction = GameAction { left: true, jump: true, ..NOOP };
const RIGHT_JUMP: GameAction = GameAction { right: true, jump: true, ..NOOP };
const LEFT_SHOOT: GameAction = GameAction { left: true, shoot: true, ..NOOP };
const RIGHT_SHOOT: GameAction = GameAction { right: true, shoot: true, ..NOOP };

const FORWARD_TABLE: &[GameAction] = &[NOOP, RIGHT, RIGHT_JUMP];
const SIMPLE_TABLE: &[GameAction] = &[NOOP, LEFT, RIGHT, JUMP, RIGHT_JUMP];
const FULL_TABLE: &[GameAction] = &[
    NOOP, LEFT, RIGHT, JUMP, LEFT_JUMP, RIGHT_JUMP, SHOOT, LEFT_SHOOT, RIGHT_SHOOT,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPreset {
    Forward,
    Simple,
    Full,
}

impl ActionPreset {
    pub fn table(self) -> &'static [GameAction] {
        match self {
            ActionPreset::Forward => FORWARD_TABLE,
            ActionPreset::Simple => SIMPLE_TABLE,
            ActionPreset::Full => FULL_TABLE,
        }
    }

    pub fn action_count(self) -> usize {
        self.table().len()
    }

    /// Map an id to buttons. Out-of-range ids are the no-op.
    pub fn decode(self, id: usize) -> GameAction {
        match self.table().get(id) {
            Some(a) => *a,
            None => {
                log::debug!("action id {id} out of range for preset {self}; using noop");
                NOOP
            }
        }
    }

    /// Reverse lookup, for scripted and heuristic policies.
    pub fn index_of(self, action: GameAction) -> Option<usize> {
        self.table().iter().position(|a| *a == action)
    }

    pub fn name(self) -> &'static str {
        match self {
            ActionPreset::Forward => "forward",
            ActionPreset::Simple => "simple",
            ActionPreset::Full => "full",
        }
    }
}

impl fmt::Display for ActionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forward" => Ok(ActionPreset::Forward),
            "simple" => Ok(ActionPreset::Simple),
            "full" => Ok(ActionPreset::Full),
            _ => Err(Error::UnknownActionPreset(s.to_string())),
        }
    }
}
