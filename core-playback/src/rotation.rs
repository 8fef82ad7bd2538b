//! # Buffer Rotation
//!
//! Role bookkeeping for the three buffer slots. Rotation only rewrites the
//! role→slot mapping; slot instances and their content never move.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SLOT_COUNT;

/// Purpose of a slot relative to the playback position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotRole {
    Current,
    Next,
    Previous,
}

impl SlotRole {
    pub const ALL: [SlotRole; SLOT_COUNT] = [SlotRole::Current, SlotRole::Next, SlotRole::Previous];

    fn index(self) -> usize {
        match self {
            SlotRole::Current => 0,
            SlotRole::Next => 1,
            SlotRole::Previous => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotRole::Current => "current",
            SlotRole::Next => "next",
            SlotRole::Previous => "previous",
        }
    }
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "next",
            Direction::Backward => "previous",
        }
    }
}

/// Role→slot-index mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRing {
    by_role: [usize; SLOT_COUNT],
}

impl SlotRing {
    /// Slot 0 is CURRENT, slot 1 NEXT, slot 2 PREVIOUS.
    pub fn new() -> Self {
        Self { by_role: [0, 1, 2] }
    }

    pub fn slot_for(&self, role: SlotRole) -> usize {
        self.by_role[role.index()]
    }

    pub fn role_of(&self, slot: usize) -> Option<SlotRole> {
        SlotRole::ALL
            .into_iter()
            .find(|role| self.slot_for(*role) == slot)
    }

    /// Relabels the slots for one navigation step and returns the index of
    /// the slot whose content is now invalid for its new role.
    ///
    /// Forward: (CURRENT, NEXT, PREVIOUS) := (old NEXT, old PREVIOUS, old CURRENT);
    /// the slot now holding NEXT must be rebound.
    ///
    /// Backward: (CURRENT, NEXT, PREVIOUS) := (old PREVIOUS, old CURRENT, old NEXT);
    /// the slot now holding PREVIOUS must be rebound.
    pub fn rotate(&mut self, direction: Direction) -> usize {
        let [current, next, previous] = self.by_role;
        match direction {
            Direction::Forward => {
                self.by_role = [next, previous, current];
                self.slot_for(SlotRole::Next)
            }
            Direction::Backward => {
                self.by_role = [previous, current, next];
                self.slot_for(SlotRole::Previous)
            }
        }
    }

    /// True when every slot holds exactly one role.
    pub fn is_permutation(&self) -> bool {
        let mut seen = [false; SLOT_COUNT];
        for &slot in &self.by_role {
            if slot >= SLOT_COUNT || seen[slot] {
                return false;
            }
            seen[slot] = true;
        }
        true
    }
}

impl Default for SlotRing {
    fn default() -> Self {
        Self::new()
    }
}
