//! Recorded motion instructions

use core::fmt;

use badgebot_hal::Button;

use super::compiler::{PowerProfile, ProfileParams};
use crate::traits::MotorPowers;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Drive direction of a recorded press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Direction recorded for a button, if any
    pub fn from_button(button: Button) -> Option<Self> {
        match button {
            Button::Up => Some(Direction::Up),
            Button::Down => Some(Direction::Down),
            Button::Left => Some(Direction::Left),
            Button::Right => Some(Direction::Right),
            Button::Confirm | Button::Cancel => None,
        }
    }

    /// Motor powers for this direction at power `p`
    ///
    /// Left motor first: forward drives both, turns drive them opposed.
    pub fn powers(self, p: i32) -> MotorPowers {
        match self {
            Direction::Up => MotorPowers::from_pair(p, p),
            Direction::Down => MotorPowers::from_pair(-p, -p),
            Direction::Left => MotorPowers::from_pair(-p, p),
            Direction::Right => MotorPowers::from_pair(p, -p),
        }
    }

    /// Whether this direction turns on the spot
    pub fn is_turn(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

/// A direction held for a number of presses
///
/// Open while presses are still being counted; finalized once its profile
/// has been compiled, after which it never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    direction: Direction,
    hold_count: u32,
    profile: Option<PowerProfile>,
}

impl Instruction {
    /// Instruction for the first press of a direction
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            hold_count: 1,
            profile: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn hold_count(&self) -> u32 {
        self.hold_count
    }

    pub fn is_finalized(&self) -> bool {
        self.profile.is_some()
    }

    /// Count another press
    ///
    /// # Returns
    /// `false` if the instruction is already finalized.
    pub fn increment(&mut self) -> bool {
        if self.is_finalized() {
            return false;
        }
        self.hold_count = self.hold_count.saturating_add(1);
        true
    }

    /// Compile the profile if not already done
    pub fn finalize(&mut self, params: &ProfileParams) -> &PowerProfile {
        let (direction, hold_count) = (self.direction, self.hold_count);
        self.profile
            .get_or_insert_with(|| PowerProfile::compile(direction, hold_count, params))
    }

    /// Compiled profile, once finalized
    pub fn profile(&self) -> Option<&PowerProfile> {
        self.profile.as_ref()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.direction.label(), self.hold_count)
    }
}
