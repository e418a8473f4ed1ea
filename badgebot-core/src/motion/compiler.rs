//! Power profile compiler
//!
//! Turns an instruction into a trapezoidal power schedule made of 10 ms
//! ramp steps:
//!
//! ```text
//! power
//!   max ┤      ┌──────────┐
//!       │    ┌─┘          └─┐
//!       │  ┌─┘              └─┐
//!     0 ┼──┘                  └──
//!       └─ramp─┴─plateau──┴─ramp─► time
//! ```
//!
//! The plateau fills whatever is left of `step_ms × hold_count` after both
//! ramps. When the ramps alone are longer than that (a short hold at high
//! power with gentle acceleration) there is no plateau and the profile runs
//! longer than requested; the ramps are never shortened.

use alloc::vec::Vec;

use super::instruction::Direction;
use crate::traits::MotorPowers;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Duration of one ramp step
pub const TICK_MS: u32 = 10;

/// Compiler inputs taken from the settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProfileParams {
    /// Power increase per tick
    pub acceleration: u32,
    /// Plateau power
    pub max_power: u32,
    /// Duration of one UP/DOWN press
    pub drive_step_ms: u32,
    /// Duration of one LEFT/RIGHT press
    pub turn_step_ms: u32,
}

impl Default for ProfileParams {
    fn default() -> Self {
        Self {
            acceleration: 2000,
            max_power: 40000,
            drive_step_ms: 200,
            turn_step_ms: 100,
        }
    }
}

impl ProfileParams {
    /// Duration of one press in a direction
    pub fn step_ms(&self, direction: Direction) -> u32 {
        if direction.is_turn() {
            self.turn_step_ms
        } else {
            self.drive_step_ms
        }
    }

    /// Power levels of the ramp-up, one per tick, ending at exactly
    /// `max_power`
    pub fn ramp_levels(&self) -> Vec<i32> {
        let max = self.max_power.min(crate::traits::MAX_POWER as u32);
        let accel = self.acceleration.max(1);
        let mut levels = Vec::new();
        let mut p = 0u32;
        loop {
            levels.push(p.min(max) as i32);
            if p >= max {
                break;
            }
            p = p.saturating_add(accel);
        }
        levels
    }
}

/// One entry of a power profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProfileStep {
    pub power: MotorPowers,
    pub duration_ms: u32,
}

/// Ramp-up, optional plateau and mirrored ramp-down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerProfile {
    steps: Vec<ProfileStep>,
    ramp_ticks: u32,
}

impl PowerProfile {
    /// Compile the profile for `hold_count` presses of `direction`
    pub fn compile(direction: Direction, hold_count: u32, params: &ProfileParams) -> Self {
        let levels = params.ramp_levels();
        let ramp_ticks = levels.len() as u32;
        let requested = i64::from(params.step_ms(direction)) * i64::from(hold_count);
        let plateau = requested - 2 * i64::from(ramp_ticks) * i64::from(TICK_MS);

        let ramp = levels.iter().map(|p| ProfileStep {
            power: direction.powers(*p),
            duration_ms: TICK_MS,
        });

        let mut steps: Vec<ProfileStep> = Vec::with_capacity(levels.len() * 2 + 1);
        steps.extend(ramp.clone());
        if plateau > 0 {
            steps.push(ProfileStep {
                power: direction.powers(params.max_power.min(crate::traits::MAX_POWER as u32) as i32),
                duration_ms: u32::try_from(plateau).unwrap_or(u32::MAX),
            });
        }
        steps.extend(ramp.rev());

        Self { steps, ramp_ticks }
    }

    pub fn steps(&self) -> &[ProfileStep] {
        &self.steps
    }

    /// Number of ramp-up steps
    pub fn ramp_ticks(&self) -> u32 {
        self.ramp_ticks
    }

    /// Whether the profile has a constant-power section
    pub fn has_plateau(&self) -> bool {
        self.steps.len() as u32 > 2 * self.ramp_ticks
    }

    /// Sum of all step durations
    pub fn total_duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| u64::from(s.duration_ms)).sum()
    }
}
