//! Tick-by-tick playback of compiled profiles
//!
//! The background task calls [`Playback::advance`] with the time since its
//! last call. Each call consumes at most one profile step; a late call does
//! not skip steps, it carries the overrun into the next step instead.

use alloc::vec::{IntoIter, Vec};
use core::iter::Fuse;

use super::compiler::{ProfileStep, TICK_MS};
use super::instruction::Instruction;
use crate::traits::MotorPowers;

/// Playback cursor over a concatenated profile stream
#[derive(Debug)]
pub struct Playback {
    steps: Fuse<IntoIter<ProfileStep>>,
    current: MotorPowers,
    remaining_ms: i64,
    finished: bool,
}

impl Playback {
    /// Playback of the finalized instructions, in order
    ///
    /// Instructions without a compiled profile are skipped.
    pub fn new(instructions: &[Instruction]) -> Self {
        let steps: Vec<ProfileStep> = instructions
            .iter()
            .filter_map(Instruction::profile)
            .flat_map(|p| p.steps().iter().copied())
            .collect();
        Self::from_steps(steps)
    }

    /// Playback of an explicit step list
    pub fn from_steps(steps: Vec<ProfileStep>) -> Self {
        Self {
            steps: steps.into_iter().fuse(),
            current: MotorPowers::STOPPED,
            remaining_ms: 0,
            finished: false,
        }
    }

    /// Advance by `delta_ms` and return the power to apply
    ///
    /// `delta_ms` is clamped to one tick less than [`TICK_MS`]. Returns
    /// `None` once every step has been played, and on every call after.
    pub fn advance(&mut self, delta_ms: u32) -> Option<MotorPowers> {
        if self.finished {
            return None;
        }
        self.remaining_ms -= i64::from(delta_ms.min(TICK_MS - 1));
        if self.remaining_ms > 0 {
            return Some(self.current);
        }
        match self.steps.next() {
            Some(step) => {
                self.current = step.power;
                self.remaining_ms += i64::from(step.duration_ms);
                Some(step.power)
            }
            None => {
                self.finished = true;
                self.current = MotorPowers::STOPPED;
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Power most recently returned
    pub fn current(&self) -> MotorPowers {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::compiler::ProfileParams;
    use crate::motion::instruction::Direction;
    use alloc::vec;

    fn step(p: i32, duration_ms: u32) -> ProfileStep {
        ProfileStep {
            power: MotorPowers::from_pair(p, p),
            duration_ms,
        }
    }

    #[test]
    fn test_empty_playback() {
        let mut playback = Playback::from_steps(Vec::new());
        assert_eq!(playback.advance(5), None);
        assert!(playback.is_finished());
    }

    #[test]
    fn test_first_call_pulls_first_step() {
        let mut playback = Playback::from_steps(vec![step(1, 30), step(2, 30)]);
        assert_eq!(playback.advance(0), Some(MotorPowers::from_pair(1, 1)));
        assert_eq!(playback.advance(9), Some(MotorPowers::from_pair(1, 1)));
    }

    #[test]
    fn test_steps_follow_elapsed_time() {
        let mut playback = Playback::from_steps(vec![step(1, 18), step(2, 9)]);
        assert_eq!(playback.advance(0).map(|p| p.motor(0)), Some(1));
        assert_eq!(playback.advance(9).map(|p| p.motor(0)), Some(1));
        assert_eq!(playback.advance(9).map(|p| p.motor(0)), Some(2));
        assert_eq!(playback.advance(9), None);
    }

    #[test]
    fn test_late_call_is_clamped() {
        let mut playback = Playback::from_steps(vec![step(1, 10), step(2, 10)]);
        playback.advance(0);
        // A 500 ms stall only counts as 9 ms
        assert_eq!(playback.advance(500).map(|p| p.motor(0)), Some(1));
        assert_eq!(playback.advance(500).map(|p| p.motor(0)), Some(2));
    }

    #[test]
    fn test_overrun_carries_into_next_step() {
        let mut playback = Playback::from_steps(vec![step(1, 5), step(2, 10), step(3, 10)]);
        playback.advance(0);
        // -4 ms left over from the first step
        assert_eq!(playback.advance(9).map(|p| p.motor(0)), Some(2));
        assert_eq!(playback.advance(6).map(|p| p.motor(0)), Some(3));
    }

    #[test]
    fn test_exhausted_stays_none() {
        let mut playback = Playback::from_steps(vec![step(1, 1)]);
        playback.advance(0);
        assert_eq!(playback.advance(9), None);
        for _ in 0..100 {
            assert_eq!(playback.advance(9), None);
        }
        assert_eq!(playback.current(), MotorPowers::STOPPED);
    }

    #[test]
    fn test_plays_instructions_in_order() {
        let params = ProfileParams::default();
        let mut up = Instruction::new(Direction::Up);
        up.finalize(&params);
        let mut left = Instruction::new(Direction::Left);
        left.finalize(&params);
        let open = Instruction::new(Direction::Down);

        let mut playback = Playback::new(&[up, left, open]);
        let mut seen_left = false;
        let mut calls = 0;
        while let Some(p) = playback.advance(TICK_MS - 1) {
            calls += 1;
            if p.motor(0) < 0 {
                seen_left = true;
                assert!(p.motor(1) > 0);
            }
            assert!(p.motor(0) >= 0 || seen_left);
        }
        assert!(seen_left);
        assert!(calls > 0);
    }
}
