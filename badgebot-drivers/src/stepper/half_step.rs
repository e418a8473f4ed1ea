//! Half-step sequencing for a bipolar stepper
//!
//! The four outputs are the two coil pairs `A+ A- B+ B-`. Stepping through
//! the table in increasing order turns the rotor one way; decreasing order
//! turns it back.

use badgebot_core::motion::stepper::PHASES;

/// Energised outputs per phase
pub const HALF_STEP: [[bool; 4]; PHASES as usize] = [
    [true, false, false, false],
    [true, false, true, false],
    [false, false, true, false],
    [false, true, true, false],
    [false, true, false, false],
    [false, true, false, true],
    [false, false, false, true],
    [true, false, false, true],
];

/// Energised outputs for a phase, wrapping past the end of the table
pub fn coils(phase: u8) -> [bool; 4] {
    HALF_STEP[usize::from(phase % PHASES)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps() {
        assert_eq!(coils(8), coils(0));
        assert_eq!(coils(15), HALF_STEP[7]);
    }

    #[test]
    fn test_adjacent_phases_change_one_output() {
        for phase in 0..PHASES {
            let a = coils(phase);
            let b = coils(phase + 1);
            let changed = a.iter().zip(b.iter()).filter(|(x, y)| x != y).count();
            assert_eq!(changed, 1, "phase {}", phase);
        }
    }

    #[test]
    fn test_never_shorts_a_coil() {
        for pattern in HALF_STEP {
            assert!(!(pattern[0] && pattern[1]));
            assert!(!(pattern[2] && pattern[3]));
        }
    }
}
