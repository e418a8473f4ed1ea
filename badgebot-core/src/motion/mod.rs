//! Motion recording and playback
//!
//! Button presses become run-length encoded [`Instruction`]s, each compiled
//! into a ramped [`PowerProfile`], and the concatenated profiles are played
//! back tick by tick.

pub mod compiler;
pub mod instruction;
pub mod playback;
pub mod recorder;
pub mod stepper;
pub mod window;

pub use compiler::{PowerProfile, ProfileParams, ProfileStep, TICK_MS};
pub use instruction::{Direction, Instruction};
pub use playback::Playback;
pub use recorder::{Recorder, Row};
pub use stepper::StepperCell;
pub use window::{ScrollWindow, VISIBLE_ROWS};
