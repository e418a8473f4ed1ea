//! Stepper output implementations

pub mod half_step;

pub use half_step::{coils, HALF_STEP};
