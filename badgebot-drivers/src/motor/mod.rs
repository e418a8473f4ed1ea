//! Motor output implementations
//!
//! - DC motors: signed power split onto an H-bridge pin pair
//! - Servos: pulse width around a trimmed centre

pub mod bridge;
pub mod servo;

pub use bridge::{BridgeDuty, HBridge};
pub use servo::{pulse_us, SERVO_FREQ, SERVO_PERIOD_US};
