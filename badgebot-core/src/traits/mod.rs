//! Hardware abstraction traits
//!
//! These traits define the interface between the manager logic and the
//! companion drivers that run the accessories.

pub mod accessory;

pub use accessory::{AccessoryDirectory, AccessoryDriver, AccessoryError, MotorPowers, MAX_POWER};
