//! Accessory driver traits
//!
//! Each HexDrive runs a companion driver that owns its outputs. The manager
//! talks to it only through [`AccessoryDriver`]; drivers are looked up per
//! port through an [`AccessoryDirectory`], and a port whose companion has
//! not started yet simply has no driver.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest motor power magnitude
pub const MAX_POWER: i32 = 65535;

/// Errors that can occur with accessory operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessoryError {
    /// Output resources could not be allocated when the driver started
    SetupFailed,
    /// Companion did not answer
    NotResponding,
    /// Channel does not exist on this variant
    InvalidChannel,
    /// Variant has no outputs of the requested kind
    Unsupported,
    /// Output hardware rejected the request
    Output,
}

/// Signed power for each of the four motor channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorPowers(pub [i32; 4]);

impl MotorPowers {
    /// All motors stopped
    pub const STOPPED: Self = Self([0; 4]);

    /// Powers for a two-motor drive (left, right)
    pub fn from_pair(left: i32, right: i32) -> Self {
        Self([left, right, 0, 0])
    }

    /// Power for one motor
    pub fn motor(&self, index: usize) -> i32 {
        self.0.get(index).copied().unwrap_or(0)
    }

    /// Check whether every motor is stopped
    pub fn is_stopped(&self) -> bool {
        self.0.iter().all(|p| *p == 0)
    }
}

/// Companion driver for one accessory
pub trait AccessoryDriver {
    /// Companion firmware version
    fn version(&self) -> Result<u16, AccessoryError>;

    /// `false` if the driver failed to set up its outputs
    fn status(&self) -> bool;

    /// Switch the accessory's motor supply
    ///
    /// Requesting the current state again is a no-op.
    fn set_power(&mut self, on: bool) -> Result<(), AccessoryError>;

    /// Set all motor powers (each clamped to ±[`MAX_POWER`])
    fn set_motors(&mut self, powers: MotorPowers) -> Result<(), AccessoryError>;

    /// Set a servo pulse offset in µs, or `None` to stop the pulses
    fn set_servo_position(&mut self, channel: u8, position: Option<i16>)
        -> Result<(), AccessoryError>;

    /// Set a servo centre trim in µs
    fn set_servo_centre(&mut self, centre: i16, channel: u8) -> Result<(), AccessoryError>;

    /// Set PWM frequency on one output, or on all outputs when `channel` is `None`
    fn set_frequency(&mut self, hz: u32, channel: Option<u8>) -> Result<(), AccessoryError>;

    /// Energise the stepper coils for a half-step phase (0..8)
    fn motor_step(&mut self, phase: u8) -> Result<(), AccessoryError>;

    /// De-energise all outputs
    fn motor_release(&mut self) -> Result<(), AccessoryError>;
}

/// Per-port lookup of running companion drivers
pub trait AccessoryDirectory {
    /// Driver type
    type Driver: AccessoryDriver;

    /// Driver running for a port, if its companion has started
    fn driver(&mut self, port: u8) -> Option<&mut Self::Driver>;

    /// Ask the host to (re)start the companion for a port from its
    /// freshly written firmware
    fn relaunch(&mut self, port: u8);
}
