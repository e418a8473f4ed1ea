//! DC motor H-bridge
//!
//! Each motor is wired to a pair of PWM outputs. Forward power drives the
//! first output and holds the second low; reverse power does the opposite.
//! Zero power leaves both low, so the motor coasts.
//!
//! ```ignore
//! let mut bridge = HBridge::new();
//! bridge.set_power(-30000);
//! let duty = bridge.duty();
//! forward_pwm.set_duty_cycle_fraction(duty.forward, MAX_DUTY)?;
//! reverse_pwm.set_duty_cycle_fraction(duty.reverse, MAX_DUTY)?;
//! ```

use badgebot_core::traits::MAX_POWER;

/// Duty fractions for the two bridge outputs, out of [`BridgeDuty::MAX`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeDuty {
    pub forward: u16,
    pub reverse: u16,
}

impl BridgeDuty {
    /// Denominator of the duty fractions
    pub const MAX: u16 = MAX_POWER as u16;

    /// Both outputs low
    pub const OFF: Self = Self {
        forward: 0,
        reverse: 0,
    };
}

/// One motor's bridge state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HBridge {
    /// Signed power, clamped to ±MAX_POWER
    power: i32,
}

impl HBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signed power
    ///
    /// Values beyond ±[`MAX_POWER`] are clamped.
    pub fn set_power(&mut self, power: i32) {
        self.power = power.clamp(-MAX_POWER, MAX_POWER);
    }

    pub fn power(&self) -> i32 {
        self.power
    }

    /// Check if the motor is being driven
    pub fn is_driving(&self) -> bool {
        self.power != 0
    }

    /// Duty for each output of the pair
    pub fn duty(&self) -> BridgeDuty {
        let magnitude = self.power.unsigned_abs() as u16;
        if self.power > 0 {
            BridgeDuty {
                forward: magnitude,
                reverse: 0,
            }
        } else if self.power < 0 {
            BridgeDuty {
                forward: 0,
                reverse: magnitude,
            }
        } else {
            BridgeDuty::OFF
        }
    }
}
