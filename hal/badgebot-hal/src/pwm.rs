//! PWM output abstractions
//!
//! HexDrive outputs are plain PWM channels. Duty cycle control comes from
//! `embedded-hal`; frequency is adjustable because the same output may drive
//! a DC motor bridge (tens of kHz) or a hobby servo (50 Hz).

use embedded_hal::pwm::SetDutyCycle;

/// PWM channel with adjustable frequency
pub trait PwmChannel: SetDutyCycle {
    /// Change the PWM frequency
    ///
    /// The duty cycle fraction is not guaranteed to survive a frequency
    /// change; callers re-apply it.
    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error>;

    /// Current PWM frequency in Hz
    fn frequency(&self) -> u32;
}
