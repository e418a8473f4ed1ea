//! HexDrive companion driver
//!
//! Owns the four PWM outputs of a HexDrive, its motor supply enable and its
//! external power detect input. Which outputs act as motor bridges, servo
//! channels or stepper coils follows from the variant's catalog entry.
//!
//! Output layout:
//! - motor `n` uses outputs `2n` (forward) and `2n + 1` (reverse)
//! - servo `c` uses the first output after the motor outputs, wrapping to
//!   output `c` when the motors take all four
//! - the stepper uses all four outputs as `A+ A- B+ B-`

use badgebot_core::hexpansion::AccessoryType;
use badgebot_core::lifecycle::CURRENT_VERSION;
use badgebot_core::traits::{AccessoryDriver, AccessoryError, MotorPowers};
use badgebot_hal::PwmChannel;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use embedded_hal::pwm::SetDutyCycle;
use heapless::Vec;

use crate::motor::{pulse_us, BridgeDuty, HBridge, SERVO_FREQ, SERVO_PERIOD_US};
use crate::motor::servo::RANGE_US;
use crate::stepper::coils;

/// Companion firmware version this driver implements
pub const APP_VERSION: u16 = CURRENT_VERSION;

/// Default PWM frequency for motor and stepper outputs
pub const PWM_FREQ: u32 = 20_000;

/// Number of PWM outputs on a HexDrive
pub const NUM_OUTPUTS: usize = 4;

/// Number of servo channels
pub const NUM_SERVOS: usize = 4;

/// HexDrive driver
pub struct HexDrive<P, E, S> {
    kind: &'static AccessoryType,
    outputs: Vec<P, NUM_OUTPUTS>,
    enable: E,
    detect: S,
    setup_failed: bool,
    powered: bool,
    bridges: [HBridge; 2],
    servo_positions: [Option<i16>; NUM_SERVOS],
    servo_centres: [i16; NUM_SERVOS],
}

impl<P, E, S> HexDrive<P, E, S>
where
    P: PwmChannel,
    E: OutputPin,
    S: InputPin,
{
    /// Take ownership of the outputs
    ///
    /// A `None` output means its PWM could not be allocated; the driver
    /// then reports a failed [`AccessoryDriver::status`] and refuses every
    /// output request. Otherwise power starts off and every output idles
    /// at zero duty.
    pub fn new(
        kind: &'static AccessoryType,
        outputs: [Option<P>; NUM_OUTPUTS],
        enable: E,
        detect: S,
    ) -> Self {
        let mut setup_failed = false;
        let mut owned = Vec::new();
        for output in outputs {
            match output {
                Some(pwm) => {
                    // Capacity matches the array length
                    let _ = owned.push(pwm);
                }
                None => setup_failed = true,
            }
        }

        let mut drive = Self {
            kind,
            outputs: owned,
            enable,
            detect,
            setup_failed,
            powered: false,
            bridges: [HBridge::new(); 2],
            servo_positions: [None; NUM_SERVOS],
            servo_centres: [0; NUM_SERVOS],
        };
        if drive.initialise().is_err() {
            drive.setup_failed = true;
        }
        drive
    }

    fn initialise(&mut self) -> Result<(), AccessoryError> {
        self.enable.set_low().map_err(|_| AccessoryError::Output)?;
        if self.setup_failed {
            return Ok(());
        }
        for index in 0..NUM_OUTPUTS {
            let hz = if self.servo_output(index).is_some() {
                SERVO_FREQ
            } else {
                PWM_FREQ
            };
            self.output(index)?
                .set_frequency(hz)
                .map_err(|_| AccessoryError::SetupFailed)?;
            self.set_duty(index, 0, 1)?;
        }
        Ok(())
    }

    /// Variant this driver was started for
    pub fn kind(&self) -> &'static AccessoryType {
        self.kind
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Check if the external motor supply is connected
    pub fn has_external_power(&mut self) -> Result<bool, AccessoryError> {
        self.detect.is_high().map_err(|_| AccessoryError::NotResponding)
    }

    /// Borrow an output, e.g. to inspect it
    pub fn output(&mut self, index: usize) -> Result<&mut P, AccessoryError> {
        self.outputs
            .get_mut(index)
            .ok_or(AccessoryError::InvalidChannel)
    }

    fn ready(&self) -> Result<(), AccessoryError> {
        if self.setup_failed {
            Err(AccessoryError::SetupFailed)
        } else {
            Ok(())
        }
    }

    fn set_duty(&mut self, index: usize, num: u16, denom: u16) -> Result<(), AccessoryError> {
        self.output(index)?
            .set_duty_cycle_fraction(num, denom)
            .map_err(|_| AccessoryError::Output)
    }

    fn zero_outputs(&mut self) -> Result<(), AccessoryError> {
        for index in 0..NUM_OUTPUTS {
            self.set_duty(index, 0, 1)?;
        }
        Ok(())
    }

    /// Output a servo channel is wired to
    fn servo_channel_output(&self, channel: usize) -> usize {
        let first = usize::from(self.kind.motors) * 2 + channel;
        if first < NUM_OUTPUTS {
            first
        } else {
            channel
        }
    }

    /// Servo channel an output serves, if any
    fn servo_output(&self, index: usize) -> Option<usize> {
        (0..usize::from(self.kind.servos))
            .find(|c| self.servo_channel_output(*c) == index)
            .filter(|_| usize::from(self.kind.motors) * 2 <= index)
    }

    fn servo_channel(&self, channel: u8) -> Result<usize, AccessoryError> {
        if self.kind.servos == 0 {
            return Err(AccessoryError::Unsupported);
        }
        let channel = usize::from(channel);
        if channel < usize::from(self.kind.servos) && channel < NUM_SERVOS {
            Ok(channel)
        } else {
            Err(AccessoryError::InvalidChannel)
        }
    }

    fn apply_servo(&mut self, channel: usize) -> Result<(), AccessoryError> {
        let index = self.servo_channel_output(channel);
        let Some(position) = self.servo_positions[channel] else {
            return self.set_duty(index, 0, 1);
        };
        let output = self.output(index)?;
        if output.frequency() != SERVO_FREQ {
            output
                .set_frequency(SERVO_FREQ)
                .map_err(|_| AccessoryError::Output)?;
        }
        let pulse = pulse_us(position, self.servo_centres[channel]);
        self.set_duty(index, pulse, SERVO_PERIOD_US)
    }
}

impl<P, E, S> AccessoryDriver for HexDrive<P, E, S>
where
    P: PwmChannel,
    E: OutputPin,
    S: InputPin,
{
    fn version(&self) -> Result<u16, AccessoryError> {
        Ok(APP_VERSION)
    }

    fn status(&self) -> bool {
        !self.setup_failed
    }

    fn set_power(&mut self, on: bool) -> Result<(), AccessoryError> {
        self.ready()?;
        if on == self.powered {
            return Ok(());
        }
        if !on {
            self.zero_outputs()?;
        }
        self.enable
            .set_state(PinState::from(on))
            .map_err(|_| AccessoryError::Output)?;
        self.powered = on;
        Ok(())
    }

    fn set_motors(&mut self, powers: MotorPowers) -> Result<(), AccessoryError> {
        self.ready()?;
        let motors = usize::from(self.kind.motors).min(self.bridges.len());
        if motors == 0 {
            return Err(AccessoryError::Unsupported);
        }
        for motor in 0..motors {
            self.bridges[motor].set_power(powers.motor(motor));
            let BridgeDuty { forward, reverse } = self.bridges[motor].duty();
            self.set_duty(2 * motor, forward, BridgeDuty::MAX)?;
            self.set_duty(2 * motor + 1, reverse, BridgeDuty::MAX)?;
        }
        Ok(())
    }

    fn set_servo_position(
        &mut self,
        channel: u8,
        position: Option<i16>,
    ) -> Result<(), AccessoryError> {
        self.ready()?;
        let channel = self.servo_channel(channel)?;
        self.servo_positions[channel] = position.map(|p| p.clamp(-RANGE_US, RANGE_US));
        self.apply_servo(channel)
    }

    fn set_servo_centre(&mut self, centre: i16, channel: u8) -> Result<(), AccessoryError> {
        self.ready()?;
        let channel = self.servo_channel(channel)?;
        self.servo_centres[channel] = centre.clamp(-RANGE_US, RANGE_US);
        self.apply_servo(channel)
    }

    fn set_frequency(&mut self, hz: u32, channel: Option<u8>) -> Result<(), AccessoryError> {
        self.ready()?;
        if hz == 0 {
            return Err(AccessoryError::Output);
        }
        match channel {
            Some(index) => self
                .output(usize::from(index))?
                .set_frequency(hz)
                .map_err(|_| AccessoryError::Output),
            None => {
                for output in self.outputs.iter_mut() {
                    output.set_frequency(hz).map_err(|_| AccessoryError::Output)?;
                }
                Ok(())
            }
        }
    }

    fn motor_step(&mut self, phase: u8) -> Result<(), AccessoryError> {
        self.ready()?;
        if self.kind.steppers == 0 {
            return Err(AccessoryError::Unsupported);
        }
        for (index, energised) in coils(phase).into_iter().enumerate() {
            self.set_duty(index, u16::from(energised), 1)?;
        }
        Ok(())
    }

    fn motor_release(&mut self) -> Result<(), AccessoryError> {
        self.ready()?;
        self.bridges = [HBridge::new(); 2];
        self.servo_positions = [None; NUM_SERVOS];
        self.zero_outputs()
    }
}
