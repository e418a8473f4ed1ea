//! Hobby servo pulse timing

/// Servo PWM frequency
pub const SERVO_FREQ: u32 = 50;

/// Servo PWM period in µs
pub const SERVO_PERIOD_US: u16 = 20_000;

/// Pulse width at the neutral position
pub const NEUTRAL_US: i32 = 1500;

/// Largest offset from the trimmed centre
pub const RANGE_US: i16 = 1000;

/// Pulse width for a position offset and centre trim
///
/// The offset is limited to ±[`RANGE_US`]; the trim is added on top, and
/// the result never leaves one PWM period.
pub fn pulse_us(position: i16, centre: i16) -> u16 {
    let offset = i32::from(position.clamp(-RANGE_US, RANGE_US));
    let pulse = NEUTRAL_US + i32::from(centre) + offset;
    pulse.clamp(0, i32::from(SERVO_PERIOD_US)) as u16
}
