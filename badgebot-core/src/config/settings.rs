//! BadgeBot settings
//!
//! Every tunable has a dotted key in the global settings store, a default
//! and a clamping range. Missing or mistyped values fall back to the
//! default independently of each other.

use badgebot_hal::{SettingValue, SettingsError, SettingsStore};

use crate::motion::compiler::ProfileParams;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies one setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SettingKey {
    Acceleration,
    MaxPower,
    DriveStepMs,
    TurnStepMs,
    ServoStepUs,
    ServoRangeUs,
    StepperStepHz,
    PwmFreqHz,
    ShowWarning,
}

impl SettingKey {
    /// All keys in settings-screen order
    pub const ALL: [SettingKey; 9] = [
        SettingKey::Acceleration,
        SettingKey::MaxPower,
        SettingKey::DriveStepMs,
        SettingKey::TurnStepMs,
        SettingKey::ServoStepUs,
        SettingKey::ServoRangeUs,
        SettingKey::StepperStepHz,
        SettingKey::PwmFreqHz,
        SettingKey::ShowWarning,
    ];

    /// Key in the global settings store
    pub fn name(self) -> &'static str {
        match self {
            SettingKey::Acceleration => "badgebot.acceleration",
            SettingKey::MaxPower => "badgebot.max_power",
            SettingKey::DriveStepMs => "badgebot.drive_step_ms",
            SettingKey::TurnStepMs => "badgebot.turn_step_ms",
            SettingKey::ServoStepUs => "badgebot.servo_step_us",
            SettingKey::ServoRangeUs => "badgebot.servo_range_us",
            SettingKey::StepperStepHz => "badgebot.stepper_step_hz",
            SettingKey::PwmFreqHz => "badgebot.pwm_freq_hz",
            SettingKey::ShowWarning => "badgebot.show_warning",
        }
    }

    /// Short label for the settings screen
    pub fn label(self) -> &'static str {
        match self {
            SettingKey::Acceleration => "Acceleration",
            SettingKey::MaxPower => "Max Power",
            SettingKey::DriveStepMs => "Drive Step ms",
            SettingKey::TurnStepMs => "Turn Step ms",
            SettingKey::ServoStepUs => "Servo Step us",
            SettingKey::ServoRangeUs => "Servo Range us",
            SettingKey::StepperStepHz => "Stepper Hz",
            SettingKey::PwmFreqHz => "PWM Freq Hz",
            SettingKey::ShowWarning => "Show Warning",
        }
    }

    /// Inclusive value range; booleans use 0..=1
    pub fn range(self) -> (i32, i32) {
        match self {
            SettingKey::Acceleration => (100, 65535),
            SettingKey::MaxPower => (1000, 65535),
            SettingKey::DriveStepMs => (20, 2000),
            SettingKey::TurnStepMs => (20, 2000),
            SettingKey::ServoStepUs => (1, 100),
            SettingKey::ServoRangeUs => (100, 1000),
            SettingKey::StepperStepHz => (10, 2000),
            SettingKey::PwmFreqHz => (1000, 50000),
            SettingKey::ShowWarning => (0, 1),
        }
    }

    /// Amount one LEFT/RIGHT press changes the value by
    pub fn increment(self) -> i32 {
        match self {
            SettingKey::Acceleration => 100,
            SettingKey::MaxPower => 1000,
            SettingKey::DriveStepMs | SettingKey::TurnStepMs => 10,
            SettingKey::ServoStepUs => 1,
            SettingKey::ServoRangeUs => 50,
            SettingKey::StepperStepHz => 10,
            SettingKey::PwmFreqHz => 1000,
            SettingKey::ShowWarning => 1,
        }
    }

    fn clamp(self, value: i32) -> i32 {
        let (lo, hi) = self.range();
        value.clamp(lo, hi)
    }
}

/// User tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Settings {
    /// Power increase per 10 ms tick while ramping
    pub acceleration: u32,
    /// Plateau motor power
    pub max_power: u32,
    /// Duration of one UP/DOWN press
    pub drive_step_ms: u32,
    /// Duration of one LEFT/RIGHT press
    pub turn_step_ms: u32,
    /// Servo test position change per press
    pub servo_step_us: u16,
    /// Servo test travel either side of centre
    pub servo_range_us: u16,
    /// Stepper test step rate
    pub stepper_step_hz: u32,
    /// Motor PWM frequency
    pub pwm_freq_hz: u32,
    /// Show the safety warning on start
    pub show_warning: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            acceleration: 2000,
            max_power: 40000,
            drive_step_ms: 200,
            turn_step_ms: 100,
            servo_step_us: 10,
            servo_range_us: 1000,
            stepper_step_hz: 200,
            pwm_freq_hz: 20000,
            show_warning: true,
        }
    }
}

impl Settings {
    /// Read every setting, defaulting each one that is missing or mistyped
    pub fn load<S: SettingsStore + ?Sized>(store: &S) -> Self {
        let mut settings = Self::default();
        for key in SettingKey::ALL {
            let stored = store.get(key.name()).and_then(|v| match key {
                SettingKey::ShowWarning => v.as_bool().map(i32::from),
                _ => v.as_int(),
            });
            match stored {
                Some(value) => settings.set(key, value),
                None => trace!("setting {} defaulted", key.name()),
            }
        }
        settings
    }

    /// Write every setting and persist
    pub fn store<S: SettingsStore + ?Sized>(&self, store: &mut S) -> Result<(), SettingsError> {
        for key in SettingKey::ALL {
            let value = match key {
                SettingKey::ShowWarning => SettingValue::Bool(self.show_warning),
                _ => SettingValue::Int(self.get(key)),
            };
            store.set(key.name(), value)?;
        }
        store.save()
    }

    /// Current value of a setting
    pub fn get(&self, key: SettingKey) -> i32 {
        let value = match key {
            SettingKey::Acceleration => self.acceleration,
            SettingKey::MaxPower => self.max_power,
            SettingKey::DriveStepMs => self.drive_step_ms,
            SettingKey::TurnStepMs => self.turn_step_ms,
            SettingKey::ServoStepUs => u32::from(self.servo_step_us),
            SettingKey::ServoRangeUs => u32::from(self.servo_range_us),
            SettingKey::StepperStepHz => self.stepper_step_hz,
            SettingKey::PwmFreqHz => self.pwm_freq_hz,
            SettingKey::ShowWarning => u32::from(self.show_warning),
        };
        value as i32
    }

    /// Set a value, clamped to the key's range
    pub fn set(&mut self, key: SettingKey, value: i32) {
        // Clamped values are positive and fit every field
        let value = key.clamp(value) as u32;
        match key {
            SettingKey::Acceleration => self.acceleration = value,
            SettingKey::MaxPower => self.max_power = value,
            SettingKey::DriveStepMs => self.drive_step_ms = value,
            SettingKey::TurnStepMs => self.turn_step_ms = value,
            SettingKey::ServoStepUs => self.servo_step_us = value as u16,
            SettingKey::ServoRangeUs => self.servo_range_us = value as u16,
            SettingKey::StepperStepHz => self.stepper_step_hz = value,
            SettingKey::PwmFreqHz => self.pwm_freq_hz = value,
            SettingKey::ShowWarning => self.show_warning = value != 0,
        }
    }

    /// Move a value by `steps` increments
    pub fn adjust(&mut self, key: SettingKey, steps: i32) {
        let next = self
            .get(key)
            .saturating_add(steps.saturating_mul(key.increment()));
        self.set(key, next);
    }

    /// Parameters for compiling motion profiles
    pub fn profile_params(&self) -> ProfileParams {
        ProfileParams {
            acceleration: self.acceleration,
            max_power: self.max_power,
            drive_step_ms: self.drive_step_ms,
            turn_step_ms: self.turn_step_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSettings;

    #[test]
    fn test_defaults_within_range() {
        let settings = Settings::default();
        for key in SettingKey::ALL {
            let (lo, hi) = key.range();
            let value = settings.get(key);
            assert!(value >= lo && value <= hi, "{:?} = {}", key, value);
        }
    }

    #[test]
    fn test_load_empty_store() {
        let store = MockSettings::new();
        assert_eq!(Settings::load(&store), Settings::default());
    }

    #[test]
    fn test_load_each_key_independently() {
        let mut store = MockSettings::new();
        store.insert("badgebot.max_power", SettingValue::Int(30000));
        store.insert("badgebot.acceleration", SettingValue::Bool(true));
        store.insert("badgebot.show_warning", SettingValue::Bool(false));
        store.insert("badgebot.turn_step_ms", SettingValue::Float(150.0));

        let settings = Settings::load(&store);
        assert_eq!(settings.max_power, 30000);
        assert_eq!(settings.acceleration, Settings::default().acceleration);
        assert!(!settings.show_warning);
        assert_eq!(settings.turn_step_ms, 150);
    }

    #[test]
    fn test_load_clamps() {
        let mut store = MockSettings::new();
        store.insert("badgebot.max_power", SettingValue::Int(1_000_000));
        store.insert("badgebot.drive_step_ms", SettingValue::Int(-5));
        let settings = Settings::load(&store);
        assert_eq!(settings.max_power, 65535);
        assert_eq!(settings.drive_step_ms, 20);
    }

    #[test]
    fn test_store_then_load() {
        let mut settings = Settings::default();
        settings.adjust(SettingKey::ServoRangeUs, -2);
        settings.adjust(SettingKey::ShowWarning, -1);

        let mut store = MockSettings::new();
        settings.store(&mut store).unwrap();
        assert_eq!(store.saves(), 1);
        assert_eq!(store.get("badgebot.show_warning"), Some(SettingValue::Bool(false)));
        assert_eq!(Settings::load(&store), settings);
    }

    #[test]
    fn test_store_failure() {
        let mut store = MockSettings::new();
        store.fail_saves(true);
        assert_eq!(
            Settings::default().store(&mut store),
            Err(SettingsError::Storage)
        );
    }

    #[test]
    fn test_adjust_saturates_at_range() {
        let mut settings = Settings::default();
        settings.adjust(SettingKey::PwmFreqHz, 1000);
        assert_eq!(settings.pwm_freq_hz, 50000);
        settings.adjust(SettingKey::PwmFreqHz, -1000);
        assert_eq!(settings.pwm_freq_hz, 1000);
    }
}
