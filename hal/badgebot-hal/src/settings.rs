//! Persisted settings abstractions
//!
//! The badge runtime provides a global key/value settings store shared by
//! all apps. Keys are dotted strings; values are small scalars.

/// A stored setting value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl SettingValue {
    /// Interpret the value as an integer
    ///
    /// Floats are truncated; booleans are not integers.
    pub fn as_int(self) -> Option<i32> {
        match self {
            SettingValue::Int(v) => Some(v),
            SettingValue::Float(v) => Some(v as i32),
            SettingValue::Bool(_) => None,
        }
    }

    /// Interpret the value as a boolean
    pub fn as_bool(self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(v),
            SettingValue::Int(v) => Some(v != 0),
            SettingValue::Float(_) => None,
        }
    }
}

/// Errors from settings storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// Storage backend failed
    Storage,
    /// Store has no room for another key
    Full,
}

/// Global settings store
pub trait SettingsStore {
    /// Read a value by key
    fn get(&self, key: &str) -> Option<SettingValue>;

    /// Stage a value for the next [`SettingsStore::save`]
    fn set(&mut self, key: &str, value: SettingValue) -> Result<(), SettingsError>;

    /// Persist staged values
    fn save(&mut self) -> Result<(), SettingsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_int() {
        assert_eq!(SettingValue::Int(7).as_int(), Some(7));
        assert_eq!(SettingValue::Float(7.9).as_int(), Some(7));
        assert_eq!(SettingValue::Bool(true).as_int(), None);
    }

    #[test]
    fn test_as_bool() {
        assert_eq!(SettingValue::Bool(false).as_bool(), Some(false));
        assert_eq!(SettingValue::Int(1).as_bool(), Some(true));
        assert_eq!(SettingValue::Float(1.0).as_bool(), None);
    }
}
