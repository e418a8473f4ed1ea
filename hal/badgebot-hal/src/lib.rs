//! BadgeBot Hardware Abstraction Layer
//!
//! This crate defines the traits the BadgeBot manager needs from the badge
//! runtime: the per-port hexpansion I2C buses, the block filesystem used to
//! stage companion firmware, the front-panel buttons, the persisted settings
//! store and PWM outputs. The badge runtime (or a test harness) implements
//! them; the manager logic in `badgebot-core` is written purely against them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  badgebot-app (controller, tasks)       │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ badgebot-core │       │   badgebot-   │
//! │               │       │    drivers    │
//! └───────────────┘       └───────────────┘
//!         │                       │
//!         └───────────┬───────────┘
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  badgebot-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`i2c::I2cBus`], [`i2c::PortBus`] - Hexpansion port buses
//! - [`fs::Filesystem`] - Block filesystem on the accessory EEPROM
//! - [`input::Buttons`] - Front-panel buttons
//! - [`settings::SettingsStore`] - Persisted key/value settings
//! - [`pwm::PwmChannel`] - PWM outputs with adjustable frequency

#![no_std]
#![deny(unsafe_code)]

pub mod fs;
pub mod i2c;
pub mod input;
pub mod pwm;
pub mod settings;

// Re-export key traits at crate root for convenience
pub use fs::{FsError, Filesystem, OpenMode, Volume};
pub use i2c::{I2cBus, PortBus, NUM_PORTS};
pub use input::{Button, ButtonSet, Buttons};
pub use pwm::PwmChannel;
pub use settings::{SettingValue, SettingsError, SettingsStore};
