//! Board-agnostic core logic for the BadgeBot HexDrive manager
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hexpansion header codec, product catalog and port registry
//! - EEPROM provisioning, firmware refresh and erase
//! - Lifecycle state machine and session
//! - Motion recording, power-profile compilation and playback
//! - Settings definitions
//! - Accessory driver traits

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

// This must go first so the other modules see its macros.
mod fmt;

pub mod config;
pub mod hexpansion;
pub mod lifecycle;
pub mod motion;
pub mod traits;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
