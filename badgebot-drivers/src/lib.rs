//! HexDrive companion driver
//!
//! This crate provides the concrete [`AccessoryDriver`] that runs on a
//! HexDrive hexpansion, built from the output primitives below:
//!
//! - Motors: H-bridge pin pairs driven by signed power
//! - Servos: 50 Hz pulse-width outputs with centre trim
//! - Stepper: half-step coil sequencing over the four outputs
//!
//! [`AccessoryDriver`]: badgebot_core::traits::AccessoryDriver

#![no_std]
#![deny(unsafe_code)]

pub mod hexdrive;
pub mod motor;
pub mod stepper;

pub use hexdrive::{HexDrive, APP_VERSION, PWM_FREQ};
