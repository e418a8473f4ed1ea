//! BadgeBot app
//!
//! Wires the core session to the user: the [`controller::Controller`]
//! owns hardware and app state, [`view`] describes what to draw, and
//! [`tasks`] run playback and the stepper timer beside the foreground loop.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This must go first so the other modules see its macros.
mod fmt;

pub mod controller;
pub mod tasks;
pub mod view;

pub use controller::{Controller, MenuItem};
pub use view::{Screen, Tone};
