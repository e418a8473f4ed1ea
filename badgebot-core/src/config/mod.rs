//! Configuration types
//!
//! User tunables persisted in the badge's global settings store.

pub mod settings;

pub use settings::*;
