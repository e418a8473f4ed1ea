//! Hexpansion detection and provisioning
//!
//! Everything needed to go from "something was plugged into port N" to a
//! HexDrive with a valid header, a filesystem and current companion
//! firmware.

pub mod catalog;
pub mod eeprom;
pub mod header;
pub mod provision;
pub mod registry;

pub use catalog::{AccessoryType, CATALOG};
pub use eeprom::{BusError, Eeprom};
pub use header::{ExpansionHeader, HeaderError};
pub use provision::{ProvisionError, ProvisionStep, Provisioner};
pub use registry::{Accessory, Classification, PortRegistry, PortSet, PortStatus};
