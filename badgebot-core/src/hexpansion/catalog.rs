//! HexDrive product catalog
//!
//! All HexDrive variants share the family vendor id and the high byte of
//! the product id; the low byte selects the variant.

use super::header::{ExpansionHeader, HeaderError};

/// Vendor id shared by the HexDrive family
pub const FAMILY_VENDOR_ID: u16 = 0xCAFE;

/// High byte of every HexDrive product id
pub const FAMILY_PID_PREFIX: u8 = 0xCB;

/// Manifest version written when provisioning
pub const MANIFEST_VERSION: &str = "2024";

/// Filesystem offset written when provisioning (the page after the header)
pub const DEFAULT_FS_OFFSET: u16 = 64;

/// EEPROM page size written when provisioning
pub const DEFAULT_PAGE_SIZE: u16 = 32;

/// EEPROM size written when provisioning
pub const DEFAULT_TOTAL_SIZE: u32 = 8192;

/// Friendly name written when provisioning
pub const FRIENDLY_NAME: &str = "HexDrive";

/// A HexDrive variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AccessoryType {
    /// Low byte of the product id
    pub pid: u8,
    /// Number of DC motors
    pub motors: u8,
    /// Number of servo channels
    pub servos: u8,
    /// Number of stepper motors
    pub steppers: u8,
    /// Display name
    pub name: &'static str,
}

/// Known HexDrive variants; the first entry is the default for provisioning
pub static CATALOG: [AccessoryType; 5] = [
    AccessoryType {
        pid: 0xCA,
        motors: 2,
        servos: 0,
        steppers: 0,
        name: "2 Motor",
    },
    AccessoryType {
        pid: 0xCB,
        motors: 2,
        servos: 4,
        steppers: 0,
        name: "Unknown",
    },
    AccessoryType {
        pid: 0xCC,
        motors: 0,
        servos: 4,
        steppers: 0,
        name: "4 Servo",
    },
    AccessoryType {
        pid: 0xCD,
        motors: 1,
        servos: 2,
        steppers: 0,
        name: "1 Mot 2 Srvo",
    },
    AccessoryType {
        pid: 0xCE,
        motors: 0,
        servos: 0,
        steppers: 1,
        name: "Stepper",
    },
];

impl AccessoryType {
    /// Look up a variant by vendor and product id
    ///
    /// Returns `None` for anything outside the HexDrive family.
    pub fn lookup(vendor_id: u16, product_id: u16) -> Option<&'static AccessoryType> {
        let [prefix, pid] = product_id.to_be_bytes();
        if vendor_id != FAMILY_VENDOR_ID || prefix != FAMILY_PID_PREFIX {
            return None;
        }
        CATALOG.iter().find(|t| t.pid == pid)
    }

    /// Look up the variant a header describes
    pub fn from_header(header: &ExpansionHeader) -> Option<&'static AccessoryType> {
        Self::lookup(header.vendor_id(), header.product_id())
    }

    /// Full 16-bit product id
    pub fn product_id(&self) -> u16 {
        u16::from_be_bytes([FAMILY_PID_PREFIX, self.pid])
    }

    /// Index of this variant in [`CATALOG`]
    pub fn index(&self) -> usize {
        CATALOG.iter().position(|t| t.pid == self.pid).unwrap_or(0)
    }

    /// Header written when provisioning a blank board as this variant
    pub fn provisioning_header(&self, unique_id: u32) -> Result<ExpansionHeader, HeaderError> {
        ExpansionHeader::new(
            MANIFEST_VERSION,
            DEFAULT_FS_OFFSET,
            DEFAULT_PAGE_SIZE,
            DEFAULT_TOTAL_SIZE,
            FAMILY_VENDOR_ID,
            self.product_id(),
            unique_id,
            FRIENDLY_NAME,
        )
    }

    /// Whether the motor-moves program is available
    pub fn supports_motor_moves(&self) -> bool {
        self.motors >= 2
    }
}

/// Catalog entry at `index`, wrapping in both directions
pub fn catalog_entry(index: isize) -> &'static AccessoryType {
    let len = CATALOG.len() as isize;
    &CATALOG[index.rem_euclid(len) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_family() {
        let t = AccessoryType::lookup(0xCAFE, 0xCBCE).unwrap();
        assert_eq!(t.name, "Stepper");
        assert_eq!(t.steppers, 1);
    }

    #[test]
    fn test_lookup_foreign_vendor() {
        assert!(AccessoryType::lookup(0x1234, 0xCBCA).is_none());
    }

    #[test]
    fn test_lookup_wrong_prefix() {
        assert!(AccessoryType::lookup(0xCAFE, 0xCACA).is_none());
    }

    #[test]
    fn test_lookup_unknown_variant() {
        assert!(AccessoryType::lookup(0xCAFE, 0xCB01).is_none());
    }

    #[test]
    fn test_product_id_round_trips_through_lookup() {
        for t in CATALOG.iter() {
            assert_eq!(AccessoryType::lookup(FAMILY_VENDOR_ID, t.product_id()), Some(t));
        }
    }

    #[test]
    fn test_provisioning_header() {
        let header = CATALOG[0].provisioning_header(7).unwrap();
        assert_eq!(header.manifest_version(), "2024");
        assert_eq!(header.fs_offset(), 64);
        assert_eq!(header.page_size(), 32);
        assert_eq!(header.total_size(), 8192);
        assert_eq!(header.product_id(), 0xCBCA);
        assert_eq!(header.unique_id(), 7);
        assert_eq!(AccessoryType::from_header(&header), Some(&CATALOG[0]));
    }

    #[test]
    fn test_catalog_entry_wraps() {
        assert_eq!(catalog_entry(-1).pid, 0xCE);
        assert_eq!(catalog_entry(5).pid, 0xCA);
        assert_eq!(catalog_entry(2).index(), 2);
    }

    #[test]
    fn test_motor_moves_support() {
        assert!(CATALOG[0].supports_motor_moves());
        assert!(!CATALOG[3].supports_motor_moves());
    }
}
