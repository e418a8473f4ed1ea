//! Hexpansion identification header
//!
//! Every hexpansion EEPROM starts with a fixed 34-byte header that names the
//! board and describes where its filesystem lives. All multi-byte fields are
//! little-endian:
//!
//! ```text
//! 0   magic "THEX"          4
//! 4   manifest version      4  ASCII
//! 8   fs_offset             2
//! 10  page_size             2
//! 12  total_size            4
//! 16  vendor_id             2
//! 18  product_id            2
//! 20  unique_id             4
//! 24  friendly_name         9  UTF-8, NUL padded
//! 33  checksum              1  0x55 ^ bytes[1..33]
//! ```
//!
//! A block that fails to decode means the storage is blank (or foreign),
//! which is a normal condition rather than a bus fault.

use heapless::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Size of the encoded header in bytes
pub const HEADER_SIZE: usize = 34;

/// Magic bytes at the start of every header
pub const HEADER_MAGIC: [u8; 4] = *b"THEX";

/// Maximum manifest version length
pub const MANIFEST_LEN: usize = 4;

/// Maximum friendly name length in bytes
pub const NAME_LEN: usize = 9;

const NAME_OFFSET: usize = 24;
const CHECKSUM_SEED: u8 = 0x55;
const CHECKSUM_INDEX: usize = HEADER_SIZE - 1;

/// Errors from header encoding and decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeaderError {
    /// Block is not exactly [`HEADER_SIZE`] bytes
    Length,
    /// Magic bytes do not match
    Magic,
    /// Manifest version is empty, too long or not printable ASCII
    Manifest,
    /// Page size is zero or total size is not a multiple of it
    Geometry,
    /// Filesystem offset lies outside the storage
    FsOffset,
    /// Friendly name is too long, contains NUL or is not UTF-8
    Name,
    /// Checksum byte does not match the contents
    Checksum,
}

/// Decoded hexpansion header
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExpansionHeader {
    manifest_version: String<MANIFEST_LEN>,
    fs_offset: u16,
    page_size: u16,
    total_size: u32,
    vendor_id: u16,
    product_id: u16,
    unique_id: u32,
    friendly_name: String<NAME_LEN>,
}

impl ExpansionHeader {
    /// Build and validate a header
    ///
    /// # Arguments
    /// * `manifest_version` - 1 to 4 printable ASCII characters
    /// * `fs_offset` - Byte offset of the filesystem, at or after the header
    /// * `page_size` - EEPROM page size in bytes
    /// * `total_size` - EEPROM size in bytes, a multiple of `page_size`
    /// * `vendor_id`, `product_id`, `unique_id` - Board identity
    /// * `friendly_name` - Up to 9 bytes of UTF-8 without NUL
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manifest_version: &str,
        fs_offset: u16,
        page_size: u16,
        total_size: u32,
        vendor_id: u16,
        product_id: u16,
        unique_id: u32,
        friendly_name: &str,
    ) -> Result<Self, HeaderError> {
        validate_manifest(manifest_version.as_bytes())?;
        validate_geometry(fs_offset, page_size, total_size)?;
        if friendly_name.len() > NAME_LEN || friendly_name.contains('\0') {
            return Err(HeaderError::Name);
        }

        let mut manifest = String::new();
        manifest
            .push_str(manifest_version)
            .map_err(|_| HeaderError::Manifest)?;
        let mut name = String::new();
        name.push_str(friendly_name).map_err(|_| HeaderError::Name)?;

        Ok(Self {
            manifest_version: manifest,
            fs_offset,
            page_size,
            total_size,
            vendor_id,
            product_id,
            unique_id,
            friendly_name: name,
        })
    }

    pub fn manifest_version(&self) -> &str {
        &self.manifest_version
    }

    pub fn fs_offset(&self) -> u16 {
        self.fs_offset
    }

    pub fn page_size(&self) -> u16 {
        self.page_size
    }

    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn unique_id(&self) -> u32 {
        self.unique_id
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Number of pages in the whole EEPROM
    pub fn page_count(&self) -> u32 {
        self.total_size / u32::from(self.page_size)
    }

    /// Serialize to the on-EEPROM layout
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&HEADER_MAGIC);
        out[4..4 + self.manifest_version.len()].copy_from_slice(self.manifest_version.as_bytes());
        out[8..10].copy_from_slice(&self.fs_offset.to_le_bytes());
        out[10..12].copy_from_slice(&self.page_size.to_le_bytes());
        out[12..16].copy_from_slice(&self.total_size.to_le_bytes());
        out[16..18].copy_from_slice(&self.vendor_id.to_le_bytes());
        out[18..20].copy_from_slice(&self.product_id.to_le_bytes());
        out[20..24].copy_from_slice(&self.unique_id.to_le_bytes());
        out[NAME_OFFSET..NAME_OFFSET + self.friendly_name.len()].copy_from_slice(self.friendly_name.as_bytes());
        out[CHECKSUM_INDEX] = checksum(&out);
        out
    }

    /// Parse a raw header block
    ///
    /// Any structural inconsistency is reported as a [`HeaderError`]; the
    /// caller treats that as blank storage.
    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> {
        let bytes: &[u8; HEADER_SIZE] = bytes.try_into().map_err(|_| HeaderError::Length)?;

        if bytes[0..4] != HEADER_MAGIC {
            return Err(HeaderError::Magic);
        }
        if bytes[CHECKSUM_INDEX] != checksum(bytes) {
            return Err(HeaderError::Checksum);
        }

        let manifest = trim_nul(&bytes[4..8]);
        validate_manifest(manifest)?;

        let fs_offset = u16::from_le_bytes([bytes[8], bytes[9]]);
        let page_size = u16::from_le_bytes([bytes[10], bytes[11]]);
        let total_size = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        validate_geometry(fs_offset, page_size, total_size)?;

        let name = trim_nul(&bytes[NAME_OFFSET..NAME_OFFSET + NAME_LEN]);
        let name = core::str::from_utf8(name).map_err(|_| HeaderError::Name)?;
        let manifest = core::str::from_utf8(manifest).map_err(|_| HeaderError::Manifest)?;

        Self::new(
            manifest,
            fs_offset,
            page_size,
            total_size,
            u16::from_le_bytes([bytes[16], bytes[17]]),
            u16::from_le_bytes([bytes[18], bytes[19]]),
            u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]),
            name,
        )
    }
}

fn checksum(block: &[u8; HEADER_SIZE]) -> u8 {
    block[1..CHECKSUM_INDEX]
        .iter()
        .fold(CHECKSUM_SEED, |acc, b| acc ^ b)
}

fn trim_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &field[..end]
}

fn validate_manifest(manifest: &[u8]) -> Result<(), HeaderError> {
    if manifest.is_empty()
        || manifest.len() > MANIFEST_LEN
        || !manifest.iter().all(|b| b.is_ascii_graphic())
    {
        return Err(HeaderError::Manifest);
    }
    Ok(())
}

fn validate_geometry(fs_offset: u16, page_size: u16, total_size: u32) -> Result<(), HeaderError> {
    if page_size == 0 || total_size == 0 || total_size % u32::from(page_size) != 0 {
        return Err(HeaderError::Geometry);
    }
    let fs_offset = u32::from(fs_offset);
    if fs_offset < HEADER_SIZE as u32 || fs_offset >= total_size {
        return Err(HeaderError::FsOffset);
    }
    Ok(())
}
