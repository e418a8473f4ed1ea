//! Filesystem abstractions
//!
//! HexDrive accessories carry a small block filesystem after the header in
//! their EEPROM. The badge runtime owns the filesystem driver; the manager
//! only needs to format, mount and copy a single firmware file onto it.

/// Block device region backing a hexpansion filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Volume {
    /// Hexpansion port (1..=6) the EEPROM sits on
    pub port: u8,
    /// Byte offset of the filesystem inside the EEPROM
    pub offset: u32,
    /// EEPROM page size in bytes
    pub page_size: u32,
    /// Total EEPROM size in bytes
    pub total_size: u32,
}

impl Volume {
    /// Number of bytes available to the filesystem
    pub fn fs_size(&self) -> u32 {
        self.total_size.saturating_sub(self.offset)
    }

    /// Number of filesystem blocks (one block per EEPROM page)
    pub fn block_count(&self) -> u32 {
        if self.page_size == 0 {
            0
        } else {
            self.fs_size() / self.page_size
        }
    }
}

/// Errors from filesystem operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsError {
    /// Path does not exist
    NotFound,
    /// Something is already mounted at the path
    AlreadyMounted,
    /// Nothing is mounted at the path
    NotMounted,
    /// No space left on the volume
    NoSpace,
    /// Underlying block device failed
    Io,
}

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenMode {
    /// Read from the start of the file
    Read,
    /// Create or truncate, then write
    Write,
}

/// Minimal filesystem used to stage companion firmware
pub trait Filesystem {
    /// Open file handle
    type File;

    /// Create an empty filesystem on the volume
    fn format(&mut self, volume: &Volume) -> Result<(), FsError>;

    /// Mount the volume at `path`
    ///
    /// Returns [`FsError::AlreadyMounted`] if something is mounted there.
    fn mount(&mut self, volume: &Volume, path: &str) -> Result<(), FsError>;

    /// Unmount whatever is mounted at `path`
    fn unmount(&mut self, path: &str) -> Result<(), FsError>;

    /// Delete a file
    fn delete(&mut self, path: &str) -> Result<(), FsError>;

    /// Open a file
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Self::File, FsError>;

    /// Read from an open file
    ///
    /// # Returns
    /// The number of bytes read; zero at end of file.
    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Write to an open file
    ///
    /// # Returns
    /// The number of bytes written.
    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, FsError>;

    /// Flush and close a file
    fn close(&mut self, file: Self::File) -> Result<(), FsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_geometry() {
        let volume = Volume {
            port: 1,
            offset: 32,
            page_size: 32,
            total_size: 8192,
        };
        assert_eq!(volume.fs_size(), 8160);
        assert_eq!(volume.block_count(), 255);
    }

    #[test]
    fn test_zero_page_size() {
        let volume = Volume {
            port: 1,
            offset: 0,
            page_size: 0,
            total_size: 64,
        };
        assert_eq!(volume.block_count(), 0);
    }
}
