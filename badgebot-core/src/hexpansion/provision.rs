//! EEPROM provisioning, firmware refresh and erase
//!
//! Each operation is a fixed sequence of bus and filesystem steps. The first
//! failing step aborts the operation and is named in the returned
//! [`ProvisionError`]; nothing already written is rolled back.

use core::fmt::Write as _;

use badgebot_hal::{FsError, Filesystem, OpenMode, PortBus, Volume};
use embedded_hal::delay::DelayNs;
use heapless::String;

use super::catalog::AccessoryType;
use super::eeprom::{BusError, Eeprom, MAX_PAGE_SIZE};
use super::header::{ExpansionHeader, HeaderError, HEADER_SIZE};
use super::registry::read_header;

/// Name of the companion firmware file on the accessory filesystem
pub const FIRMWARE_FILE: &str = "app.mpy";

/// Bytes copied per filesystem write
const COPY_CHUNK: usize = 64;

/// Mount point path for a port
pub type MountPath = String<16>;

/// Firmware file path for a port
pub type FirmwarePath = String<32>;

/// Step of a provisioning operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProvisionStep {
    ReadHeader,
    BuildHeader,
    WriteHeader,
    VerifyHeader,
    Format,
    Mount,
    Delete,
    Open,
    Copy,
    Close,
    Unmount,
    ErasePage,
}

/// Why a provisioning operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProvisionError {
    /// Bus transfer failed
    Bus(ProvisionStep, BusError),
    /// Filesystem call failed
    Fs(ProvisionStep, FsError),
    /// Header could not be built or parsed
    Header(ProvisionStep, HeaderError),
    /// Header read back differs from the one written
    VerifyMismatch,
}

impl ProvisionError {
    /// The step that failed
    pub fn step(&self) -> ProvisionStep {
        match self {
            ProvisionError::Bus(step, _)
            | ProvisionError::Fs(step, _)
            | ProvisionError::Header(step, _) => *step,
            ProvisionError::VerifyMismatch => ProvisionStep::VerifyHeader,
        }
    }
}

/// Mount point used for a port's filesystem
pub fn mount_path(port: u8) -> MountPath {
    let mut path = MountPath::new();
    // Fits: "/hexpansion_" plus one digit
    let _ = write!(path, "/hexpansion_{}", port);
    path
}

/// Path of the companion firmware on a port
pub fn firmware_path(port: u8) -> FirmwarePath {
    let mut path = FirmwarePath::new();
    let _ = write!(path, "{}/{}", mount_path(port), FIRMWARE_FILE);
    path
}

fn volume(port: u8, header: &ExpansionHeader) -> Volume {
    Volume {
        port,
        offset: u32::from(header.fs_offset()),
        page_size: u32::from(header.page_size()),
        total_size: header.total_size(),
    }
}

/// Runs provisioning operations against one set of port buses
pub struct Provisioner<'a, P, F, D> {
    buses: &'a mut P,
    fs: &'a mut F,
    delay: &'a mut D,
    firmware: &'a [u8],
}

impl<'a, P, F, D> Provisioner<'a, P, F, D>
where
    P: PortBus,
    F: Filesystem,
    D: DelayNs,
{
    /// # Arguments
    /// * `firmware` - Companion firmware image copied by
    ///   [`Provisioner::refresh_firmware_image`]
    pub fn new(buses: &'a mut P, fs: &'a mut F, delay: &'a mut D, firmware: &'a [u8]) -> Self {
        Self {
            buses,
            fs,
            delay,
            firmware,
        }
    }

    fn current_header(&mut self, port: u8) -> Result<ExpansionHeader, ProvisionError> {
        let bytes = read_header(self.buses, port)
            .map_err(|e| ProvisionError::Bus(ProvisionStep::ReadHeader, e))?;
        ExpansionHeader::decode(&bytes).map_err(|e| ProvisionError::Header(ProvisionStep::ReadHeader, e))
    }

    /// Mount a port's filesystem
    ///
    /// # Returns
    /// `true` if this call performed the mount, `false` if it was already
    /// mounted.
    fn mount(&mut self, port: u8, header: &ExpansionHeader) -> Result<bool, ProvisionError> {
        match self.fs.mount(&volume(port, header), &mount_path(port)) {
            Ok(()) => Ok(true),
            Err(FsError::AlreadyMounted) => Ok(false),
            Err(e) => Err(ProvisionError::Fs(ProvisionStep::Mount, e)),
        }
    }

    /// Write a fresh header to blank storage and create its filesystem
    ///
    /// Leaves the filesystem mounted.
    pub fn format_and_initialize(
        &mut self,
        port: u8,
        kind: &AccessoryType,
    ) -> Result<ExpansionHeader, ProvisionError> {
        let header = kind
            .provisioning_header(u32::from(port))
            .map_err(|e| ProvisionError::Header(ProvisionStep::BuildHeader, e))?;
        let encoded = header.encode();
        let page_size = u32::from(header.page_size());

        let mut readback = [0u8; HEADER_SIZE];
        {
            let delay = &mut *self.delay;
            let bus = self
                .buses
                .port(port)
                .ok_or(ProvisionError::Bus(ProvisionStep::WriteHeader, BusError::NoDevice))?;
            let mut eeprom = Eeprom::new(bus);
            eeprom
                .write(0, &encoded, page_size, delay)
                .map_err(|e| ProvisionError::Bus(ProvisionStep::WriteHeader, e))?;
            eeprom
                .read(0, &mut readback)
                .map_err(|e| ProvisionError::Bus(ProvisionStep::VerifyHeader, e))?;
        }
        if readback != encoded {
            return Err(ProvisionError::VerifyMismatch);
        }
        info!("port {}: header written for {}", port, kind.name);

        let volume = volume(port, &header);
        self.fs
            .format(&volume)
            .map_err(|e| ProvisionError::Fs(ProvisionStep::Format, e))?;
        self.mount(port, &header)?;
        info!("port {}: filesystem formatted and mounted", port);
        Ok(header)
    }

    /// Replace the companion firmware file with the current image
    ///
    /// Unmounts afterwards only if this call did the mount.
    pub fn refresh_firmware_image(&mut self, port: u8) -> Result<(), ProvisionError> {
        let header = self.current_header(port)?;
        let mounted_here = self.mount(port, &header)?;

        let result = self.copy_firmware(port);

        if mounted_here {
            let unmounted = self
                .fs
                .unmount(&mount_path(port))
                .map_err(|e| ProvisionError::Fs(ProvisionStep::Unmount, e));
            // A copy failure takes precedence over the unmount result
            result?;
            unmounted?;
        } else {
            result?;
        }
        info!("port {}: firmware refreshed ({} bytes)", port, self.firmware.len());
        Ok(())
    }

    fn copy_firmware(&mut self, port: u8) -> Result<(), ProvisionError> {
        let path = firmware_path(port);
        match self.fs.delete(&path) {
            Ok(()) | Err(FsError::NotFound) => {}
            Err(e) => return Err(ProvisionError::Fs(ProvisionStep::Delete, e)),
        }

        let mut file = self
            .fs
            .open(&path, OpenMode::Write)
            .map_err(|e| ProvisionError::Fs(ProvisionStep::Open, e))?;
        for chunk in self.firmware.chunks(COPY_CHUNK) {
            let mut rest = chunk;
            while !rest.is_empty() {
                match self.fs.write(&mut file, rest) {
                    Ok(0) => {
                        let _ = self.fs.close(file);
                        return Err(ProvisionError::Fs(ProvisionStep::Copy, FsError::NoSpace));
                    }
                    Ok(n) => rest = &rest[n.min(rest.len())..],
                    Err(e) => {
                        let _ = self.fs.close(file);
                        return Err(ProvisionError::Fs(ProvisionStep::Copy, e));
                    }
                }
            }
        }
        self.fs
            .close(file)
            .map_err(|e| ProvisionError::Fs(ProvisionStep::Close, e))
    }

    /// Overwrite every page of the storage with `0xFF`
    ///
    /// Unmounts the filesystem first if it is mounted.
    ///
    /// # Returns
    /// The number of pages written.
    pub fn erase_storage(&mut self, port: u8) -> Result<u32, ProvisionError> {
        let header = self.current_header(port)?;
        match self.fs.unmount(&mount_path(port)) {
            Ok(()) | Err(FsError::NotMounted) => {}
            Err(e) => return Err(ProvisionError::Fs(ProvisionStep::Unmount, e)),
        }

        let page_size = u32::from(header.page_size());
        if page_size as usize > MAX_PAGE_SIZE {
            return Err(ProvisionError::Bus(ProvisionStep::ErasePage, BusError::OutOfRange));
        }
        let blank = [0xFFu8; MAX_PAGE_SIZE];
        let page = &blank[..page_size as usize];
        let pages = header.page_count();

        let delay = &mut *self.delay;
        let bus = self
            .buses
            .port(port)
            .ok_or(ProvisionError::Bus(ProvisionStep::ErasePage, BusError::NoDevice))?;
        let mut eeprom = Eeprom::new(bus);
        for index in 0..pages {
            eeprom
                .write_page(index * page_size, page)
                .and_then(|()| eeprom.wait_for_ack(delay))
                .map_err(|e| {
                    warn!("port {}: erase failed at page {}", port, index);
                    ProvisionError::Bus(ProvisionStep::ErasePage, e)
                })?;
        }
        info!("port {}: erased {} pages", port, pages);
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexpansion::catalog::CATALOG;
    use crate::testing::{FsOp, MockDelay, MockEeprom, MockFs, MockPorts};

    const FIRMWARE: &[u8] = &[0x4D; 200];

    struct Rig {
        ports: MockPorts,
        fs: MockFs,
        delay: MockDelay,
    }

    impl Rig {
        fn with(port: u8, chip: MockEeprom) -> Self {
            let mut ports = MockPorts::new();
            ports.insert(port, chip);
            Self {
                ports,
                fs: MockFs::new(),
                delay: MockDelay::default(),
            }
        }

        fn provisioner(&mut self) -> Provisioner<'_, MockPorts, MockFs, MockDelay> {
            Provisioner::new(&mut self.ports, &mut self.fs, &mut self.delay, FIRMWARE)
        }
    }

    #[test]
    fn test_paths() {
        assert_eq!(mount_path(3).as_str(), "/hexpansion_3");
        assert_eq!(firmware_path(3).as_str(), "/hexpansion_3/app.mpy");
    }

    #[test]
    fn test_format_and_initialize() {
        let mut rig = Rig::with(2, MockEeprom::blank());
        let header = rig.provisioner().format_and_initialize(2, &CATALOG[0]).unwrap();

        let chip = rig.ports.chip(2).unwrap();
        assert_eq!(&chip.memory()[..HEADER_SIZE], &header.encode());
        assert_eq!(rig.fs.formatted().len(), 1);
        assert!(rig.fs.is_mounted("/hexpansion_2"));
    }

    #[test]
    fn test_format_write_failure() {
        let mut chip = MockEeprom::blank();
        chip.set_read_only(true);
        let mut rig = Rig::with(1, chip);
        let err = rig
            .provisioner()
            .format_and_initialize(1, &CATALOG[0])
            .unwrap_err();
        assert_eq!(err.step(), ProvisionStep::WriteHeader);
        assert!(rig.fs.formatted().is_empty());
    }

    #[test]
    fn test_format_ack_timeout() {
        let mut chip = MockEeprom::blank();
        chip.set_write_cycle_polls(u32::MAX);
        let mut rig = Rig::with(1, chip);
        assert_eq!(
            rig.provisioner().format_and_initialize(1, &CATALOG[0]),
            Err(ProvisionError::Bus(ProvisionStep::WriteHeader, BusError::AckTimeout))
        );
    }

    #[test]
    fn test_format_verify_mismatch() {
        let mut chip = MockEeprom::blank();
        chip.set_drop_writes(true);
        let mut rig = Rig::with(1, chip);
        assert_eq!(
            rig.provisioner().format_and_initialize(1, &CATALOG[0]),
            Err(ProvisionError::VerifyMismatch)
        );
    }

    #[test]
    fn test_format_fs_failure() {
        let mut rig = Rig::with(1, MockEeprom::blank());
        rig.fs.fail_on(FsOp::Format);
        let err = rig
            .provisioner()
            .format_and_initialize(1, &CATALOG[0])
            .unwrap_err();
        assert_eq!(err, ProvisionError::Fs(ProvisionStep::Format, FsError::Io));
    }

    #[test]
    fn test_refresh_mounts_and_unmounts() {
        let mut rig = Rig::with(1, MockEeprom::provisioned(&CATALOG[0]));
        rig.provisioner().refresh_firmware_image(1).unwrap();
        assert_eq!(rig.fs.file("/hexpansion_1/app.mpy"), Some(FIRMWARE));
        assert!(!rig.fs.is_mounted("/hexpansion_1"));
    }

    #[test]
    fn test_refresh_keeps_existing_mount() {
        let mut rig = Rig::with(1, MockEeprom::provisioned(&CATALOG[0]));
        rig.fs.premount("/hexpansion_1");
        rig.provisioner().refresh_firmware_image(1).unwrap();
        assert!(rig.fs.is_mounted("/hexpansion_1"));
    }

    #[test]
    fn test_refresh_replaces_old_image() {
        let mut rig = Rig::with(1, MockEeprom::provisioned(&CATALOG[0]));
        rig.fs.put_file("/hexpansion_1/app.mpy", b"old");
        rig.provisioner().refresh_firmware_image(1).unwrap();
        assert_eq!(rig.fs.file("/hexpansion_1/app.mpy"), Some(FIRMWARE));
    }

    #[test]
    fn test_refresh_copy_failure_still_unmounts() {
        let mut rig = Rig::with(1, MockEeprom::provisioned(&CATALOG[0]));
        rig.fs.fail_on(FsOp::Write);
        let err = rig.provisioner().refresh_firmware_image(1).unwrap_err();
        assert_eq!(err.step(), ProvisionStep::Copy);
        assert!(!rig.fs.is_mounted("/hexpansion_1"));
    }

    #[test]
    fn test_refresh_blank_storage() {
        let mut rig = Rig::with(1, MockEeprom::blank());
        let err = rig.provisioner().refresh_firmware_image(1).unwrap_err();
        assert_eq!(err.step(), ProvisionStep::ReadHeader);
    }

    #[test]
    fn test_erase_writes_every_page() {
        let mut rig = Rig::with(5, MockEeprom::provisioned(&CATALOG[0]));
        rig.fs.premount("/hexpansion_5");
        assert_eq!(rig.provisioner().erase_storage(5), Ok(256));

        let chip = rig.ports.chip(5).unwrap();
        assert_eq!(chip.page_writes(), 256);
        assert!(chip.memory().iter().all(|b| *b == 0xFF));
        assert!(!rig.fs.is_mounted("/hexpansion_5"));
    }

    #[test]
    fn test_erase_ack_timeout() {
        let mut chip = MockEeprom::provisioned(&CATALOG[0]);
        chip.set_write_cycle_polls(u32::MAX);
        let mut rig = Rig::with(5, chip);
        assert_eq!(
            rig.provisioner().erase_storage(5),
            Err(ProvisionError::Bus(ProvisionStep::ErasePage, BusError::AckTimeout))
        );
    }
}
