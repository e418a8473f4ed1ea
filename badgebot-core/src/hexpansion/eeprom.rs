//! Hexpansion EEPROM access
//!
//! The accessory EEPROM is an I2C serial memory at a fixed address with
//! 1- or 2-byte memory addressing. Writes must not cross a page boundary,
//! and after each page write the device NACKs its address until the
//! internal write cycle has finished, so every page write is followed by
//! acknowledgement polling.

use badgebot_hal::I2cBus;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, NoAcknowledgeSource};
use heapless::Vec;

/// I2C address of the hexpansion EEPROM
pub const EEPROM_ADDRESS: u8 = 0x50;

/// Maximum acknowledgement polls after a page write
pub const ACK_POLL_MAX_ATTEMPTS: u32 = 100;

/// Sleep between acknowledgement polls
pub const ACK_POLL_INTERVAL_US: u32 = 1000;

/// Largest page size supported for writes
pub const MAX_PAGE_SIZE: usize = 256;

/// Memory address width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressWidth {
    /// Single byte (devices up to 256 bytes)
    One,
    /// Two bytes, big-endian
    Two,
}

impl AddressWidth {
    fn len(self) -> usize {
        match self {
            AddressWidth::One => 1,
            AddressWidth::Two => 2,
        }
    }
}

/// Errors from EEPROM transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Nothing acknowledged the device address
    NoDevice,
    /// Device NACKed a data byte
    Nack,
    /// Bus fault (arbitration loss, overrun, ...)
    Bus,
    /// Device never acknowledged after a write cycle
    AckTimeout,
    /// Transfer does not fit the page or address width
    OutOfRange,
}

impl BusError {
    /// Classify an `embedded-hal` I2C error
    pub fn from_i2c<E: embedded_hal::i2c::Error>(err: &E) -> Self {
        match err.kind() {
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data) => BusError::Nack,
            ErrorKind::NoAcknowledge(_) => BusError::NoDevice,
            _ => BusError::Bus,
        }
    }
}

/// EEPROM on a single hexpansion port bus
pub struct Eeprom<'a, B: I2cBus> {
    bus: &'a mut B,
    address: u8,
    width: AddressWidth,
}

impl<'a, B: I2cBus> Eeprom<'a, B> {
    /// EEPROM at the default address with 2-byte addressing
    pub fn new(bus: &'a mut B) -> Self {
        Self {
            bus,
            address: EEPROM_ADDRESS,
            width: AddressWidth::Two,
        }
    }

    /// Override the memory address width
    pub fn with_address_width(mut self, width: AddressWidth) -> Self {
        self.width = width;
        self
    }

    fn memory_address(&self, offset: u32) -> Result<Vec<u8, 2>, BusError> {
        let mut out = Vec::new();
        match self.width {
            AddressWidth::One => {
                let byte = u8::try_from(offset).map_err(|_| BusError::OutOfRange)?;
                out.push(byte).map_err(|_| BusError::OutOfRange)?;
            }
            AddressWidth::Two => {
                let word = u16::try_from(offset).map_err(|_| BusError::OutOfRange)?;
                out.extend_from_slice(&word.to_be_bytes())
                    .map_err(|_| BusError::OutOfRange)?;
            }
        }
        Ok(out)
    }

    /// Read `buf.len()` bytes starting at `offset`
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), BusError> {
        let address = self.memory_address(offset)?;
        self.bus
            .write_read(self.address, &address, buf)
            .map_err(|e| BusError::from_i2c(&e))
    }

    /// Start a write that lies within a single page
    ///
    /// Does not wait for the write cycle; follow with
    /// [`Eeprom::wait_for_ack`].
    pub fn write_page(&mut self, offset: u32, data: &[u8]) -> Result<(), BusError> {
        let mut frame: Vec<u8, { MAX_PAGE_SIZE + 2 }> = Vec::new();
        frame
            .extend_from_slice(&self.memory_address(offset)?)
            .map_err(|_| BusError::OutOfRange)?;
        frame
            .extend_from_slice(data)
            .map_err(|_| BusError::OutOfRange)?;
        self.bus
            .write(self.address, &frame)
            .map_err(|e| BusError::from_i2c(&e))
    }

    /// Poll until the device acknowledges its address again
    ///
    /// # Returns
    /// The number of polls it took.
    pub fn wait_for_ack<D: DelayNs>(&mut self, delay: &mut D) -> Result<u32, BusError> {
        for attempt in 1..=ACK_POLL_MAX_ATTEMPTS {
            match self.bus.write(self.address, &[]) {
                Ok(()) => return Ok(attempt),
                Err(e) => match BusError::from_i2c(&e) {
                    BusError::NoDevice | BusError::Nack => delay.delay_us(ACK_POLL_INTERVAL_US),
                    other => return Err(other),
                },
            }
        }
        Err(BusError::AckTimeout)
    }

    /// Write `data` starting at `offset`, splitting at page boundaries
    ///
    /// Each page write is followed by acknowledgement polling.
    pub fn write<D: DelayNs>(
        &mut self,
        offset: u32,
        data: &[u8],
        page_size: u32,
        delay: &mut D,
    ) -> Result<(), BusError> {
        if page_size == 0 || page_size as usize > MAX_PAGE_SIZE {
            return Err(BusError::OutOfRange);
        }
        let mut offset = offset;
        let mut rest = data;
        while !rest.is_empty() {
            let room = (page_size - offset % page_size) as usize;
            let (chunk, tail) = rest.split_at(room.min(rest.len()));
            self.write_page(offset, chunk)?;
            self.wait_for_ack(delay)?;
            offset += chunk.len() as u32;
            rest = tail;
        }
        Ok(())
    }
}
