//! I2C bus abstractions
//!
//! Every hexpansion port exposes its own I2C bus. [`I2cBus`] is the minimal
//! master interface the manager needs and is implemented for anything that
//! implements the `embedded-hal` I2C trait. [`PortBus`] maps port numbers to
//! those buses.

/// Number of hexpansion ports on the badge (numbered `1..=NUM_PORTS`)
pub const NUM_PORTS: u8 = 6;

/// I2C bus master
///
/// Provides basic I2C read/write operations for communicating with
/// peripheral devices.
pub trait I2cBus {
    /// Error type for I2C operations
    type Error: embedded_hal::i2c::Error;

    /// Write data to a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `data` - Bytes to write
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `buf` - Buffer to read into
    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read in a single transaction (repeated start)
    ///
    /// This is commonly used to write a memory address then read data.
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `write_data` - Bytes to write (typically memory address)
    /// * `read_buf` - Buffer to read into
    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error>;
}

impl<T: embedded_hal::i2c::I2c> I2cBus for T {
    type Error = T::Error;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        embedded_hal::i2c::I2c::write(self, address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        embedded_hal::i2c::I2c::read(self, address, buf)
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        embedded_hal::i2c::I2c::write_read(self, address, write_data, read_buf)
    }
}

/// Access to the per-port hexpansion buses
pub trait PortBus {
    /// Bus type shared by all ports
    type Bus: I2cBus;

    /// Get the bus for a port
    ///
    /// Returns `None` for port numbers outside `1..=NUM_PORTS`. An empty
    /// port still has a bus; transfers on it simply fail with a NACK.
    fn port(&mut self, port: u8) -> Option<&mut Self::Bus>;
}

/// Check that a port number is in `1..=NUM_PORTS`
pub fn is_valid_port(port: u8) -> bool {
    (1..=NUM_PORTS).contains(&port)
}
