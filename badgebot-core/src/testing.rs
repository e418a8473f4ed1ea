//! In-memory hardware doubles for host tests
//!
//! Enabled for this crate's own tests and, through the `testing` feature,
//! for downstream crates.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use badgebot_hal::{
    Button, Buttons, FsError, Filesystem, OpenMode, PortBus, SettingValue, SettingsError,
    SettingsStore, Volume, NUM_PORTS,
};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, ErrorType, NoAcknowledgeSource, Operation};

use crate::hexpansion::catalog::AccessoryType;
use crate::hexpansion::eeprom::EEPROM_ADDRESS;
use crate::hexpansion::ExpansionHeader;
use crate::lifecycle::CURRENT_VERSION;
use crate::traits::{AccessoryDirectory, AccessoryDriver, AccessoryError, MotorPowers};

/// I2C error raised by [`MockEeprom`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockI2cError(ErrorKind);

impl i2c::Error for MockI2cError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

const ADDRESS_NACK: MockI2cError =
    MockI2cError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
const DATA_NACK: MockI2cError = MockI2cError(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));

/// 24xx-style EEPROM with two-byte addressing
///
/// Writes wrap inside their page like the real part. After each write the
/// chip ignores its address for a configurable number of transactions.
#[derive(Debug, Clone)]
pub struct MockEeprom {
    memory: Vec<u8>,
    page_size: usize,
    present: bool,
    pointer: usize,
    write_cycle_polls: u32,
    busy: u32,
    read_only: bool,
    drop_writes: bool,
    page_writes: usize,
}

impl MockEeprom {
    /// Chip of `size` bytes filled with zeroes
    pub fn new(size: usize, page_size: usize) -> Self {
        Self {
            memory: vec![0; size],
            page_size: page_size.max(1),
            present: true,
            pointer: 0,
            write_cycle_polls: 0,
            busy: 0,
            read_only: false,
            drop_writes: false,
            page_writes: 0,
        }
    }

    /// Nothing on the bus
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new(0, 1)
        }
    }

    /// Erased 8 KiB chip
    pub fn blank() -> Self {
        let mut chip = Self::new(8192, 32);
        chip.memory.fill(0xFF);
        chip
    }

    /// Erased chip carrying the header for `kind`
    pub fn provisioned(kind: &AccessoryType) -> Self {
        match kind.provisioning_header(0) {
            Ok(header) => Self::with_header(&header),
            Err(_) => Self::blank(),
        }
    }

    /// Erased chip carrying `header`
    pub fn with_header(header: &ExpansionHeader) -> Self {
        let mut chip = Self::blank();
        let encoded = header.encode();
        chip.memory[..encoded.len()].copy_from_slice(&encoded);
        chip
    }

    /// Number of transactions the chip ignores after each write
    pub fn set_write_cycle_polls(&mut self, polls: u32) {
        self.write_cycle_polls = polls;
    }

    /// NACK every data write
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Acknowledge writes without storing them
    pub fn set_drop_writes(&mut self, drop_writes: bool) {
        self.drop_writes = drop_writes;
    }

    /// Number of accepted writes that carried data
    pub fn page_writes(&self) -> usize {
        self.page_writes
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn store(&mut self, data: &[u8]) {
        if self.memory.is_empty() {
            return;
        }
        let base = self.pointer - self.pointer % self.page_size;
        let mut column = self.pointer % self.page_size;
        for byte in data {
            if let Some(cell) = self.memory.get_mut(base + column) {
                *cell = *byte;
            }
            column = (column + 1) % self.page_size;
        }
    }

    fn load(&mut self, buf: &mut [u8]) {
        let size = self.memory.len();
        for byte in buf.iter_mut() {
            *byte = if size == 0 { 0xFF } else { self.memory[self.pointer % size] };
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

impl ErrorType for MockEeprom {
    type Error = MockI2cError;
}

impl i2c::I2c for MockEeprom {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if !self.present || address != EEPROM_ADDRESS {
            return Err(ADDRESS_NACK);
        }
        if self.busy > 0 {
            self.busy -= 1;
            return Err(ADDRESS_NACK);
        }

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let (address_bytes, payload) = bytes.split_at(bytes.len().min(2));
                    match address_bytes {
                        [hi, lo] => self.pointer = usize::from(u16::from_be_bytes([*hi, *lo])),
                        [byte] => self.pointer = usize::from(*byte),
                        _ => {}
                    }
                    if !self.memory.is_empty() {
                        self.pointer %= self.memory.len();
                    }
                    if payload.is_empty() {
                        continue;
                    }
                    if self.read_only {
                        return Err(DATA_NACK);
                    }
                    if !self.drop_writes {
                        self.store(payload);
                    }
                    self.page_writes += 1;
                    self.busy = self.write_cycle_polls;
                }
                Operation::Read(buf) => self.load(buf),
            }
        }
        Ok(())
    }
}

/// Six hexpansion ports, each holding a [`MockEeprom`]
#[derive(Debug, Clone)]
pub struct MockPorts {
    chips: Vec<MockEeprom>,
}

impl Default for MockPorts {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPorts {
    /// All ports empty
    pub fn new() -> Self {
        Self {
            chips: (0..NUM_PORTS).map(|_| MockEeprom::absent()).collect(),
        }
    }

    fn index(port: u8) -> Option<usize> {
        badgebot_hal::i2c::is_valid_port(port).then(|| usize::from(port - 1))
    }

    /// Plug a chip into a port
    pub fn insert(&mut self, port: u8, chip: MockEeprom) {
        if let Some(i) = Self::index(port) {
            self.chips[i] = chip;
        }
    }

    /// Unplug a port
    pub fn remove(&mut self, port: u8) -> Option<MockEeprom> {
        let i = Self::index(port)?;
        let chip = core::mem::replace(&mut self.chips[i], MockEeprom::absent());
        chip.present.then_some(chip)
    }

    /// Chip plugged into a port
    pub fn chip(&self, port: u8) -> Option<&MockEeprom> {
        self.chips.get(Self::index(port)?).filter(|c| c.present)
    }

    pub fn chip_mut(&mut self, port: u8) -> Option<&mut MockEeprom> {
        self.chips.get_mut(Self::index(port)?).filter(|c| c.present)
    }
}

impl PortBus for MockPorts {
    type Bus = MockEeprom;

    fn port(&mut self, port: u8) -> Option<&mut MockEeprom> {
        self.chips.get_mut(Self::index(port)?)
    }
}

/// Filesystem operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    Format,
    Mount,
    Unmount,
    Delete,
    Open,
    Read,
    Write,
    Close,
}

/// Open file in a [`MockFs`]
#[derive(Debug)]
pub struct MockFile {
    path: String,
    mode: OpenMode,
    data: Vec<u8>,
    cursor: usize,
}

/// Flat in-memory filesystem keyed by full path
#[derive(Debug, Default)]
pub struct MockFs {
    formatted: Vec<Volume>,
    mounts: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
    failing: Vec<FsOp>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail with [`FsError::Io`]
    pub fn fail_on(&mut self, op: FsOp) {
        self.failing.push(op);
    }

    /// Volumes formatted so far
    pub fn formatted(&self) -> &[Volume] {
        &self.formatted
    }

    pub fn is_mounted(&self, path: &str) -> bool {
        self.mounts.iter().any(|m| m == path)
    }

    /// Mark a path mounted without a volume
    pub fn premount(&mut self, path: &str) {
        if !self.is_mounted(path) {
            self.mounts.push(path.to_string());
        }
    }

    /// Contents of a closed file
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, data)| data.as_slice())
    }

    pub fn put_file(&mut self, path: &str, data: &[u8]) {
        self.files.retain(|(p, _)| p != path);
        self.files.push((path.to_string(), data.to_vec()));
    }

    fn check(&self, op: FsOp) -> Result<(), FsError> {
        if self.failing.contains(&op) {
            Err(FsError::Io)
        } else {
            Ok(())
        }
    }

    fn on_mounted_volume(&self, path: &str) -> Result<(), FsError> {
        let mounted = self.mounts.iter().any(|m| {
            path.strip_prefix(m.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
        });
        if mounted {
            Ok(())
        } else {
            Err(FsError::NotMounted)
        }
    }
}

impl Filesystem for MockFs {
    type File = MockFile;

    fn format(&mut self, volume: &Volume) -> Result<(), FsError> {
        self.check(FsOp::Format)?;
        self.formatted.push(*volume);
        Ok(())
    }

    fn mount(&mut self, _volume: &Volume, path: &str) -> Result<(), FsError> {
        self.check(FsOp::Mount)?;
        if self.is_mounted(path) {
            return Err(FsError::AlreadyMounted);
        }
        self.mounts.push(path.to_string());
        Ok(())
    }

    fn unmount(&mut self, path: &str) -> Result<(), FsError> {
        self.check(FsOp::Unmount)?;
        let before = self.mounts.len();
        self.mounts.retain(|m| m != path);
        if self.mounts.len() == before {
            Err(FsError::NotMounted)
        } else {
            Ok(())
        }
    }

    fn delete(&mut self, path: &str) -> Result<(), FsError> {
        self.check(FsOp::Delete)?;
        self.on_mounted_volume(path)?;
        let before = self.files.len();
        self.files.retain(|(p, _)| p != path);
        if self.files.len() == before {
            Err(FsError::NotFound)
        } else {
            Ok(())
        }
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Result<MockFile, FsError> {
        self.check(FsOp::Open)?;
        self.on_mounted_volume(path)?;
        let data = match mode {
            OpenMode::Read => self.file(path).ok_or(FsError::NotFound)?.to_vec(),
            OpenMode::Write => Vec::new(),
        };
        Ok(MockFile {
            path: path.to_string(),
            mode,
            data,
            cursor: 0,
        })
    }

    fn read(&mut self, file: &mut MockFile, buf: &mut [u8]) -> Result<usize, FsError> {
        self.check(FsOp::Read)?;
        let rest = file.data.get(file.cursor..).unwrap_or(&[]);
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        file.cursor += n;
        Ok(n)
    }

    fn write(&mut self, file: &mut MockFile, data: &[u8]) -> Result<usize, FsError> {
        self.check(FsOp::Write)?;
        if file.mode != OpenMode::Write {
            return Err(FsError::Io);
        }
        file.data.extend_from_slice(data);
        Ok(data.len())
    }

    fn close(&mut self, file: MockFile) -> Result<(), FsError> {
        self.check(FsOp::Close)?;
        if file.mode == OpenMode::Write {
            self.put_file(&file.path, &file.data);
        }
        Ok(())
    }
}

/// Delay that records instead of sleeping
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: u64,
}

impl MockDelay {
    pub fn total_us(&self) -> u64 {
        self.total_ns / 1000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns += u64::from(us) * 1000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}

/// Companion driver that records every request
#[derive(Debug, Clone)]
pub struct MockDriver {
    version: u16,
    fail_version: bool,
    status: bool,
    fail_outputs: bool,
    powered: bool,
    power_requests: Vec<bool>,
    motors: Vec<MotorPowers>,
    servos: [Option<i16>; 4],
    centres: [i16; 4],
    frequencies: Vec<(u32, Option<u8>)>,
    steps: Vec<u8>,
    releases: usize,
}

impl MockDriver {
    pub fn new(version: u16) -> Self {
        Self {
            version,
            fail_version: false,
            status: true,
            fail_outputs: false,
            powered: false,
            power_requests: Vec::new(),
            motors: Vec::new(),
            servos: [None; 4],
            centres: [0; 4],
            frequencies: Vec::new(),
            steps: Vec::new(),
            releases: 0,
        }
    }

    pub fn set_version(&mut self, version: u16) {
        self.version = version;
    }

    pub fn fail_version(&mut self, fail: bool) {
        self.fail_version = fail;
    }

    pub fn set_status(&mut self, status: bool) {
        self.status = status;
    }

    /// Make every output request fail
    pub fn fail_outputs(&mut self, fail: bool) {
        self.fail_outputs = fail;
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Every `set_power` argument, in order
    pub fn power_requests(&self) -> &[bool] {
        &self.power_requests
    }

    /// Every `set_motors` argument, in order
    pub fn motor_history(&self) -> &[MotorPowers] {
        &self.motors
    }

    /// Last motor powers applied
    pub fn last_motors(&self) -> MotorPowers {
        self.motors.last().copied().unwrap_or_default()
    }

    pub fn servo(&self, channel: u8) -> Option<i16> {
        self.servos.get(usize::from(channel)).copied().flatten()
    }

    pub fn centre(&self, channel: u8) -> i16 {
        self.centres.get(usize::from(channel)).copied().unwrap_or(0)
    }

    pub fn frequencies(&self) -> &[(u32, Option<u8>)] {
        &self.frequencies
    }

    /// Every stepper phase applied, in order
    pub fn steps(&self) -> &[u8] {
        &self.steps
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    fn output(&self) -> Result<(), AccessoryError> {
        if self.fail_outputs {
            Err(AccessoryError::Output)
        } else {
            Ok(())
        }
    }
}

impl AccessoryDriver for MockDriver {
    fn version(&self) -> Result<u16, AccessoryError> {
        if self.fail_version {
            Err(AccessoryError::NotResponding)
        } else {
            Ok(self.version)
        }
    }

    fn status(&self) -> bool {
        self.status
    }

    fn set_power(&mut self, on: bool) -> Result<(), AccessoryError> {
        self.output()?;
        self.power_requests.push(on);
        self.powered = on;
        Ok(())
    }

    fn set_motors(&mut self, powers: MotorPowers) -> Result<(), AccessoryError> {
        self.output()?;
        self.motors.push(powers);
        Ok(())
    }

    fn set_servo_position(
        &mut self,
        channel: u8,
        position: Option<i16>,
    ) -> Result<(), AccessoryError> {
        self.output()?;
        let slot = self
            .servos
            .get_mut(usize::from(channel))
            .ok_or(AccessoryError::InvalidChannel)?;
        *slot = position;
        Ok(())
    }

    fn set_servo_centre(&mut self, centre: i16, channel: u8) -> Result<(), AccessoryError> {
        self.output()?;
        let slot = self
            .centres
            .get_mut(usize::from(channel))
            .ok_or(AccessoryError::InvalidChannel)?;
        *slot = centre;
        Ok(())
    }

    fn set_frequency(&mut self, hz: u32, channel: Option<u8>) -> Result<(), AccessoryError> {
        self.output()?;
        self.frequencies.push((hz, channel));
        Ok(())
    }

    fn motor_step(&mut self, phase: u8) -> Result<(), AccessoryError> {
        self.output()?;
        self.steps.push(phase);
        Ok(())
    }

    fn motor_release(&mut self) -> Result<(), AccessoryError> {
        self.output()?;
        self.releases += 1;
        Ok(())
    }
}

/// Per-port set of [`MockDriver`]s
///
/// Relaunching a port brings its driver up to [`CURRENT_VERSION`].
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    drivers: Vec<(u8, MockDriver)>,
    relaunched: Vec<u8>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a companion on a port
    pub fn insert(&mut self, port: u8, driver: MockDriver) {
        self.drivers.retain(|(p, _)| *p != port);
        self.drivers.push((port, driver));
    }

    /// Stop the companion on a port
    pub fn remove(&mut self, port: u8) -> Option<MockDriver> {
        let i = self.drivers.iter().position(|(p, _)| *p == port)?;
        Some(self.drivers.remove(i).1)
    }

    pub fn get(&self, port: u8) -> Option<&MockDriver> {
        self.drivers.iter().find(|(p, _)| *p == port).map(|(_, d)| d)
    }

    /// Ports relaunched so far
    pub fn relaunched(&self) -> &[u8] {
        &self.relaunched
    }
}

impl AccessoryDirectory for MockDirectory {
    type Driver = MockDriver;

    fn driver(&mut self, port: u8) -> Option<&mut MockDriver> {
        self.drivers
            .iter_mut()
            .find(|(p, _)| *p == port)
            .map(|(_, d)| d)
    }

    fn relaunch(&mut self, port: u8) {
        self.relaunched.push(port);
        if let Some(driver) = self.driver(port) {
            driver.set_version(CURRENT_VERSION);
        }
    }
}

/// Settings store backed by a vector
#[derive(Debug, Clone, Default)]
pub struct MockSettings {
    values: Vec<(String, SettingValue)>,
    saves: usize,
    fail_saves: bool,
}

impl MockSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: SettingValue) {
        self.values.retain(|(k, _)| k != key);
        self.values.push((key.to_string(), value));
    }

    /// Number of successful saves
    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }
}

impl SettingsStore for MockSettings {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    fn set(&mut self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        self.insert(key, value);
        Ok(())
    }

    fn save(&mut self) -> Result<(), SettingsError> {
        if self.fail_saves {
            return Err(SettingsError::Storage);
        }
        self.saves += 1;
        Ok(())
    }
}

/// Latched buttons driven by the test
#[derive(Debug, Clone, Default)]
pub struct MockButtons {
    pressed: Vec<Button>,
    clears: usize,
}

impl MockButtons {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, button: Button) {
        if !self.pressed.contains(&button) {
            self.pressed.push(button);
        }
    }

    pub fn release(&mut self, button: Button) {
        self.pressed.retain(|b| *b != button);
    }

    /// Number of times the latch was cleared
    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl Buttons for MockButtons {
    fn is_pressed(&self, button: Button) -> bool {
        self.pressed.contains(&button)
    }

    fn clear(&mut self) {
        self.pressed.clear();
        self.clears += 1;
    }
}
