//! Hexpansion port registry
//!
//! Tracks what is plugged into each port. A port is in exactly one of the
//! states below, so the blank and accessory sets can never overlap:
//!
//! ```text
//! Empty ──► Blank ──► Present ──► UpToDate
//!   ▲                                 │
//!   └────────── physical removal ─────┘
//! ```

use badgebot_hal::{i2c::is_valid_port, PortBus, NUM_PORTS};

use super::catalog::AccessoryType;
use super::eeprom::{BusError, Eeprom};
use super::header::{ExpansionHeader, HEADER_SIZE};

/// Result of reading a port's header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Classification {
    /// Nothing answered, or the header belongs to another product
    None,
    /// Storage answered but holds no valid header
    Blank,
    /// A HexDrive variant
    Accessory(&'static AccessoryType),
}

/// What the registry knows about a port
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortStatus {
    Empty,
    Blank,
    /// HexDrive present; companion firmware not yet confirmed current
    Present(Accessory),
    /// HexDrive whose companion reported the current version
    UpToDate(Accessory),
}

/// A detected HexDrive and the header it was identified by
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Accessory {
    pub kind: &'static AccessoryType,
    pub header: ExpansionHeader,
}

/// Set of port numbers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortSet(u8);

impl PortSet {
    pub const EMPTY: Self = Self(0);

    pub fn insert(&mut self, port: u8) {
        if is_valid_port(port) {
            self.0 |= 1 << (port - 1);
        }
    }

    pub fn remove(&mut self, port: u8) {
        if is_valid_port(port) {
            self.0 &= !(1 << (port - 1));
        }
    }

    pub fn contains(self, port: u8) -> bool {
        is_valid_port(port) && self.0 & (1 << (port - 1)) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Lowest port in the set
    pub fn first(self) -> Option<u8> {
        self.iter().next()
    }

    /// Ports in ascending order
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (1..=NUM_PORTS).filter(move |p| self.contains(*p))
    }

    /// Ports in `self` but not in `other`
    pub fn difference(self, other: PortSet) -> PortSet {
        Self(self.0 & !other.0)
    }
}

/// Per-port accessory state
#[derive(Debug, Clone)]
pub struct PortRegistry {
    ports: [PortStatus; NUM_PORTS as usize],
}

impl Default for PortRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PortRegistry {
    pub fn new() -> Self {
        Self {
            ports: core::array::from_fn(|_| PortStatus::Empty),
        }
    }

    fn slot(&self, port: u8) -> Option<&PortStatus> {
        if is_valid_port(port) {
            self.ports.get(usize::from(port - 1))
        } else {
            None
        }
    }

    fn slot_mut(&mut self, port: u8) -> Option<&mut PortStatus> {
        if is_valid_port(port) {
            self.ports.get_mut(usize::from(port - 1))
        } else {
            None
        }
    }

    /// Classify every port
    pub fn scan_all_ports<P: PortBus>(&mut self, buses: &mut P) {
        for port in 1..=NUM_PORTS {
            self.classify_port(buses, port);
        }
    }

    /// Read a port's header and update its status
    ///
    /// A port already known up to date keeps that status as long as it
    /// still reports the same header.
    pub fn classify_port<P: PortBus>(&mut self, buses: &mut P, port: u8) -> Classification {
        let read = match read_header(buses, port) {
            Ok(bytes) => bytes,
            Err(err) => {
                trace!("port {}: no response ({:?})", port, err);
                self.set_status(port, PortStatus::Empty);
                return Classification::None;
            }
        };

        let header = match ExpansionHeader::decode(&read) {
            Ok(header) => header,
            Err(err) => {
                debug!("port {}: blank storage ({:?})", port, err);
                self.set_status(port, PortStatus::Blank);
                return Classification::Blank;
            }
        };

        let Some(kind) = AccessoryType::from_header(&header) else {
            debug!(
                "port {}: foreign hexpansion {:x}:{:x}",
                port,
                header.vendor_id(),
                header.product_id()
            );
            self.set_status(port, PortStatus::Empty);
            return Classification::None;
        };

        let accessory = Accessory { kind, header };
        let next = match self.slot(port) {
            Some(PortStatus::UpToDate(known)) if *known == accessory => {
                PortStatus::UpToDate(accessory)
            }
            _ => PortStatus::Present(accessory),
        };
        self.set_status(port, next);
        Classification::Accessory(kind)
    }

    fn set_status(&mut self, port: u8, status: PortStatus) {
        if let Some(slot) = self.slot_mut(port) {
            if *slot != status {
                info!("port {}: {:?} -> {:?}", port, slot, status);
                *slot = status;
            }
        }
    }

    /// Forget a port after physical removal or erase
    ///
    /// # Returns
    /// The status the port had.
    pub fn remove_port(&mut self, port: u8) -> PortStatus {
        match self.slot_mut(port) {
            Some(slot) => core::mem::replace(slot, PortStatus::Empty),
            None => PortStatus::Empty,
        }
    }

    /// Promote a present accessory to up to date
    ///
    /// # Returns
    /// `true` if the port is now up to date.
    pub fn mark_up_to_date(&mut self, port: u8) -> bool {
        let Some(slot) = self.slot_mut(port) else {
            return false;
        };
        match slot {
            PortStatus::UpToDate(_) => true,
            PortStatus::Present(accessory) => {
                let promoted = accessory.clone();
                *slot = PortStatus::UpToDate(promoted);
                true
            }
            _ => false,
        }
    }

    /// Status of a port
    pub fn status(&self, port: u8) -> &PortStatus {
        self.slot(port).unwrap_or(&PortStatus::Empty)
    }

    /// Accessory on a port, present or up to date
    pub fn accessory(&self, port: u8) -> Option<&Accessory> {
        match self.slot(port)? {
            PortStatus::Present(a) | PortStatus::UpToDate(a) => Some(a),
            _ => None,
        }
    }

    fn collect(&self, pred: impl Fn(&PortStatus) -> bool) -> PortSet {
        let mut set = PortSet::EMPTY;
        for (i, status) in self.ports.iter().enumerate() {
            if pred(status) {
                set.insert(i as u8 + 1);
            }
        }
        set
    }

    /// Ports with blank storage
    pub fn blank_ports(&self) -> PortSet {
        self.collect(|s| matches!(s, PortStatus::Blank))
    }

    /// Ports with a HexDrive awaiting version confirmation
    pub fn present_ports(&self) -> PortSet {
        self.collect(|s| matches!(s, PortStatus::Present(_)))
    }

    /// Ports with a confirmed current HexDrive
    pub fn up_to_date_ports(&self) -> PortSet {
        self.collect(|s| matches!(s, PortStatus::UpToDate(_)))
    }

    /// Ports with any HexDrive
    pub fn accessory_ports(&self) -> PortSet {
        self.collect(|s| matches!(s, PortStatus::Present(_) | PortStatus::UpToDate(_)))
    }
}

/// Read the raw header block from a port
pub fn read_header<P: PortBus>(buses: &mut P, port: u8) -> Result<[u8; HEADER_SIZE], BusError> {
    let bus = buses.port(port).ok_or(BusError::NoDevice)?;
    let mut buf = [0u8; HEADER_SIZE];
    Eeprom::new(bus).read(0, &mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexpansion::catalog::CATALOG;
    use crate::testing::{MockEeprom, MockPorts};
    use proptest::prelude::*;

    fn ports_with(port: u8, chip: MockEeprom) -> MockPorts {
        let mut ports = MockPorts::new();
        ports.insert(port, chip);
        ports
    }

    #[test]
    fn test_empty_port_is_none() {
        let mut ports = MockPorts::new();
        let mut registry = PortRegistry::new();
        assert_eq!(registry.classify_port(&mut ports, 1), Classification::None);
        assert_eq!(registry.status(1), &PortStatus::Empty);
    }

    #[test]
    fn test_blank_eeprom() {
        let mut ports = ports_with(2, MockEeprom::blank());
        let mut registry = PortRegistry::new();
        assert_eq!(registry.classify_port(&mut ports, 2), Classification::Blank);
        assert!(registry.blank_ports().contains(2));
        assert!(registry.present_ports().is_empty());
    }

    #[test]
    fn test_hexdrive_detected() {
        let mut ports = ports_with(3, MockEeprom::provisioned(&CATALOG[0]));
        let mut registry = PortRegistry::new();
        assert_eq!(
            registry.classify_port(&mut ports, 3),
            Classification::Accessory(&CATALOG[0])
        );
        assert!(registry.present_ports().contains(3));
        assert_eq!(registry.accessory(3).map(|a| a.kind), Some(&CATALOG[0]));
    }

    #[test]
    fn test_foreign_header_is_none() {
        let header = ExpansionHeader::new("2024", 64, 32, 8192, 0x1234, 0x0001, 0, "Other").unwrap();
        let mut ports = ports_with(1, MockEeprom::with_header(&header));
        let mut registry = PortRegistry::new();
        assert_eq!(registry.classify_port(&mut ports, 1), Classification::None);
        assert_eq!(registry.status(1), &PortStatus::Empty);
    }

    #[test]
    fn test_rescan_keeps_up_to_date() {
        let mut ports = ports_with(1, MockEeprom::provisioned(&CATALOG[0]));
        let mut registry = PortRegistry::new();
        registry.classify_port(&mut ports, 1);
        assert!(registry.mark_up_to_date(1));
        registry.scan_all_ports(&mut ports);
        assert!(registry.up_to_date_ports().contains(1));
        assert!(registry.present_ports().is_empty());
    }

    #[test]
    fn test_mark_up_to_date_requires_accessory() {
        let mut ports = ports_with(1, MockEeprom::blank());
        let mut registry = PortRegistry::new();
        registry.classify_port(&mut ports, 1);
        assert!(!registry.mark_up_to_date(1));
        assert!(!registry.mark_up_to_date(9));
    }

    #[test]
    fn test_remove_purges() {
        let mut ports = ports_with(4, MockEeprom::provisioned(&CATALOG[2]));
        let mut registry = PortRegistry::new();
        registry.classify_port(&mut ports, 4);
        registry.mark_up_to_date(4);
        assert!(matches!(registry.remove_port(4), PortStatus::UpToDate(_)));
        assert!(registry.accessory_ports().is_empty());
        assert_eq!(registry.status(4), &PortStatus::Empty);
    }

    #[test]
    fn test_invalid_port_number() {
        let mut ports = MockPorts::new();
        let mut registry = PortRegistry::new();
        assert_eq!(registry.classify_port(&mut ports, 0), Classification::None);
        assert_eq!(registry.classify_port(&mut ports, 7), Classification::None);
        assert_eq!(registry.status(7), &PortStatus::Empty);
    }

    #[test]
    fn test_port_set_order() {
        let mut set = PortSet::EMPTY;
        set.insert(5);
        set.insert(2);
        set.insert(0);
        assert_eq!(set.len(), 2);
        assert_eq!(set.first(), Some(2));
        set.remove(2);
        assert_eq!(set.first(), Some(5));
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Insert(u8, u8),
        Remove(u8),
        Promote(u8),
        Rescan,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u8..=6, 0u8..3).prop_map(|(p, kind)| Op::Insert(p, kind)),
            (1u8..=6).prop_map(Op::Remove),
            (1u8..=6).prop_map(Op::Promote),
            Just(Op::Rescan),
        ]
    }

    proptest! {
        #[test]
        fn prop_port_sets_are_exclusive(ops in proptest::collection::vec(op(), 0..40)) {
            let mut ports = MockPorts::new();
            let mut registry = PortRegistry::new();
            for op in ops {
                match op {
                    Op::Insert(port, kind) => {
                        let chip = match kind {
                            0 => MockEeprom::blank(),
                            1 => MockEeprom::provisioned(&CATALOG[0]),
                            _ => MockEeprom::provisioned(&CATALOG[4]),
                        };
                        ports.insert(port, chip);
                        registry.classify_port(&mut ports, port);
                    }
                    Op::Remove(port) => {
                        ports.remove(port);
                        registry.remove_port(port);
                    }
                    Op::Promote(port) => {
                        registry.mark_up_to_date(port);
                    }
                    Op::Rescan => registry.scan_all_ports(&mut ports),
                }

                let sets = [
                    registry.blank_ports(),
                    registry.present_ports(),
                    registry.up_to_date_ports(),
                ];
                for port in 1..=NUM_PORTS {
                    let memberships = sets.iter().filter(|s| s.contains(port)).count();
                    prop_assert!(memberships <= 1, "port {} in {} sets", port, memberships);
                }
            }
        }
    }
}
