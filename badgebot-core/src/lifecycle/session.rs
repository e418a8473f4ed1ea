//! Hexpansion session
//!
//! Owns the port registry and the ports each lifecycle state refers to,
//! and runs the handler for the current state once per frame. Handlers
//! read the input snapshot and hardware, then return the event that drives
//! the state machine.

use badgebot_hal::{Button, ButtonSet, Filesystem, PortBus};
use embedded_hal::delay::DelayNs;

use super::events::Event;
use super::hardware::Hardware;
use super::machine::{ErrorKind, Notice, State};
use crate::hexpansion::catalog::{catalog_entry, AccessoryType};
use crate::hexpansion::{Classification, PortRegistry, PortSet, ProvisionError};
use crate::traits::{AccessoryDirectory, AccessoryDriver};

/// Companion firmware version this manager ships
pub const CURRENT_VERSION: u16 = 2;

/// How long to wait for a present HexDrive's companion to start
pub const COMPANION_TIMEOUT_MS: u32 = 5000;

/// Period of the warning/logo alternation
pub const DISPLAY_ROTATION_MS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingCompanion {
    port: u8,
    waited_ms: u32,
}

/// Session state shared by all lifecycle handlers
#[derive(Debug, Clone)]
pub struct HexpansionSession {
    state: State,
    registry: PortRegistry,
    detected_port: Option<u8>,
    detected_type: usize,
    upgrade_port: Option<u8>,
    auto_upgrade: bool,
    erase_port: Option<u8>,
    pending: Option<PendingCompanion>,
    active_port: Option<u8>,
    /// Ports the user declined to provision or upgrade, until reinserted
    declined: PortSet,
    state_ms: u32,
    last_error: Option<ProvisionError>,
}

impl Default for HexpansionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl HexpansionSession {
    pub fn new() -> Self {
        Self {
            state: State::Init,
            registry: PortRegistry::new(),
            detected_port: None,
            detected_type: 0,
            upgrade_port: None,
            auto_upgrade: false,
            erase_port: None,
            pending: None,
            active_port: None,
            declined: PortSet::EMPTY,
            state_ms: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    pub fn active_port(&self) -> Option<u8> {
        self.active_port
    }

    /// Variant of the active HexDrive
    pub fn active_accessory(&self) -> Option<&'static AccessoryType> {
        self.registry.accessory(self.active_port?).map(|a| a.kind)
    }

    /// Driver of the active HexDrive
    pub fn active_driver<'h, A: AccessoryDirectory>(
        &self,
        accessories: &'h mut A,
    ) -> Option<&'h mut A::Driver> {
        accessories.driver(self.active_port?)
    }

    /// Port the provisioning prompt refers to
    pub fn detected_port(&self) -> Option<u8> {
        self.detected_port
    }

    /// Variant currently chosen in the provisioning prompt
    pub fn detected_type(&self) -> &'static AccessoryType {
        catalog_entry(self.detected_type as isize)
    }

    pub fn upgrade_port(&self) -> Option<u8> {
        self.upgrade_port
    }

    pub fn erase_port(&self) -> Option<u8> {
        self.erase_port
    }

    /// Failure behind the most recent error screen
    pub fn last_error(&self) -> Option<ProvisionError> {
        self.last_error
    }

    /// Time spent in the current state
    pub fn state_elapsed_ms(&self) -> u32 {
        self.state_ms
    }

    /// Feed an event to the state machine
    pub fn apply(&mut self, event: Event) -> State {
        let next = self.state.transition(event);
        if next != self.state {
            debug!("{:?} --{:?}--> {:?}", self.state, event, next);
            self.state = next;
            self.state_ms = 0;
        }
        next
    }

    /// Scan all ports and leave [`State::Init`]
    pub fn start<P: PortBus>(&mut self, buses: &mut P, show_warning: bool) -> State {
        self.registry.scan_all_ports(buses);
        self.apply(if show_warning {
            Event::ShowWarning
        } else {
            Event::StartChecking
        })
    }

    /// Handle a hexpansion insertion
    pub fn on_insertion<P: PortBus>(&mut self, buses: &mut P, port: u8) -> Classification {
        self.declined.remove(port);
        let class = self.registry.classify_port(buses, port);
        self.apply(Event::AccessoriesChanged);
        class
    }

    /// Handle a hexpansion removal
    ///
    /// # Returns
    /// `true` if the active HexDrive was removed.
    pub fn on_removal(&mut self, port: u8) -> bool {
        self.registry.remove_port(port);
        self.declined.remove(port);
        if self.pending.is_some_and(|p| p.port == port) {
            self.pending = None;
        }

        if self.active_port == Some(port) {
            warn!("port {}: active HexDrive removed", port);
            self.active_port = None;
            self.apply(Event::ActiveRemoved);
            return true;
        }

        let mut invalidated = false;
        if self.detected_port == Some(port) {
            self.detected_port = None;
            invalidated = true;
        }
        if self.upgrade_port == Some(port) {
            self.upgrade_port = None;
            self.auto_upgrade = false;
            invalidated = true;
        }
        if self.erase_port == Some(port) {
            self.erase_port = None;
            invalidated = true;
        }
        self.apply(if invalidated {
            Event::PortInvalidated
        } else {
            Event::AccessoriesChanged
        });
        false
    }

    /// Queue an erase of the active HexDrive
    ///
    /// Deactivates it and returns to [`State::Check`], which then prompts.
    pub fn request_erase(&mut self) -> bool {
        match (self.state, self.active_port) {
            (State::Menu, Some(port)) => {
                self.erase_port = Some(port);
                self.active_port = None;
                self.apply(Event::EraseRequested);
                true
            }
            _ => false,
        }
    }

    /// Run one frame of the current lifecycle state
    ///
    /// Ready states only get the active-port check here; their screens are
    /// driven by the app.
    ///
    /// # Returns
    /// The event that was applied, if any.
    pub fn update<P, F, D, A>(
        &mut self,
        hw: &mut Hardware<P, F, D, A>,
        input: ButtonSet,
        delta_ms: u32,
    ) -> Option<Event>
    where
        P: PortBus,
        F: Filesystem,
        D: DelayNs,
        A: AccessoryDirectory,
    {
        self.state_ms = self.state_ms.saturating_add(delta_ms);

        if let Some(port) = self.active_port {
            if !self.registry.up_to_date_ports().contains(port) {
                warn!("port {}: active HexDrive no longer up to date", port);
                self.active_port = None;
                self.apply(Event::ActiveRemoved);
                return Some(Event::ActiveRemoved);
            }
        }

        let event = match self.state {
            State::Init => None,
            State::Warning | State::Logo => self.idle_screen(input),
            State::Check => self.check(hw, delta_ms),
            State::Detected => self.detected(input),
            State::Upgrade => self.upgrade(input),
            State::Erase => self.erase(hw, input),
            State::Programming => Some(self.programming(hw)),
            State::Removed | State::Error(_) | State::Message(_) => acknowledge(input),
            _ => None,
        };
        if let Some(event) = event {
            self.apply(event);
        }
        event
    }

    fn idle_screen(&mut self, input: ButtonSet) -> Option<Event> {
        if input.contains(Button::Confirm) {
            Some(Event::UserConfirm)
        } else if self.state_ms >= DISPLAY_ROTATION_MS {
            Some(Event::DisplayTimeout)
        } else {
            None
        }
    }

    fn check<P, F, D, A>(&mut self, hw: &mut Hardware<P, F, D, A>, delta_ms: u32) -> Option<Event>
    where
        A: AccessoryDirectory,
    {
        if self.erase_port.is_some() {
            return Some(Event::EraseRequested);
        }

        if let Some(port) = self.registry.blank_ports().difference(self.declined).first() {
            info!("port {}: blank EEPROM", port);
            self.detected_port = Some(port);
            self.detected_type = 0;
            return Some(Event::BlankFound);
        }

        while let Some(port) = self.registry.present_ports().difference(self.declined).first() {
            let version = match hw.accessories.driver(port) {
                Some(driver) => {
                    self.pending = None;
                    driver.version().unwrap_or_else(|_err| {
                        warn!("port {}: version query failed ({:?})", port, _err);
                        0
                    })
                }
                None => {
                    let waited = match self.pending {
                        Some(p) if p.port == port => p.waited_ms.saturating_add(delta_ms),
                        _ => delta_ms,
                    };
                    if waited < COMPANION_TIMEOUT_MS {
                        self.pending = Some(PendingCompanion {
                            port,
                            waited_ms: waited,
                        });
                        return None;
                    }
                    warn!("port {}: companion did not start, assuming version 0", port);
                    self.pending = None;
                    0
                }
            };

            if version == CURRENT_VERSION {
                info!("port {}: companion version {} is current", port, version);
                self.registry.mark_up_to_date(port);
                continue;
            }
            info!(
                "port {}: companion version {}, want {}",
                port, version, CURRENT_VERSION
            );
            self.upgrade_port = Some(port);
            self.auto_upgrade = false;
            return Some(Event::UpgradeNeeded);
        }

        let candidate = self
            .active_port
            .or_else(|| self.registry.up_to_date_ports().difference(self.declined).first());
        let Some(port) = candidate else {
            return Some(Event::NothingFound);
        };

        if hw.accessories.driver(port).is_some_and(|d| !d.status()) {
            error!("port {}: companion failed to set up its outputs", port);
            self.declined.insert(port);
            self.active_port = None;
            return Some(Event::ErrorDetected(ErrorKind::AccessoryFault));
        }
        info!("port {}: HexDrive ready", port);
        self.active_port = Some(port);
        Some(Event::AccessoryReady)
    }

    fn detected(&mut self, input: ButtonSet) -> Option<Event> {
        let port = self.detected_port?;
        if input.contains(Button::Confirm) {
            Some(Event::UserConfirm)
        } else if input.contains(Button::Cancel) {
            self.declined.insert(port);
            self.detected_port = None;
            Some(Event::UserCancel)
        } else {
            if input.contains(Button::Left) {
                self.detected_type = catalog_entry(self.detected_type as isize - 1).index();
            } else if input.contains(Button::Right) {
                self.detected_type = catalog_entry(self.detected_type as isize + 1).index();
            }
            None
        }
    }

    fn upgrade(&mut self, input: ButtonSet) -> Option<Event> {
        let port = self.upgrade_port?;
        if self.auto_upgrade || input.contains(Button::Confirm) {
            self.auto_upgrade = false;
            Some(Event::UserConfirm)
        } else if input.contains(Button::Cancel) {
            self.declined.insert(port);
            self.upgrade_port = None;
            Some(Event::UserCancel)
        } else {
            None
        }
    }

    fn erase<P, F, D, A>(&mut self, hw: &mut Hardware<P, F, D, A>, input: ButtonSet) -> Option<Event>
    where
        P: PortBus,
        F: Filesystem,
        D: DelayNs,
    {
        let port = self.erase_port?;
        if input.contains(Button::Cancel) {
            self.erase_port = None;
            return Some(Event::UserCancel);
        }
        if !input.contains(Button::Confirm) {
            return None;
        }

        self.erase_port = None;
        match hw.provisioner().erase_storage(port) {
            Ok(_) => {
                self.registry.remove_port(port);
                Some(Event::Completed(Notice::Erased))
            }
            Err(err) => {
                warn!("port {}: erase failed at {:?}: {:?}", port, err.step(), err);
                self.last_error = Some(err);
                Some(Event::ErrorDetected(ErrorKind::EraseFailed))
            }
        }
    }

    fn programming<P, F, D, A>(&mut self, hw: &mut Hardware<P, F, D, A>) -> Event
    where
        P: PortBus,
        F: Filesystem,
        D: DelayNs,
        A: AccessoryDirectory,
    {
        if let Some(port) = self.detected_port.take() {
            let kind = self.detected_type();
            return match hw.provisioner().format_and_initialize(port, kind) {
                Ok(_) => {
                    self.registry.classify_port(&mut hw.buses, port);
                    self.upgrade_port = Some(port);
                    self.auto_upgrade = true;
                    Event::Provisioned
                }
                Err(err) => {
                    warn!("port {}: provisioning failed at {:?}: {:?}", port, err.step(), err);
                    self.last_error = Some(err);
                    Event::ErrorDetected(ErrorKind::ProvisionFailed)
                }
            };
        }

        let Some(port) = self.upgrade_port.take() else {
            return Event::PortInvalidated;
        };
        self.auto_upgrade = false;
        match hw.provisioner().refresh_firmware_image(port) {
            Ok(()) => {
                hw.accessories.relaunch(port);
                self.pending = None;
                Event::Completed(Notice::Upgraded)
            }
            Err(err) => {
                warn!("port {}: upgrade failed at {:?}: {:?}", port, err.step(), err);
                self.last_error = Some(err);
                Event::ErrorDetected(ErrorKind::UpgradeFailed)
            }
        }
    }
}

fn acknowledge(input: ButtonSet) -> Option<Event> {
    if input.contains(Button::Confirm) {
        Some(Event::UserConfirm)
    } else if input.contains(Button::Cancel) {
        Some(Event::UserCancel)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexpansion::catalog::CATALOG;
    use crate::hexpansion::{PortStatus, ProvisionStep};
    use crate::testing::{MockDelay, MockDirectory, MockDriver, MockEeprom, MockFs, MockPorts};

    static FIRMWARE: [u8; 96] = [0xA5; 96];

    type Rig = Hardware<MockPorts, MockFs, MockDelay, MockDirectory>;

    fn rig() -> Rig {
        Hardware {
            buses: MockPorts::new(),
            fs: MockFs::new(),
            delay: MockDelay::default(),
            accessories: MockDirectory::new(),
            firmware: &FIRMWARE,
        }
    }

    fn press(button: Button) -> ButtonSet {
        ButtonSet::only(button)
    }

    /// Run frames with no input until the state stops changing
    fn settle(session: &mut HexpansionSession, hw: &mut Rig) -> alloc::vec::Vec<State> {
        let mut seen = alloc::vec![session.state()];
        for _ in 0..20 {
            session.update(hw, ButtonSet::NONE, 10);
            if seen.last() != Some(&session.state()) {
                seen.push(session.state());
            }
        }
        seen
    }

    #[test]
    fn test_current_version_skips_upgrade() {
        let mut hw = rig();
        hw.buses.insert(1, MockEeprom::provisioned(&CATALOG[0]));
        hw.accessories.insert(1, MockDriver::new(CURRENT_VERSION));

        let mut session = HexpansionSession::new();
        assert_eq!(session.start(&mut hw.buses, false), State::Check);
        let seen = settle(&mut session, &mut hw);

        assert!(!seen.contains(&State::Upgrade));
        assert_eq!(session.state(), State::Menu);
        assert_eq!(session.active_port(), Some(1));
        assert!(matches!(session.registry().status(1), PortStatus::UpToDate(_)));
        assert_eq!(session.active_accessory(), Some(&CATALOG[0]));
    }

    #[test]
    fn test_warning_then_insert() {
        let mut hw = rig();
        let mut session = HexpansionSession::new();
        assert_eq!(session.start(&mut hw.buses, true), State::Warning);

        hw.buses.insert(2, MockEeprom::provisioned(&CATALOG[0]));
        hw.accessories.insert(2, MockDriver::new(CURRENT_VERSION));
        session.on_insertion(&mut hw.buses, 2);
        assert_eq!(session.state(), State::Check);
        settle(&mut session, &mut hw);
        assert_eq!(session.state(), State::Menu);
    }

    #[test]
    fn test_warning_logo_rotation() {
        let mut hw = rig();
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, true);
        session.update(&mut hw, ButtonSet::NONE, DISPLAY_ROTATION_MS - 1);
        assert_eq!(session.state(), State::Warning);
        session.update(&mut hw, ButtonSet::NONE, 1);
        assert_eq!(session.state(), State::Logo);
        session.update(&mut hw, ButtonSet::NONE, DISPLAY_ROTATION_MS);
        assert_eq!(session.state(), State::Warning);
    }

    #[test]
    fn test_nothing_attached_goes_to_warning() {
        let mut hw = rig();
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Warning);
    }

    #[test]
    fn test_provision_blank_port() {
        let mut hw = rig();
        hw.buses.insert(3, MockEeprom::blank());
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);

        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Detected);
        assert_eq!(session.detected_port(), Some(3));

        session.update(&mut hw, press(Button::Right), 10);
        session.update(&mut hw, press(Button::Right), 10);
        session.update(&mut hw, press(Button::Left), 10);
        assert_eq!(session.detected_type(), &CATALOG[1]);

        session.update(&mut hw, press(Button::Confirm), 10);
        assert_eq!(session.state(), State::Programming);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Upgrade);
        assert!(matches!(
            session.registry().status(3),
            PortStatus::Present(a) if a.kind == &CATALOG[1]
        ));

        // Upgrade is confirmed automatically after provisioning
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Programming);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Message(Notice::Upgraded));
        assert_eq!(hw.fs.file("/hexpansion_3/app.mpy"), Some(&FIRMWARE[..]));
        assert_eq!(hw.accessories.relaunched(), &[3]);
    }

    #[test]
    fn test_declined_blank_port_is_skipped() {
        let mut hw = rig();
        hw.buses.insert(1, MockEeprom::blank());
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        session.update(&mut hw, press(Button::Cancel), 10);
        assert_eq!(session.state(), State::Check);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Warning);

        // Reinsertion asks again
        session.on_insertion(&mut hw.buses, 1);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Detected);
    }

    #[test]
    fn test_provision_failure_shows_error() {
        let mut hw = rig();
        let mut chip = MockEeprom::blank();
        chip.set_read_only(true);
        hw.buses.insert(1, chip);
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        session.update(&mut hw, press(Button::Confirm), 10);
        session.update(&mut hw, ButtonSet::NONE, 10);

        assert_eq!(session.state(), State::Error(ErrorKind::ProvisionFailed));
        assert_eq!(
            session.last_error().map(|e| e.step()),
            Some(ProvisionStep::WriteHeader)
        );
        session.update(&mut hw, press(Button::Confirm), 10);
        assert_eq!(session.state(), State::Check);
    }

    #[test]
    fn test_outdated_companion_needs_upgrade() {
        let mut hw = rig();
        hw.buses.insert(1, MockEeprom::provisioned(&CATALOG[0]));
        hw.accessories.insert(1, MockDriver::new(CURRENT_VERSION - 1));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Upgrade);
        assert_eq!(session.upgrade_port(), Some(1));

        session.update(&mut hw, press(Button::Cancel), 10);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Warning);
    }

    #[test]
    fn test_version_query_failure_needs_upgrade() {
        let mut hw = rig();
        hw.buses.insert(1, MockEeprom::provisioned(&CATALOG[0]));
        let mut driver = MockDriver::new(CURRENT_VERSION);
        driver.fail_version(true);
        hw.accessories.insert(1, driver);
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Upgrade);
    }

    #[test]
    fn test_companion_timeout() {
        let mut hw = rig();
        hw.buses.insert(4, MockEeprom::provisioned(&CATALOG[0]));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);

        for _ in 0..4 {
            session.update(&mut hw, ButtonSet::NONE, 1000);
            assert_eq!(session.state(), State::Check);
        }
        // The first frame counts toward the wait
        session.update(&mut hw, ButtonSet::NONE, 1000);
        assert_eq!(session.state(), State::Upgrade);
    }

    #[test]
    fn test_companion_timeout_after_one_long_frame() {
        let mut hw = rig();
        hw.buses.insert(4, MockEeprom::provisioned(&CATALOG[0]));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, COMPANION_TIMEOUT_MS);
        assert_eq!(session.state(), State::Upgrade);
    }

    #[test]
    fn test_companion_arrives_before_timeout() {
        let mut hw = rig();
        hw.buses.insert(4, MockEeprom::provisioned(&CATALOG[0]));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 1000);
        session.update(&mut hw, ButtonSet::NONE, 1000);
        hw.accessories.insert(4, MockDriver::new(CURRENT_VERSION));
        session.update(&mut hw, ButtonSet::NONE, 1000);
        assert_eq!(session.state(), State::Menu);
    }

    #[test]
    fn test_upgrade_then_relaunch() {
        let mut hw = rig();
        hw.buses.insert(1, MockEeprom::provisioned(&CATALOG[0]));
        hw.accessories.insert(1, MockDriver::new(1));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        session.update(&mut hw, press(Button::Confirm), 10);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Message(Notice::Upgraded));

        // The relaunched companion reports the new version
        session.update(&mut hw, press(Button::Confirm), 10);
        settle(&mut session, &mut hw);
        assert_eq!(session.state(), State::Menu);
    }

    #[test]
    fn test_upgrade_failure() {
        let mut hw = rig();
        hw.buses.insert(1, MockEeprom::provisioned(&CATALOG[0]));
        hw.accessories.insert(1, MockDriver::new(1));
        hw.fs.fail_on(crate::testing::FsOp::Open);
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        session.update(&mut hw, press(Button::Confirm), 10);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Error(ErrorKind::UpgradeFailed));
    }

    #[test]
    fn test_lowest_present_port_first() {
        let mut hw = rig();
        hw.buses.insert(5, MockEeprom::provisioned(&CATALOG[0]));
        hw.buses.insert(2, MockEeprom::provisioned(&CATALOG[2]));
        hw.accessories.insert(5, MockDriver::new(0));
        hw.accessories.insert(2, MockDriver::new(0));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.upgrade_port(), Some(2));
    }

    #[test]
    fn test_blank_before_present() {
        let mut hw = rig();
        hw.buses.insert(1, MockEeprom::provisioned(&CATALOG[0]));
        hw.buses.insert(6, MockEeprom::blank());
        hw.accessories.insert(1, MockDriver::new(0));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Detected);
        assert_eq!(session.detected_port(), Some(6));
    }

    #[test]
    fn test_active_removed() {
        let mut hw = rig();
        hw.buses.insert(1, MockEeprom::provisioned(&CATALOG[0]));
        hw.accessories.insert(1, MockDriver::new(CURRENT_VERSION));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        settle(&mut session, &mut hw);
        session.apply(Event::SelectMotorMoves);

        hw.buses.remove(1);
        hw.accessories.remove(1);
        assert!(session.on_removal(1));
        assert_eq!(session.state(), State::Removed);
        assert_eq!(session.active_port(), None);

        session.update(&mut hw, press(Button::Confirm), 10);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Warning);
    }

    #[test]
    fn test_detected_port_removed() {
        let mut hw = rig();
        hw.buses.insert(2, MockEeprom::blank());
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Detected);

        hw.buses.remove(2);
        assert!(!session.on_removal(2));
        assert_eq!(session.state(), State::Check);
        assert_eq!(session.detected_port(), None);
    }

    #[test]
    fn test_erase_from_menu() {
        let mut hw = rig();
        hw.buses.insert(5, MockEeprom::provisioned(&CATALOG[0]));
        hw.accessories.insert(5, MockDriver::new(CURRENT_VERSION));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        settle(&mut session, &mut hw);

        assert!(session.request_erase());
        assert_eq!(session.state(), State::Check);
        assert_eq!(session.active_port(), None);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Erase);

        session.update(&mut hw, press(Button::Confirm), 10);
        assert_eq!(session.state(), State::Message(Notice::Erased));
        assert_eq!(hw.buses.chip(5).map(|c| c.page_writes()), Some(256));
        assert_eq!(session.registry().status(5), &PortStatus::Empty);
    }

    #[test]
    fn test_erase_cancelled() {
        let mut hw = rig();
        hw.buses.insert(5, MockEeprom::provisioned(&CATALOG[0]));
        hw.accessories.insert(5, MockDriver::new(CURRENT_VERSION));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        settle(&mut session, &mut hw);
        session.request_erase();
        session.update(&mut hw, ButtonSet::NONE, 10);
        session.update(&mut hw, press(Button::Cancel), 10);
        assert_eq!(session.state(), State::Check);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Menu);
        assert_eq!(hw.buses.chip(5).map(|c| c.page_writes()), Some(0));
    }

    #[test]
    fn test_erase_failure() {
        let mut hw = rig();
        hw.buses.insert(5, MockEeprom::provisioned(&CATALOG[0]));
        hw.accessories.insert(5, MockDriver::new(CURRENT_VERSION));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        settle(&mut session, &mut hw);
        session.request_erase();
        session.update(&mut hw, ButtonSet::NONE, 10);
        if let Some(chip) = hw.buses.chip_mut(5) {
            chip.set_read_only(true);
        }
        session.update(&mut hw, press(Button::Confirm), 10);
        assert_eq!(session.state(), State::Error(ErrorKind::EraseFailed));
    }

    #[test]
    fn test_accessory_fault() {
        let mut hw = rig();
        hw.buses.insert(1, MockEeprom::provisioned(&CATALOG[0]));
        let mut driver = MockDriver::new(CURRENT_VERSION);
        driver.set_status(false);
        hw.accessories.insert(1, driver);
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Error(ErrorKind::AccessoryFault));

        session.update(&mut hw, press(Button::Confirm), 10);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Warning);
    }

    #[test]
    fn test_fault_on_active_port_is_not_repeated() {
        let mut hw = rig();
        hw.buses.insert(1, MockEeprom::provisioned(&CATALOG[0]));
        hw.accessories.insert(1, MockDriver::new(CURRENT_VERSION));
        let mut session = HexpansionSession::new();
        session.start(&mut hw.buses, false);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Menu);
        assert_eq!(session.active_port(), Some(1));

        // The companion fails while active and the app reports it
        if let Some(driver) = hw.accessories.driver(1) {
            driver.set_status(false);
        }
        session.apply(Event::ErrorDetected(ErrorKind::AccessoryFault));
        session.update(&mut hw, press(Button::Confirm), 10);
        assert_eq!(session.state(), State::Check);

        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Error(ErrorKind::AccessoryFault));
        assert_eq!(session.active_port(), None);

        session.update(&mut hw, press(Button::Confirm), 10);
        session.update(&mut hw, ButtonSet::NONE, 10);
        assert_eq!(session.state(), State::Warning);
    }

    #[test]
    fn test_request_erase_needs_menu() {
        let mut session = HexpansionSession::new();
        assert!(!session.request_erase());
    }
}
