//! Hardware context for the lifecycle handlers

use badgebot_hal::{Filesystem, PortBus};
use embedded_hal::delay::DelayNs;

use crate::hexpansion::Provisioner;

/// Everything the lifecycle needs from the badge
pub struct Hardware<P, F, D, A> {
    /// Hexpansion port buses
    pub buses: P,
    /// Filesystem driver for accessory storage
    pub fs: F,
    /// Blocking delay for acknowledgement polling
    pub delay: D,
    /// Running companion drivers
    pub accessories: A,
    /// Companion firmware image
    pub firmware: &'static [u8],
}

impl<P, F, D, A> Hardware<P, F, D, A>
where
    P: PortBus,
    F: Filesystem,
    D: DelayNs,
{
    /// Provisioner over this hardware
    pub fn provisioner(&mut self) -> Provisioner<'_, P, F, D> {
        Provisioner::new(&mut self.buses, &mut self.fs, &mut self.delay, self.firmware)
    }
}
