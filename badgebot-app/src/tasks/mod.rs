//! Async tasks
//!
//! The badge runtime owns the executor; these are plain futures it spawns
//! next to the foreground loop. They share the controller through a
//! blocking mutex and stop when the app's shutdown flag is raised.

pub mod background;
pub mod stepper;

pub use background::background_task;
pub use stepper::{on_step_timer, stepper_task, STEP_TIMER_PERIOD_US};

use badgebot_core::traits::AccessoryDirectory;
use badgebot_hal::{Filesystem, PortBus, SettingsStore};
use embedded_hal::delay::DelayNs;

use crate::controller::Controller;

/// Work the tasks hand to whoever owns the outputs
pub trait BackgroundWork {
    /// Run one background step; returns the period to sleep in ms
    fn background_tick(&mut self, delta_ms: u32) -> u32;

    /// Step timer expiry; returns `true` if a step was taken
    fn step_timer(&mut self, elapsed_us: u32) -> bool;
}

impl<P, F, D, A, S> BackgroundWork for Controller<'_, P, F, D, A, S>
where
    P: PortBus,
    F: Filesystem,
    D: DelayNs,
    A: AccessoryDirectory,
    S: SettingsStore,
{
    fn background_tick(&mut self, delta_ms: u32) -> u32 {
        Controller::background_tick(self, delta_ms)
    }

    fn step_timer(&mut self, elapsed_us: u32) -> bool {
        Controller::step_timer(self, elapsed_us)
    }
}
