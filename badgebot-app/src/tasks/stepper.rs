//! Stepper timer
//!
//! Polls the shared [`StepperCell`] at a fixed period and energises the
//! next half-step phase on the active HexDrive when one is due.

use core::cell::RefCell;

use badgebot_core::motion::StepperCell;
use badgebot_core::traits::{AccessoryDriver, AccessoryError};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal_async::delay::DelayNs;
use portable_atomic::{AtomicBool, Ordering};

use super::BackgroundWork;

/// Timer period (fast enough for the top step rate)
pub const STEP_TIMER_PERIOD_US: u32 = 500;

/// One timer expiry
///
/// # Returns
/// `true` if a step was taken.
pub fn on_step_timer<D: AccessoryDriver + ?Sized>(
    cell: &StepperCell,
    driver: &mut D,
    elapsed_us: u32,
) -> Result<bool, AccessoryError> {
    match cell.on_timer(elapsed_us) {
        Some(phase) => {
            driver.motor_step(phase)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Step timer loop
pub async fn stepper_task<M, W, D>(work: &Mutex<M, RefCell<W>>, delay: &mut D, shutdown: &AtomicBool)
where
    M: RawMutex,
    W: BackgroundWork,
    D: DelayNs,
{
    info!("Stepper task started");

    while !shutdown.load(Ordering::Acquire) {
        work.lock(|w| w.borrow_mut().step_timer(STEP_TIMER_PERIOD_US));
        delay.delay_us(STEP_TIMER_PERIOD_US).await;
    }

    info!("Stepper task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use badgebot_core::testing::MockDriver;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_steps_toward_target() {
        let cell = StepperCell::new();
        let mut driver = MockDriver::new(2);
        cell.set_speed(1000);
        cell.set_target(-3);
        cell.enable(true);

        let mut taken = 0;
        for _ in 0..10 {
            if on_step_timer(&cell, &mut driver, 1000).unwrap() {
                taken += 1;
            }
        }
        assert_eq!(taken, 3);
        assert_eq!(cell.position(), -3);
        assert_eq!(driver.steps(), [7, 6, 5]);
    }

    #[test]
    fn test_driver_error_propagates() {
        let cell = StepperCell::new();
        let mut driver = MockDriver::new(2);
        driver.fail_outputs(true);
        cell.set_speed(1000);
        cell.set_target(1);
        cell.enable(true);
        assert_eq!(
            on_step_timer(&cell, &mut driver, 1000),
            Err(AccessoryError::Output)
        );
    }

    struct Counter<'a> {
        calls: u32,
        shutdown_after: u32,
        shutdown: &'a AtomicBool,
    }

    impl BackgroundWork for Counter<'_> {
        fn background_tick(&mut self, _delta_ms: u32) -> u32 {
            50
        }

        fn step_timer(&mut self, elapsed_us: u32) -> bool {
            assert_eq!(elapsed_us, STEP_TIMER_PERIOD_US);
            self.calls += 1;
            if self.calls == self.shutdown_after {
                self.shutdown.store(true, Ordering::Release);
            }
            true
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_task_polls_until_shutdown() {
        let shutdown = AtomicBool::new(false);
        let work: Mutex<NoopRawMutex, _> = Mutex::new(RefCell::new(Counter {
            calls: 0,
            shutdown_after: 7,
            shutdown: &shutdown,
        }));
        block_on(stepper_task(&work, &mut NoDelay, &shutdown));
        work.lock(|w| assert_eq!(w.borrow().calls, 7));
    }
}
