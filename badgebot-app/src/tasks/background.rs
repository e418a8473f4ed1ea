//! Background task
//!
//! Runs playback at 10 ms while the robot is moving and idles at 50 ms
//! otherwise. The controller picks the period; the task sleeps and measures
//! how long it actually slept, so a late wakeup reaches playback as a
//! longer delta.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use portable_atomic::{AtomicBool, Ordering};

use super::BackgroundWork;

/// Milliseconds since `since`, saturating
fn elapsed_ms(since: Instant) -> u32 {
    u32::try_from(since.elapsed().as_millis()).unwrap_or(u32::MAX)
}

/// Background loop
///
/// Each tick gets the wall-clock time since the previous one.
///
/// # Returns
/// The number of ticks run.
pub async fn background_task<M, W, D>(
    work: &Mutex<M, RefCell<W>>,
    delay: &mut D,
    shutdown: &AtomicBool,
) -> u32
where
    M: RawMutex,
    W: BackgroundWork,
    D: DelayNs,
{
    info!("Background task started");

    let mut ticks: u32 = 0;
    let mut last = Instant::now();
    let mut delta_ms = 0;
    while !shutdown.load(Ordering::Acquire) {
        let period_ms = work.lock(|w| w.borrow_mut().background_tick(delta_ms));
        ticks = ticks.wrapping_add(1);
        delay.delay_ms(period_ms).await;

        let now = Instant::now();
        delta_ms = elapsed_ms(last);
        last = now;
    }

    info!("Background task stopped after {} ticks", ticks);
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_time::{Duration, MockDriver};

    /// Records each delta and asks for a fixed period
    struct Recorder {
        deltas: std::vec::Vec<u32>,
        period_ms: u32,
    }

    impl BackgroundWork for Recorder {
        fn background_tick(&mut self, delta_ms: u32) -> u32 {
            self.deltas.push(delta_ms);
            self.period_ms
        }

        fn step_timer(&mut self, _elapsed_us: u32) -> bool {
            false
        }
    }

    /// Delay that moves the mock clock, oversleeping by a fixed amount per
    /// call, and raises the shutdown flag after a number of sleeps
    struct StopAfter<'a> {
        remaining: u32,
        late_ms: std::vec::Vec<u32>,
        slept_ms: std::vec::Vec<u32>,
        shutdown: &'a AtomicBool,
    }

    impl DelayNs for StopAfter<'_> {
        async fn delay_ns(&mut self, ns: u32) {
            self.delay_us(ns / 1000).await;
        }

        async fn delay_us(&mut self, us: u32) {
            self.delay_ms(us / 1000).await;
        }

        async fn delay_ms(&mut self, ms: u32) {
            let late = if self.late_ms.is_empty() {
                0
            } else {
                self.late_ms.remove(0)
            };
            MockDriver::get().advance(Duration::from_millis(u64::from(ms + late)));
            self.slept_ms.push(ms);
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 {
                self.shutdown.store(true, Ordering::Release);
            }
        }
    }

    #[test]
    fn test_passes_measured_delta() {
        let shutdown = AtomicBool::new(false);
        let work: Mutex<NoopRawMutex, _> = Mutex::new(RefCell::new(Recorder {
            deltas: std::vec::Vec::new(),
            period_ms: 10,
        }));
        let mut delay = StopAfter {
            remaining: 4,
            late_ms: std::vec![0, 25, 0],
            slept_ms: std::vec::Vec::new(),
            shutdown: &shutdown,
        };

        let ticks = block_on(background_task(&work, &mut delay, &shutdown));
        assert_eq!(ticks, 4);
        assert_eq!(delay.slept_ms, [10, 10, 10, 10]);
        // The second sleep overran by 25 ms
        work.lock(|w| assert_eq!(w.borrow().deltas, [0, 10, 35, 10]));
    }

    #[test]
    fn test_already_shut_down() {
        let shutdown = AtomicBool::new(true);
        let work: Mutex<NoopRawMutex, _> = Mutex::new(RefCell::new(Recorder {
            deltas: std::vec::Vec::new(),
            period_ms: 50,
        }));
        let mut delay = StopAfter {
            remaining: 1,
            late_ms: std::vec::Vec::new(),
            slept_ms: std::vec::Vec::new(),
            shutdown: &shutdown,
        };

        assert_eq!(block_on(background_task(&work, &mut delay, &shutdown)), 0);
        assert!(delay.slept_ms.is_empty());
        work.lock(|w| assert!(w.borrow().deltas.is_empty()));
    }
}
