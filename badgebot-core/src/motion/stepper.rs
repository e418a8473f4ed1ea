//! Stepper state shared with the step timer
//!
//! The step timer runs outside the cooperative loop. Each field has a
//! single writer: the foreground sets `target`, `speed_hz` and `enabled`;
//! the timer owns `position`, `phase` and its elapsed-time accumulator.

use portable_atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU8, Ordering};

/// Number of half-step phases
pub const PHASES: u8 = 8;

/// Stepper state shared between foreground and timer
#[derive(Debug)]
pub struct StepperCell {
    target: AtomicI32,
    speed_hz: AtomicU32,
    enabled: AtomicBool,
    position: AtomicI32,
    phase: AtomicU8,
    elapsed_us: AtomicU32,
}

impl Default for StepperCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StepperCell {
    pub const fn new() -> Self {
        Self {
            target: AtomicI32::new(0),
            speed_hz: AtomicU32::new(0),
            enabled: AtomicBool::new(false),
            position: AtomicI32::new(0),
            phase: AtomicU8::new(0),
            elapsed_us: AtomicU32::new(0),
        }
    }

    /// Set the target position in steps
    pub fn set_target(&self, target: i32) {
        self.target.store(target, Ordering::Release);
    }

    pub fn target(&self) -> i32 {
        self.target.load(Ordering::Acquire)
    }

    /// Set the step rate
    pub fn set_speed(&self, hz: u32) {
        self.speed_hz.store(hz, Ordering::Release);
    }

    pub fn speed(&self) -> u32 {
        self.speed_hz.load(Ordering::Acquire)
    }

    /// Start or stop stepping
    pub fn enable(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Current position in steps
    pub fn position(&self) -> i32 {
        self.position.load(Ordering::Acquire)
    }

    /// Last applied phase
    pub fn phase(&self) -> u8 {
        self.phase.load(Ordering::Acquire)
    }

    /// Whether the motor still has steps to take
    pub fn is_moving(&self) -> bool {
        self.is_enabled() && self.position() != self.target()
    }

    /// Timer callback
    ///
    /// Takes one step toward the target when a step interval has elapsed.
    ///
    /// # Returns
    /// The phase to energise, or `None` if no step is due.
    pub fn on_timer(&self, elapsed_us: u32) -> Option<u8> {
        let speed = self.speed_hz.load(Ordering::Acquire);
        let position = self.position.load(Ordering::Relaxed);
        let target = self.target.load(Ordering::Acquire);
        if !self.enabled.load(Ordering::Acquire) || speed == 0 || position == target {
            self.elapsed_us.store(0, Ordering::Relaxed);
            return None;
        }

        let interval = 1_000_000 / speed;
        let elapsed = self.elapsed_us.load(Ordering::Relaxed).saturating_add(elapsed_us);
        if elapsed < interval {
            self.elapsed_us.store(elapsed, Ordering::Relaxed);
            return None;
        }
        // At most one step per call; drop any further backlog
        self.elapsed_us
            .store((elapsed - interval).min(interval), Ordering::Relaxed);

        let forward = target > position;
        let phase = self.phase.load(Ordering::Relaxed);
        let phase = if forward {
            (phase + 1) % PHASES
        } else {
            (phase + PHASES - 1) % PHASES
        };
        self.position
            .store(if forward { position + 1 } else { position - 1 }, Ordering::Release);
        self.phase.store(phase, Ordering::Release);
        Some(phase)
    }
}
