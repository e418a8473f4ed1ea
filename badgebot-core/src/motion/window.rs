//! Scroll window over the program listing
//!
//! The listing itself is never trimmed; the window only decides which
//! rows are visible. By default it follows the newest rows, and the user
//! can scroll back towards the start.

use core::ops::Range;

/// Rows that fit on screen
pub const VISIBLE_ROWS: usize = 5;

/// Visible slice of a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScrollWindow {
    /// Rows scrolled back from the newest position (0 follows the end)
    back: usize,
}

impl ScrollWindow {
    pub fn new() -> Self {
        Self::default()
    }

    fn follow_start(total: usize) -> usize {
        total.saturating_sub(VISIBLE_ROWS)
    }

    /// Scroll towards the start of the listing
    pub fn scroll_up(&mut self, total: usize) {
        self.back = (self.back + 1).min(Self::follow_start(total));
    }

    /// Scroll towards the end of the listing
    pub fn scroll_down(&mut self, total: usize) {
        self.back = self.back.saturating_sub(1).min(Self::follow_start(total));
    }

    /// Go back to following the newest rows
    pub fn reset(&mut self) {
        self.back = 0;
    }

    /// Rows to draw for a listing of `total` rows
    pub fn visible(&self, total: usize) -> Range<usize> {
        let start = Self::follow_start(total).saturating_sub(self.back);
        start..(start + VISIBLE_ROWS).min(total)
    }
}
