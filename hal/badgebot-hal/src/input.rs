//! Button input abstractions

/// Front-panel buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Button {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    Confirm = 4,
    Cancel = 5,
}

impl Button {
    /// All buttons in bit order
    pub const ALL: [Button; 6] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Confirm,
        Button::Cancel,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Latched button state provided by the badge runtime
///
/// A button reads as pressed from the moment it goes down until either it
/// is released or [`Buttons::clear`] is called.
pub trait Buttons {
    /// Check whether a button is pressed
    fn is_pressed(&self, button: Button) -> bool;

    /// Forget all latched presses
    fn clear(&mut self);
}

/// Snapshot of the pressed buttons for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonSet(u8);

impl ButtonSet {
    /// No buttons pressed
    pub const NONE: Self = Self(0);

    /// Capture the current state of a button source
    pub fn capture<B: Buttons + ?Sized>(buttons: &B) -> Self {
        Button::ALL
            .iter()
            .filter(|b| buttons.is_pressed(**b))
            .fold(Self::NONE, |set, b| set.with(*b))
    }

    /// Set with a single button pressed
    pub fn only(button: Button) -> Self {
        Self::NONE.with(button)
    }

    /// Copy of this set with `button` added
    pub fn with(self, button: Button) -> Self {
        Self(self.0 | button.bit())
    }

    /// Check whether a button is in the set
    pub fn contains(self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    /// Check whether nothing is pressed
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u8);

    impl Buttons for Fixed {
        fn is_pressed(&self, button: Button) -> bool {
            self.0 & button.bit() != 0
        }

        fn clear(&mut self) {
            self.0 = 0;
        }
    }

    #[test]
    fn test_capture() {
        let source = Fixed(Button::Up.bit() | Button::Cancel.bit());
        let set = ButtonSet::capture(&source);
        assert!(set.contains(Button::Up));
        assert!(set.contains(Button::Cancel));
        assert!(!set.contains(Button::Confirm));
    }

    #[test]
    fn test_clear_empties_capture() {
        let mut source = Fixed(Button::Left.bit());
        source.clear();
        assert!(ButtonSet::capture(&source).is_empty());
    }

    #[test]
    fn test_only() {
        let set = ButtonSet::only(Button::Right);
        assert!(set.contains(Button::Right));
        assert!(!set.contains(Button::Left));
        assert!(!set.is_empty());
    }
}
