//! Events that trigger state transitions

use super::machine::{ErrorKind, Notice};

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    // Startup events
    /// Start with the safety warning
    ShowWarning,
    /// Start straight into port checking
    StartChecking,
    /// Warning/logo display period elapsed
    DisplayTimeout,

    // Port events
    /// A hexpansion was inserted or removed
    AccessoriesChanged,
    /// A port with blank storage needs provisioning
    BlankFound,
    /// A HexDrive's companion firmware is outdated
    UpgradeNeeded,
    /// An erase was requested for a port
    EraseRequested,
    /// An up-to-date HexDrive was activated
    AccessoryReady,
    /// No usable HexDrive is attached
    NothingFound,
    /// The active HexDrive went away
    ActiveRemoved,
    /// The port a prompt or operation refers to went away
    PortInvalidated,

    // Provisioning events
    /// Blank storage was formatted; firmware copy follows
    Provisioned,
    /// An operation finished with a message for the user
    Completed(Notice),

    // UI navigation events
    /// User confirmed
    UserConfirm,
    /// User cancelled or went back
    UserCancel,
    /// User chose motor moves from the menu
    SelectMotorMoves,
    /// User chose the servo test
    SelectServoTest,
    /// User chose the stepper test
    SelectStepperTest,
    /// User chose settings
    SelectSettings,

    // Program events
    /// Program finalized by a long CONFIRM press
    ProgramFinalized,
    /// Countdown before playback elapsed
    CountdownFinished,
    /// Playback consumed the whole program
    PlaybackFinished,

    // Fault events
    /// Error detected
    ErrorDetected(ErrorKind),
}

impl Event {
    /// Check if this event is user-initiated
    pub fn is_user_event(&self) -> bool {
        matches!(
            self,
            Event::UserConfirm
                | Event::UserCancel
                | Event::SelectMotorMoves
                | Event::SelectServoTest
                | Event::SelectStepperTest
                | Event::SelectSettings
                | Event::ProgramFinalized
        )
    }

    /// Check if this event reports a change in attached hardware
    pub fn is_port_event(&self) -> bool {
        matches!(
            self,
            Event::AccessoriesChanged | Event::ActiveRemoved | Event::PortInvalidated
        )
    }
}
