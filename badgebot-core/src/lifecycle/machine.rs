//! State machine definition
//!
//! Everything the app shows and does is a function of the current state
//! and an event. The hexpansion lifecycle (checking, provisioning,
//! upgrading) and the BadgeBot screens reachable once an accessory is
//! ready share one state space so removal can interrupt any of them.

use super::events::Event;

/// App states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Startup, first port scan
    Init,
    /// Safety notice, nothing usable attached yet
    Warning,
    /// Logo screen alternating with the warning
    Logo,
    /// Deciding what to do about the attached hexpansions
    Check,
    /// Blank hexpansion found; asking whether to provision it
    Detected,
    /// HexDrive firmware outdated; asking whether to upgrade it
    Upgrade,
    /// Asking whether to erase the selected HexDrive
    Erase,
    /// Provisioning or upgrade in progress
    Programming,
    /// The active HexDrive was unplugged
    Removed,
    /// An operation failed; acknowledge to continue
    Error(ErrorKind),
    /// An operation succeeded; acknowledge to continue
    Message(Notice),
    /// Ready, app menu visible
    Menu,
    /// Motor moves instructions
    Help,
    /// Recording a program
    ReceiveInstr,
    /// Counting down before playback
    Countdown,
    /// Playing back the program
    Run,
    /// Playback finished
    Done,
    /// Driving servos by hand
    ServoTest,
    /// Driving the stepper by hand
    StepperTest,
    /// Editing settings
    Settings,
}

/// Failures shown on the error screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Writing the header or creating the filesystem failed
    ProvisionFailed,
    /// Copying the companion firmware failed
    UpgradeFailed,
    /// Erasing the EEPROM failed
    EraseFailed,
    /// The companion could not set up its outputs
    AccessoryFault,
}

/// Successes shown on the message screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notice {
    /// Companion firmware written
    Upgraded,
    /// EEPROM wiped
    Erased,
}

impl State {
    /// Check if an accessory is active in this state
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            State::Menu
                | State::Help
                | State::ReceiveInstr
                | State::Countdown
                | State::Run
                | State::Done
                | State::ServoTest
                | State::StepperTest
                | State::Settings
        )
    }

    /// Check if this state may drive outputs
    pub fn motor_allowed(&self) -> bool {
        matches!(self, State::Run | State::ServoTest | State::StepperTest)
    }

    /// Check if this state is waiting for a yes/no answer about a port
    pub fn is_prompt(&self) -> bool {
        matches!(self, State::Detected | State::Upgrade | State::Erase)
    }

    /// Check if this is an error state
    pub fn is_error(&self) -> bool {
        matches!(self, State::Error(_))
    }

    /// Check if this state only waits for acknowledgement
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Error(_) | State::Message(_) | State::Removed)
    }

    /// Process an event and return the next state
    ///
    /// This is the core state transition logic.
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use State::*;

        match (self, event) {
            // Startup transitions
            (Init, ShowWarning) => Warning,
            (Init, StartChecking) => Check,

            // Idle screens
            (Warning, DisplayTimeout) => Logo,
            (Logo, DisplayTimeout) => Warning,
            (Warning | Logo, AccessoriesChanged | UserConfirm) => Check,

            // Check transitions
            (Check, BlankFound) => Detected,
            (Check, UpgradeNeeded) => Upgrade,
            (Check, EraseRequested) => Erase,
            (Check, AccessoryReady) => Menu,
            (Check, NothingFound) => Warning,
            (Check, ActiveRemoved) => Removed,
            (Check, ErrorDetected(kind)) => Error(kind),

            // Prompts
            (Detected | Upgrade, UserConfirm) => Programming,
            (Detected | Upgrade | Erase, UserCancel | PortInvalidated) => Check,
            (Erase, Completed(notice)) => Message(notice),
            (Erase, ErrorDetected(kind)) => Error(kind),

            // Programming transitions
            (Programming, Provisioned) => Upgrade,
            (Programming, Completed(notice)) => Message(notice),
            (Programming, ErrorDetected(kind)) => Error(kind),
            (Programming, PortInvalidated) => Check,

            // Acknowledgement
            (Error(_) | Message(_) | Removed, UserConfirm | UserCancel) => Check,

            // Ready states lose their accessory
            (s, ActiveRemoved) if s.is_ready() => Removed,
            (s, ErrorDetected(kind)) if s.is_ready() => Error(kind),

            // Menu transitions
            (Menu, SelectMotorMoves) => Help,
            (Menu, SelectServoTest) => ServoTest,
            (Menu, SelectStepperTest) => StepperTest,
            (Menu, SelectSettings) => Settings,
            (Menu, EraseRequested) => Check,

            // Motor moves transitions
            (Help, UserConfirm) => ReceiveInstr,
            (Help, UserCancel) => Menu,
            (ReceiveInstr, ProgramFinalized) => Countdown,
            (ReceiveInstr, UserCancel) => Menu,
            (Countdown, CountdownFinished) => Run,
            (Countdown | Run, UserCancel) => ReceiveInstr,
            (Run, PlaybackFinished) => Done,
            (Done, UserConfirm) => ReceiveInstr,
            (Done, UserCancel) => Menu,

            // Test screens
            (ServoTest | StepperTest | Settings, UserCancel) => Menu,

            // Default: stay in current state
            _ => self,
        }
    }
}
