//! App controller
//!
//! The controller is the single owner of everything the app touches:
//! - the hexpansion session and its hardware
//! - settings and their store
//! - the recorded program and its playback
//! - the servo and stepper test state
//!
//! The host calls [`Controller::update`] once per frame with the elapsed
//! time and the button latch. The background task calls
//! [`Controller::background_tick`] to run playback, and the step timer
//! calls [`Controller::step_timer`].

use badgebot_core::config::{SettingKey, Settings};
use badgebot_core::hexpansion::{AccessoryType, Classification};
use badgebot_core::lifecycle::{Event, Hardware, HexpansionSession, Notice, State};
use badgebot_core::motion::{Direction, Playback, Recorder, Row, ScrollWindow, StepperCell};
use badgebot_core::traits::{AccessoryDirectory, AccessoryDriver, AccessoryError, MotorPowers};
use badgebot_hal::{Button, ButtonSet, Buttons, Filesystem, PortBus, SettingsStore};
use embedded_hal::delay::DelayNs;
use heapless::Vec;

use crate::tasks::stepper::on_step_timer;
use crate::view::{Screen, Tone};

/// How long CONFIRM must be held to finish recording
pub const LONG_PRESS_MS: u32 = 1000;

/// Countdown before playback starts
pub const COUNTDOWN_MS: u32 = 3000;

/// Background period while playing back
pub const RUN_TICK_MS: u32 = 10;

/// Background period otherwise
pub const IDLE_TICK_MS: u32 = 50;

/// Steps added per LEFT/RIGHT in the stepper test
pub const STEPPER_JOG_STEPS: i32 = 100;

/// Speed change per UP/DOWN in the stepper test
pub const STEPPER_SPEED_STEP_HZ: u32 = 10;

/// Menu entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuItem {
    MotorMoves,
    ServoTest,
    StepperTest,
    Settings,
    Erase,
}

impl MenuItem {
    pub fn label(self) -> &'static str {
        match self {
            MenuItem::MotorMoves => "Motor Moves",
            MenuItem::ServoTest => "Servo Test",
            MenuItem::StepperTest => "Stepper Test",
            MenuItem::Settings => "Settings",
            MenuItem::Erase => "Erase",
        }
    }

    /// Entries available for a variant, in display order
    pub fn for_accessory(kind: &AccessoryType) -> Vec<MenuItem, 5> {
        let mut items = Vec::new();
        if kind.supports_motor_moves() {
            let _ = items.push(MenuItem::MotorMoves);
        }
        if kind.servos > 0 {
            let _ = items.push(MenuItem::ServoTest);
        }
        if kind.steppers > 0 {
            let _ = items.push(MenuItem::StepperTest);
        }
        let _ = items.push(MenuItem::Settings);
        let _ = items.push(MenuItem::Erase);
        items
    }
}

/// Number of servo channels the test screen can drive
const SERVO_CHANNELS: usize = 4;

/// BadgeBot app controller
pub struct Controller<'a, P, F, D, A, S> {
    session: HexpansionSession,
    hw: Hardware<P, F, D, A>,
    settings: Settings,
    store: S,
    recorder: Recorder,
    window: ScrollWindow,
    scroll_mode: bool,
    confirm_held_ms: Option<u32>,
    countdown_ms: u32,
    playback: Option<Playback>,
    menu_cursor: usize,
    setting_cursor: usize,
    servo_channel: u8,
    servo_offsets: [Option<i16>; SERVO_CHANNELS],
    stepper: &'a StepperCell,
    minimise_requested: bool,
}

impl<'a, P, F, D, A, S> Controller<'a, P, F, D, A, S>
where
    P: PortBus,
    F: Filesystem,
    D: DelayNs,
    A: AccessoryDirectory,
    S: SettingsStore,
{
    /// Load settings and scan the ports
    pub fn new(hw: Hardware<P, F, D, A>, store: S, stepper: &'a StepperCell) -> Self {
        let settings = Settings::load(&store);
        let mut controller = Self {
            session: HexpansionSession::new(),
            hw,
            settings,
            store,
            recorder: Recorder::new(),
            window: ScrollWindow::new(),
            scroll_mode: false,
            confirm_held_ms: None,
            countdown_ms: 0,
            playback: None,
            menu_cursor: 0,
            setting_cursor: 0,
            servo_channel: 0,
            servo_offsets: [None; SERVO_CHANNELS],
            stepper,
            minimise_requested: false,
        };
        let state = controller
            .session
            .start(&mut controller.hw.buses, controller.settings.show_warning);
        info!("BadgeBot started in {:?}", state);
        controller
    }

    pub fn state(&self) -> State {
        self.session.state()
    }

    pub fn session(&self) -> &HexpansionSession {
        &self.session
    }

    pub fn hardware(&self) -> &Hardware<P, F, D, A> {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut Hardware<P, F, D, A> {
        &mut self.hw
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Check and clear a pending request to minimise the app
    pub fn take_minimise_request(&mut self) -> bool {
        core::mem::take(&mut self.minimise_requested)
    }

    /// Hexpansion inserted into `port`
    pub fn on_insertion(&mut self, port: u8) -> Classification {
        self.session.on_insertion(&mut self.hw.buses, port)
    }

    /// Hexpansion removed from `port`
    pub fn on_removal(&mut self, port: u8) {
        let before = self.session.state();
        if self.session.on_removal(port) {
            self.leave(before, self.session.state());
        }
    }

    /// One foreground frame
    ///
    /// # Returns
    /// The state after the frame.
    pub fn update<B: Buttons + ?Sized>(&mut self, delta_ms: u32, buttons: &mut B) -> State {
        let input = ButtonSet::capture(buttons);
        let before = self.session.state();

        let lifecycle_input = if before.is_ready() {
            ButtonSet::NONE
        } else {
            input
        };
        self.session.update(&mut self.hw, lifecycle_input, delta_ms);

        let state = self.session.state();
        if state == before && state.is_ready() {
            if let Some(event) = self.handle_app(state, input, delta_ms) {
                self.session.apply(event);
            }
        }

        let after = self.session.state();
        if after != before {
            self.leave(before, after);
            self.enter(after);
        }

        // Keep CONFIRM latched while it may become a long press
        let holding = after == State::ReceiveInstr && self.confirm_held_ms.is_some();
        if !input.is_empty() && !holding {
            buttons.clear();
        }
        after
    }

    /// Background work
    ///
    /// # Returns
    /// How long to sleep before the next call.
    pub fn background_tick(&mut self, delta_ms: u32) -> u32 {
        if self.session.state() != State::Run {
            return IDLE_TICK_MS;
        }
        let Some(playback) = self.playback.as_mut() else {
            return IDLE_TICK_MS;
        };

        match playback.advance(delta_ms) {
            Some(powers) => {
                if let Err(_err) = self.drive(|d| d.set_motors(powers)) {
                    warn!("motor update failed: {:?}", _err);
                }
                RUN_TICK_MS
            }
            None => {
                info!("playback finished");
                self.playback = None;
                self.session.apply(Event::PlaybackFinished);
                self.leave(State::Run, State::Done);
                self.enter(State::Done);
                IDLE_TICK_MS
            }
        }
    }

    /// Step timer callback
    ///
    /// # Returns
    /// `true` if a step was taken.
    pub fn step_timer(&mut self, elapsed_us: u32) -> bool {
        if self.session.state() != State::StepperTest {
            return false;
        }
        let stepper = self.stepper;
        match self.session.active_driver(&mut self.hw.accessories) {
            Some(driver) => on_step_timer(stepper, driver, elapsed_us).unwrap_or(false),
            None => false,
        }
    }

    fn drive<T>(
        &mut self,
        f: impl FnOnce(&mut A::Driver) -> Result<T, AccessoryError>,
    ) -> Result<T, AccessoryError> {
        match self.session.active_driver(&mut self.hw.accessories) {
            Some(driver) => f(driver),
            None => Err(AccessoryError::NotResponding),
        }
    }

    fn stop_outputs(&mut self) {
        let result = match self.drive(|d| d.set_motors(MotorPowers::STOPPED)) {
            // Servo and stepper variants have no motors to stop
            Ok(()) | Err(AccessoryError::Unsupported) => self.drive(|d| {
                d.motor_release()?;
                d.set_power(false)
            }),
            Err(e) => Err(e),
        };
        if let Err(_err) = result {
            debug!("stopping outputs: {:?}", _err);
        }
    }

    fn power_on(&mut self) -> Result<(), AccessoryError> {
        let hz = self.settings.pwm_freq_hz;
        self.drive(|d| d.set_frequency(hz, None))?;
        self.drive(|d| d.set_power(true))
    }

    /// Side effects of leaving `state` for `next`
    fn leave(&mut self, state: State, next: State) {
        match state {
            // Playback and power carry over into the run
            State::Countdown if next == State::Run => {}
            State::Countdown | State::Run | State::ServoTest => {
                self.playback = None;
                self.stop_outputs();
            }
            State::StepperTest => {
                self.stepper.enable(false);
                self.stepper.set_target(self.stepper.position());
                self.stop_outputs();
            }
            State::ReceiveInstr => self.confirm_held_ms = None,
            _ => {}
        }
    }

    /// Side effects of entering a state
    fn enter(&mut self, state: State) {
        match state {
            State::Menu => {
                self.menu_cursor = 0;
            }
            State::ReceiveInstr => {
                self.scroll_mode = false;
                self.window.reset();
            }
            State::Countdown => {
                self.countdown_ms = 0;
                if let Err(_err) = self.power_on() {
                    warn!("power on failed: {:?}", _err);
                }
            }
            State::Done => {
                if let Err(_err) = self.drive(|d| d.set_power(false)) {
                    debug!("power off failed: {:?}", _err);
                }
            }
            State::ServoTest => {
                self.servo_channel = 0;
                self.servo_offsets = [None; SERVO_CHANNELS];
                if let Err(_err) = self.drive(|d| d.set_power(true)) {
                    warn!("power on failed: {:?}", _err);
                }
            }
            State::StepperTest => {
                self.stepper.set_speed(self.settings.stepper_step_hz);
                self.stepper.set_target(self.stepper.position());
                self.stepper.enable(true);
                if let Err(_err) = self.drive(|d| d.set_power(true)) {
                    warn!("power on failed: {:?}", _err);
                }
            }
            State::Settings => {
                self.setting_cursor = 0;
            }
            _ => {}
        }
    }

    fn menu_items(&self) -> Vec<MenuItem, 5> {
        match self.session.active_accessory() {
            Some(kind) => MenuItem::for_accessory(kind),
            None => Vec::new(),
        }
    }

    fn handle_app(&mut self, state: State, input: ButtonSet, delta_ms: u32) -> Option<Event> {
        match state {
            State::Menu => self.handle_menu(input),
            State::Help => {
                if input.contains(Button::Confirm) {
                    Some(Event::UserConfirm)
                } else if input.contains(Button::Cancel) {
                    Some(Event::UserCancel)
                } else {
                    None
                }
            }
            State::ReceiveInstr => self.handle_receive(input, delta_ms),
            State::Countdown => {
                if input.contains(Button::Cancel) {
                    return Some(Event::UserCancel);
                }
                self.countdown_ms = self.countdown_ms.saturating_add(delta_ms);
                if self.countdown_ms < COUNTDOWN_MS {
                    return None;
                }
                info!("playback started ({} instructions)", self.recorder.instructions().len());
                self.playback = Some(self.recorder.playback());
                Some(Event::CountdownFinished)
            }
            State::Run => input.contains(Button::Cancel).then_some(Event::UserCancel),
            State::Done => {
                if input.contains(Button::Confirm) {
                    self.recorder.clear();
                    Some(Event::UserConfirm)
                } else if input.contains(Button::Cancel) {
                    Some(Event::UserCancel)
                } else {
                    None
                }
            }
            State::ServoTest => self.handle_servo(input),
            State::StepperTest => self.handle_stepper(input),
            State::Settings => self.handle_settings(input),
            _ => None,
        }
    }

    fn handle_menu(&mut self, input: ButtonSet) -> Option<Event> {
        let items = self.menu_items();
        if items.is_empty() {
            return None;
        }
        if input.contains(Button::Cancel) {
            self.minimise_requested = true;
            return None;
        }
        if input.contains(Button::Up) {
            self.menu_cursor = (self.menu_cursor + items.len() - 1) % items.len();
        } else if input.contains(Button::Down) {
            self.menu_cursor = (self.menu_cursor + 1) % items.len();
        } else if input.contains(Button::Confirm) {
            let item = items.get(self.menu_cursor).copied()?;
            return match item {
                MenuItem::MotorMoves => Some(Event::SelectMotorMoves),
                MenuItem::ServoTest => Some(Event::SelectServoTest),
                MenuItem::StepperTest => Some(Event::SelectStepperTest),
                MenuItem::Settings => Some(Event::SelectSettings),
                MenuItem::Erase => {
                    // Applies its own transition
                    self.session.request_erase();
                    None
                }
            };
        }
        None
    }

    fn handle_receive(&mut self, input: ButtonSet, delta_ms: u32) -> Option<Event> {
        if input.contains(Button::Cancel) {
            return Some(Event::UserCancel);
        }

        if input.contains(Button::Confirm) {
            let held = match self.confirm_held_ms {
                Some(held) => held.saturating_add(delta_ms),
                None => 0,
            };
            if held < LONG_PRESS_MS {
                self.confirm_held_ms = Some(held);
                return None;
            }
            self.confirm_held_ms = None;
            let params = self.settings.profile_params();
            self.recorder.finalize_open(&params);
            if self.recorder.instructions().is_empty() {
                return None;
            }
            return Some(Event::ProgramFinalized);
        }

        if self.confirm_held_ms.take().is_some() {
            self.scroll_mode = !self.scroll_mode;
            if !self.scroll_mode {
                self.window.reset();
            }
            return None;
        }

        let total = self.recorder.row_count();
        if self.scroll_mode {
            if input.contains(Button::Up) {
                self.window.scroll_up(total);
            } else if input.contains(Button::Down) {
                self.window.scroll_down(total);
            }
            return None;
        }

        let pressed = [Button::Up, Button::Down, Button::Left, Button::Right]
            .into_iter()
            .find(|b| input.contains(*b))
            .and_then(Direction::from_button);
        if let Some(direction) = pressed {
            let params = self.settings.profile_params();
            self.recorder.press(direction, &params);
            self.window.reset();
        }
        None
    }

    fn servo_count(&self) -> u8 {
        self.session
            .active_accessory()
            .map(|k| k.servos.min(SERVO_CHANNELS as u8))
            .unwrap_or(0)
    }

    fn handle_servo(&mut self, input: ButtonSet) -> Option<Event> {
        if input.contains(Button::Cancel) {
            return Some(Event::UserCancel);
        }
        let count = self.servo_count();
        if count == 0 {
            return None;
        }

        let channel = self.servo_channel;
        let index = usize::from(channel);
        let step = self.settings.servo_step_us as i16;
        let range = self.settings.servo_range_us as i16;
        let current = self.servo_offsets[index];

        let next = if input.contains(Button::Up) {
            self.servo_channel = (channel + count - 1) % count;
            return None;
        } else if input.contains(Button::Down) {
            self.servo_channel = (channel + 1) % count;
            return None;
        } else if input.contains(Button::Left) {
            Some(current.unwrap_or(0).saturating_sub(step).max(-range))
        } else if input.contains(Button::Right) {
            Some(current.unwrap_or(0).saturating_add(step).min(range))
        } else if input.contains(Button::Confirm) {
            // Centre, or stop the pulses if already centred
            match current {
                Some(0) => None,
                _ => Some(0),
            }
        } else {
            return None;
        };

        match self.drive(|d| d.set_servo_position(channel, next)) {
            Ok(()) => self.servo_offsets[index] = next,
            Err(_err) => warn!("servo {} update failed: {:?}", channel, _err),
        }
        None
    }

    fn handle_stepper(&mut self, input: ButtonSet) -> Option<Event> {
        if input.contains(Button::Cancel) {
            return Some(Event::UserCancel);
        }
        let (lo, hi) = SettingKey::StepperStepHz.range();
        let (lo, hi) = (lo as u32, hi as u32);
        if input.contains(Button::Left) {
            self.stepper
                .set_target(self.stepper.target().saturating_sub(STEPPER_JOG_STEPS));
        } else if input.contains(Button::Right) {
            self.stepper
                .set_target(self.stepper.target().saturating_add(STEPPER_JOG_STEPS));
        } else if input.contains(Button::Up) {
            let speed = self.stepper.speed().saturating_add(STEPPER_SPEED_STEP_HZ);
            self.stepper.set_speed(speed.clamp(lo, hi));
        } else if input.contains(Button::Down) {
            let speed = self.stepper.speed().saturating_sub(STEPPER_SPEED_STEP_HZ);
            self.stepper.set_speed(speed.clamp(lo, hi));
        }
        None
    }

    fn handle_settings(&mut self, input: ButtonSet) -> Option<Event> {
        let count = SettingKey::ALL.len();
        let key = SettingKey::ALL[self.setting_cursor % count];
        if input.contains(Button::Cancel) {
            match self.settings.store(&mut self.store) {
                Ok(()) => info!("settings saved"),
                Err(_err) => warn!("settings not saved: {:?}", _err),
            }
            return Some(Event::UserCancel);
        }
        if input.contains(Button::Up) {
            self.setting_cursor = (self.setting_cursor + count - 1) % count;
        } else if input.contains(Button::Down) {
            self.setting_cursor = (self.setting_cursor + 1) % count;
        } else if input.contains(Button::Left) {
            self.settings.adjust(key, -1);
        } else if input.contains(Button::Right) {
            self.settings.adjust(key, 1);
        }
        None
    }

    /// Describe the current screen
    pub fn screen(&self) -> Screen {
        let session = &self.session;
        match session.state() {
            State::Init => Screen::new("BadgeBot", Tone::Neutral).line("Starting..."),
            State::Warning => Screen::new("Warning", Tone::Alert)
                .line("The robot can move")
                .line("unexpectedly.")
                .line("Keep fingers clear.")
                .line("Attach a HexDrive")
                .line("to continue."),
            State::Logo => Screen::new("BadgeBot", Tone::Neutral)
                .line("HexDrive manager")
                .line("CONFIRM to check"),
            State::Check => Screen::new("Checking...", Tone::Neutral),
            State::Detected => {
                let mut screen = Screen::new("Blank hexpansion", Tone::Alert);
                if let Some(port) = session.detected_port() {
                    screen.push_fmt(format_args!("Port {}", port));
                }
                screen.push_fmt(format_args!("< {} >", session.detected_type().name));
                screen.push("CONFIRM to program");
                screen.push("CANCEL to skip");
                screen
            }
            State::Upgrade => {
                let mut screen = Screen::new("Upgrade HexDrive?", Tone::Alert);
                if let Some(port) = session.upgrade_port() {
                    screen.push_fmt(format_args!("Port {}", port));
                }
                screen.push("CONFIRM to upgrade");
                screen.push("CANCEL to skip");
                screen
            }
            State::Erase => {
                let mut screen = Screen::new("Erase HexDrive?", Tone::Alert);
                if let Some(port) = session.erase_port() {
                    screen.push_fmt(format_args!("Port {}", port));
                }
                screen.push("All data will be lost");
                screen.push("CONFIRM to erase");
                screen
            }
            State::Programming => Screen::new("Programming...", Tone::Alert).line("Do not remove"),
            State::Removed => Screen::new("HexDrive removed", Tone::Error)
                .line("Motors stopped")
                .line("CONFIRM to continue"),
            State::Error(kind) => {
                let mut screen = Screen::new("Error", Tone::Error);
                screen.push_fmt(format_args!("{:?}", kind));
                if let Some(err) = session.last_error() {
                    screen.push_fmt(format_args!("at {:?}", err.step()));
                }
                screen.push("CONFIRM to continue");
                screen
            }
            State::Message(notice) => {
                let text = match notice {
                    Notice::Upgraded => "HexDrive upgraded",
                    Notice::Erased => "HexDrive erased",
                };
                Screen::new("Done", Tone::Success)
                    .line(text)
                    .line("CONFIRM to continue")
            }
            State::Menu => {
                let title = session.active_accessory().map(|k| k.name).unwrap_or("BadgeBot");
                let mut screen = Screen::new(title, Tone::Neutral);
                for (i, item) in self.menu_items().iter().enumerate() {
                    screen.push(item.label());
                    if i == self.menu_cursor {
                        screen.select_last();
                    }
                }
                screen
            }
            State::Help => Screen::new("Motor Moves", Tone::Neutral)
                .line("Arrows add moves")
                .line("CONFIRM: scroll")
                .line("Hold CONFIRM: run")
                .line("CANCEL: back"),
            State::ReceiveInstr => self.program_screen(),
            State::Countdown => {
                let remaining = COUNTDOWN_MS.saturating_sub(self.countdown_ms);
                let mut screen = Screen::new("Get ready", Tone::Alert);
                screen.push_fmt(format_args!("Starting in {}", remaining.div_ceil(1000)));
                screen
            }
            State::Run => Screen::new("Running", Tone::Alert).line("CANCEL to stop"),
            State::Done => Screen::new("Finished", Tone::Success)
                .line("CONFIRM: new program")
                .line("CANCEL: menu"),
            State::ServoTest => {
                let mut screen = Screen::new("Servo Test", Tone::Neutral);
                for channel in 0..self.servo_count() {
                    match self.servo_offsets[usize::from(channel)] {
                        Some(offset) => screen.push_fmt(format_args!("S{}: {:+} us", channel, offset)),
                        None => screen.push_fmt(format_args!("S{}: off", channel)),
                    }
                    if channel == self.servo_channel {
                        screen.select_last();
                    }
                }
                screen
            }
            State::StepperTest => {
                let mut screen = Screen::new("Stepper Test", Tone::Neutral);
                screen.push_fmt(format_args!("Pos {}", self.stepper.position()));
                screen.push_fmt(format_args!("Target {}", self.stepper.target()));
                screen.push_fmt(format_args!("Speed {} Hz", self.stepper.speed()));
                screen
            }
            State::Settings => self.settings_screen(),
        }
    }

    fn program_screen(&self) -> Screen {
        let title = if self.scroll_mode { "Program (scroll)" } else { "Program" };
        let mut screen = Screen::new(title, Tone::Neutral);
        let visible = self.window.visible(self.recorder.row_count());
        for row in self.recorder.rows().skip(visible.start).take(visible.len()) {
            match row {
                Row::Start => screen.push("START"),
                Row::Instruction(instruction) => screen.push_fmt(format_args!("{}", instruction)),
                Row::Open(Some(instruction)) => {
                    screen.push_fmt(format_args!("{}", instruction));
                    screen.select_last();
                }
                Row::Open(None) => {
                    screen.push("_");
                    screen.select_last();
                }
                Row::End => screen.push("END"),
            }
        }
        screen
    }

    fn settings_screen(&self) -> Screen {
        const ROWS: usize = 5;
        let mut screen = Screen::new("Settings", Tone::Neutral);
        let count = SettingKey::ALL.len();
        let cursor = self.setting_cursor % count;
        let start = cursor.saturating_sub(ROWS - 1).min(count - ROWS);
        for (i, key) in SettingKey::ALL.iter().enumerate().skip(start).take(ROWS) {
            screen.push_fmt(format_args!("{}: {}", key.label(), self.settings.get(*key)));
            if i == cursor {
                screen.select_last();
            }
        }
        screen
    }
}
