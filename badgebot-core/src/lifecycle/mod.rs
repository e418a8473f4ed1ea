//! Hexpansion lifecycle
//!
//! The state machine is explicit, finite and deterministic. The session
//! drives it from port events, button input and elapsed time.

pub mod events;
pub mod hardware;
pub mod machine;
pub mod session;

pub use events::Event;
pub use hardware::Hardware;
pub use machine::{ErrorKind, Notice, State};
pub use session::{HexpansionSession, COMPANION_TIMEOUT_MS, CURRENT_VERSION, DISPLAY_ROTATION_MS};
