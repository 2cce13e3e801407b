//! Lifecycle coordination for the hotkey subsystem
//!
//! [`HotkeyController`] owns the process-wide OS resources and tears them
//! down deterministically; [`ShutdownSignal`] lets the daemon binary wait
//! for termination requests.

mod controller;
mod shutdown;

pub use controller::HotkeyController;
pub use shutdown::ShutdownSignal;
