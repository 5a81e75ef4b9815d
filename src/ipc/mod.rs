//! Transports: the Unix-socket command listener, the reconcile ticker and
//! the TCP client for the boundless geometry helper.
//!
//! Hotkey helpers, the wall UI and the capture collaborator connect to the
//! socket and send newline-delimited JSON commands.

pub mod boundless;
pub mod listener;
pub mod ticker;
