//! Concrete backends for Linux desktops.
//!
//! * [`linux::ProcFs`]: [`ProcessSource`](crate::traits::ProcessSource)
//!   over `/proc`.
//! * [`x11::Xdotool`]: [`WindowBackend`](crate::traits::WindowBackend) and
//!   [`InputInjector`](crate::traits::InputInjector) driven through the
//!   `xdotool` binary.

pub mod linux;
pub mod x11;
