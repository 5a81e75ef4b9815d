//! Core traits that decouple resetwall from any specific operating system,
//! window system or transport mechanism.
//!
//! Every concrete backend (`/proc`, `xdotool`, a Unix-socket listener or a
//! test harness) implements one of these traits.  The
//! [`ResetOrchestrator`](crate::orchestrator::ResetOrchestrator) only depends
//! on these abstractions.

use crate::command::{Command, KeyEvent, Rect};
use crate::instance::{Instance, ProcessId, WindowId};
use crate::ipc::boundless::SetRequest;
use std::sync::mpsc;

/// Enumerates processes and reads their argument vectors.
pub trait ProcessSource {
    type Error: std::error::Error + Send + 'static;

    /// Every process currently visible to this user.
    fn processes(&self) -> Result<Vec<ProcessId>, Self::Error>;

    /// The full argument vector of `pid`, program name included.
    fn arguments(&self, pid: ProcessId) -> Result<Vec<String>, Self::Error>;
}

/// Reads the raw content of an instance's state-output file.
pub trait StateReader {
    type Error: std::error::Error + Send + 'static;

    fn read_state(&self, instance: &Instance) -> Result<Vec<u8>, Self::Error>;
}

/// A window as reported by the [`WindowBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub title: String,
}

/// Direct, accessibility-style control over top-level windows.
pub trait WindowBackend {
    type Error: std::error::Error + Send + 'static;

    /// All top-level windows owned by `pid`.
    fn windows(&self, pid: ProcessId) -> Result<Vec<WindowInfo>, Self::Error>;

    /// Current position and size of `window`.
    fn frame(&self, window: WindowId) -> Result<Rect, Self::Error>;

    /// Move, then resize, `window`.
    fn set_frame(&self, window: WindowId, frame: Rect) -> Result<(), Self::Error>;

    /// Raise `window` and give it keyboard focus.
    fn activate(&self, window: WindowId) -> Result<(), Self::Error>;

    fn minimize(&self, window: WindowId) -> Result<(), Self::Error>;

    /// Process owning the foreground window, if any.
    fn active_pid(&self) -> Result<Option<ProcessId>, Self::Error>;
}

/// Delivers synthetic key events to one process only.
///
/// Implementations must never fall back to "whatever is focused": hidden and
/// background instances have to receive the event too.
pub trait InputInjector {
    type Error: std::error::Error + Send + 'static;

    /// Deliver `event` to `pid`.  `window` is the window bound to the
    /// instance, if any; it takes precedence over looking one up.
    fn send(
        &self,
        pid: ProcessId,
        window: Option<WindowId>,
        event: &KeyEvent,
    ) -> Result<(), Self::Error>;
}

/// Sends `set` requests to an instance's boundless geometry helper.
///
/// # Contract
///
/// * [`send`](GeometryRpc::send) must return promptly; a stuck peer may
///   only ever delay a background thread, never the caller.
pub trait GeometryRpc {
    type Error: std::error::Error + Send + 'static;

    fn send(&self, port: u16, request: &SetRequest) -> Result<(), Self::Error>;
}

/// Notifications for the capture collaborator.
///
/// The orchestrator holds an `Option<mpsc::Sender<InstanceEvent>>`; any
/// listener can receive these independently without being owned by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceEvent {
    /// A new managed process was discovered.
    Added { pid: ProcessId, number: u32 },
    /// A tracked process disappeared and was dropped.
    Removed { pid: ProcessId, number: u32 },
    /// A deferred (locked, not ready) instance became ready to open.
    Ready { pid: ProcessId, number: u32 },
    /// The instance was reset and sent back to wall geometry; the wall UI
    /// should take the foreground.
    ReturnedToWall { pid: ProcessId, number: u32 },
}

/// A source of [`Command`]s.
///
/// Implementations listen on some transport (a Unix socket, a timer, an
/// in-memory channel) and forward commands into the provided
/// [`mpsc::Sender`].
///
/// # Contract
///
/// * [`run`](CommandSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Each received command must be sent through `sink` exactly once.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait CommandSource: Send {
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming [`Command`] into `sink`.
    ///
    /// This method blocks the calling thread.  To run multiple sources
    /// concurrently, spawn each one on its own thread.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Self::Error>;
}
