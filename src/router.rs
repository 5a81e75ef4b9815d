//! Key routing and synthetic input.
//!
//! [`KeyEventRouter`] turns raw [`Command`]s into [`Intent`]s using the
//! configured [`KeyBindings`]; [`press`] synthesises the down/up pair that
//! the orchestrator sends to one instance.

use crate::command::{Command, GeometryMode, Key, KeyDirection, KeyEvent, LocalGesture};
use crate::config::KeyBindings;
use crate::instance::{ProcessId, WindowId};
use crate::traits::InputInjector;
use log::debug;

/// What the orchestrator should do in response to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Reset the foreground instance according to the reset mode.
    GlobalReset,
    /// Toggle the foreground instance into a geometry preset.
    Geometry(GeometryMode),
    /// Play the given instance.
    Open(u32),
    /// Reset one instance; `None` picks the next resettable one.
    ResetOne(Option<u32>),
    /// Reset every resettable instance except this one.
    ResetOthers(u32),
    ResetAll,
    ToggleLock(u32),
    Reconcile,
    WindowClosed(ProcessId),
    BindWindow { pid: ProcessId, window: WindowId },
}

fn bound(binding: &Option<Key>, key: &Key) -> bool {
    binding.as_ref() == Some(key)
}

/// Maps commands to intents. Unbound actions never trigger.
#[derive(Debug, Clone)]
pub struct KeyEventRouter {
    keys: KeyBindings,
}

impl KeyEventRouter {
    pub fn new(keys: KeyBindings) -> Self {
        Self { keys }
    }

    pub fn route(&self, cmd: Command) -> Option<Intent> {
        match cmd {
            Command::Key(event) => self.route_global(&event),
            Command::Local(gesture) => self.route_local(&gesture),
            Command::WindowClosed(pid) => Some(Intent::WindowClosed(pid)),
            Command::BindWindow(b) => Some(Intent::BindWindow {
                pid: b.pid,
                window: b.window,
            }),
            Command::Reconcile => Some(Intent::Reconcile),
        }
    }

    /// Reset fires on release; geometry toggles fire on press.
    fn route_global(&self, event: &KeyEvent) -> Option<Intent> {
        let k = &self.keys;
        match event.direction {
            KeyDirection::Up if bound(&k.reset, &event.key) => Some(Intent::GlobalReset),
            KeyDirection::Down => [
                (&k.toggle_tall, GeometryMode::Tall),
                (&k.toggle_thin, GeometryMode::Thin),
                (&k.toggle_wide, GeometryMode::Wide),
                (&k.toggle_gameplay, GeometryMode::Gameplay),
            ]
            .into_iter()
            .find(|(binding, _)| bound(binding, &event.key))
            .map(|(_, mode)| Intent::Geometry(mode)),
            _ => None,
        }
    }

    fn route_local(&self, gesture: &LocalGesture) -> Option<Intent> {
        let k = &self.keys;
        let key = &gesture.key;
        let hovered = gesture.hovered;

        if bound(&k.reset_all, key) {
            return Some(Intent::ResetAll);
        }
        if bound(&k.reset_one, key) {
            return Some(Intent::ResetOne(hovered));
        }
        let Some(n) = hovered else {
            debug!("local key {} needs a hovered instance", key);
            return None;
        };
        if bound(&k.run, key) {
            Some(Intent::Open(n))
        } else if bound(&k.reset_others, key) {
            Some(Intent::ResetOthers(n))
        } else if bound(&k.lock, key) {
            Some(Intent::ToggleLock(n))
        } else {
            None
        }
    }
}

/// Deliver a full key press (down, then up) to `pid` only, through
/// `window` when the instance has one bound.
pub fn press<I: InputInjector>(
    injector: &I,
    pid: ProcessId,
    window: Option<WindowId>,
    key: &Key,
) -> Result<(), I::Error> {
    injector.send(pid, window, &KeyEvent::down(key.clone()))?;
    injector.send(pid, window, &KeyEvent::up(key.clone()))
}
