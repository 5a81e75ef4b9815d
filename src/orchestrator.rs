//! The orchestration context that ties registry, state tracking, geometry
//! and input together.
//!
//! [`ResetOrchestrator`] owns the [`InstanceRegistry`] and reacts to
//! [`Intent`]s one at a time.  It is constructed once at startup and driven
//! from a single loop; every seam it talks to is a trait, so tests run it
//! against in-memory doubles.

use crate::command::{GeometryMode, Key, ResetMode};
use crate::config::{GeometryConfig, ResetConfig};
use crate::geometry::GeometryController;
use crate::instance::{PendingCheck, ProcessId};
use crate::registry::InstanceRegistry;
use crate::router::{self, Intent};
use crate::state::StateMachine;
use crate::traits::{
    GeometryRpc, InputInjector, InstanceEvent, ProcessSource, StateReader, WindowBackend,
};
use log::{debug, info, warn};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc;

/// Possible errors from the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// An intent named an instance number nobody holds.
    #[error("no tracked instance numbered {0}")]
    UnknownInstance(u32),
}

/// Holds the global-reset flag for as long as it lives.
///
/// The flag is shared rather than borrowed so the guard can outlive the
/// `&mut self` calls made while a reset is in flight.
struct ResetGuard(Rc<Cell<bool>>);

impl ResetGuard {
    fn acquire(flag: &Rc<Cell<bool>>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(Rc::clone(flag)))
        }
    }
}

impl Drop for ResetGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Indices of the other `n - 1` entries, in cyclic order after `pos`.
fn cyclic(pos: usize, n: usize) -> impl Iterator<Item = usize> {
    (1..n).map(move |k| (pos + k) % n)
}

/// Decides which instance gets reset, locked or focused next.
///
/// # Typical usage
///
/// ```ignore
/// let mut orch = ResetOrchestrator::new(registry, states, geometry, injector,
///                                       config.reset, config.geometry);
/// orch.handle(Intent::Reconcile)?;
/// orch.handle(Intent::GlobalReset)?;
/// ```
pub struct ResetOrchestrator<P, S, W, I, R>
where
    P: ProcessSource,
    S: StateReader,
    W: WindowBackend,
    I: InputInjector,
    R: GeometryRpc,
{
    registry: InstanceRegistry<P>,
    states: StateMachine<S>,
    geometry: GeometryController<W, R>,
    injector: I,
    settings: ResetConfig,
    presets: GeometryConfig,
    events: Option<mpsc::Sender<InstanceEvent>>,
    resetting: Rc<Cell<bool>>,
}

impl<P, S, W, I, R> ResetOrchestrator<P, S, W, I, R>
where
    P: ProcessSource,
    S: StateReader,
    W: WindowBackend,
    I: InputInjector,
    R: GeometryRpc,
{
    pub fn new(
        registry: InstanceRegistry<P>,
        states: StateMachine<S>,
        geometry: GeometryController<W, R>,
        injector: I,
        settings: ResetConfig,
        presets: GeometryConfig,
    ) -> Self {
        Self {
            registry,
            states,
            geometry,
            injector,
            settings,
            presets,
            events: None,
            resetting: Rc::new(Cell::new(false)),
        }
    }

    /// Attach an [`InstanceEvent`] channel for the capture collaborator.
    pub fn set_events(&mut self, tx: mpsc::Sender<InstanceEvent>) {
        self.events = Some(tx);
    }

    pub fn registry(&self) -> &InstanceRegistry<P> {
        &self.registry
    }

    pub fn geometry(&self) -> &GeometryController<W, R> {
        &self.geometry
    }

    pub fn injector(&self) -> &I {
        &self.injector
    }

    pub fn mode(&self) -> ResetMode {
        self.settings.mode
    }

    /// Process a single [`Intent`].
    ///
    /// Only intents naming an unknown instance number fail; everything else
    /// degrades to a logged no-op.
    pub fn handle(&mut self, intent: Intent) -> Result<(), OrchestratorError> {
        match intent {
            Intent::Reconcile => self.reconcile(),

            Intent::GlobalReset => self.global_reset(),

            Intent::Geometry(mode) => self.toggle_geometry(mode),

            Intent::Open(n) => {
                let pid = self.pid_of(n)?;
                self.open(pid);
            }

            Intent::ResetOne(Some(n)) => {
                let pid = self.pid_of(n)?;
                let resettable = self
                    .registry
                    .get(pid)
                    .is_some_and(|i| self.states.is_resettable(i));
                if resettable {
                    self.reset(pid);
                } else {
                    debug!("instance {} is not resettable", n);
                }
            }

            Intent::ResetOne(None) => {
                let after = self.active_instance();
                match self.next_resettable(after) {
                    Some(pid) => self.reset(pid),
                    None => debug!("nothing to reset"),
                }
            }

            Intent::ResetOthers(n) => {
                let keep = self.pid_of(n)?;
                self.reset_all_except(Some(keep));
            }

            Intent::ResetAll => self.reset_all_except(None),

            Intent::ToggleLock(n) => {
                let pid = self.pid_of(n)?;
                if let Some(inst) = self.registry.get_mut(pid) {
                    inst.locked = !inst.locked;
                    if !inst.locked && inst.pending == PendingCheck::AwaitReady {
                        inst.pending = PendingCheck::None;
                    }
                    info!(
                        "instance {} {}",
                        n,
                        if inst.locked { "locked" } else { "unlocked" }
                    );
                }
            }

            Intent::WindowClosed(pid) => match self.registry.get_mut(pid) {
                Some(inst) => {
                    info!("instance {} window closed", inst.number);
                    inst.was_closed = true;
                }
                None => debug!("window closed for untracked pid {}", pid),
            },

            Intent::BindWindow { pid, window } => match self.registry.get_mut(pid) {
                Some(inst) => {
                    debug!("instance {} bound to window {}", inst.number, window);
                    inst.window = Some(window);
                }
                None => debug!("window {} for untracked pid {}", window, pid),
            },
        }
        Ok(())
    }

    /// Re-scan processes, publish the diff, then refresh pending states.
    fn reconcile(&mut self) {
        let diff = self.registry.reconcile();
        for i in &diff.added {
            self.emit(InstanceEvent::Added {
                pid: i.pid,
                number: i.number,
            });
        }
        for i in &diff.removed {
            self.emit(InstanceEvent::Removed {
                pid: i.pid,
                number: i.number,
            });
        }
        self.refresh_pending();
    }

    /// Instances with a pending check are re-read each tick; the check is
    /// satisfied once the instance is ready.
    fn refresh_pending(&mut self) {
        let mut became_ready = Vec::new();
        for inst in self.registry.iter_mut() {
            if inst.pending == PendingCheck::None || inst.was_closed {
                continue;
            }
            self.states.update_state(inst, false);
            if !self.states.is_ready(inst) {
                continue;
            }
            if inst.pending == PendingCheck::AwaitReady {
                became_ready.push((inst.pid, inst.number));
            }
            inst.pending = PendingCheck::None;
        }
        for (pid, number) in became_ready {
            info!("instance {} is ready", number);
            self.emit(InstanceEvent::Ready { pid, number });
        }
    }

    /// React to the global reset key according to the reset mode.
    fn global_reset(&mut self) {
        let Some(_guard) = ResetGuard::acquire(&self.resetting) else {
            debug!("global reset already in flight, ignoring");
            return;
        };
        let Some(active) = self.active_instance() else {
            debug!("foreground is not a tracked instance");
            return;
        };

        let next = match self.settings.mode {
            ResetMode::Wall => None,
            ResetMode::Lock => self.next_locked(active),
            ResetMode::Multi => self.next_ready(active),
        };
        match next {
            Some(next) if self.open(next) => self.reset(active),
            _ => self.return_to_wall(active),
        }
    }

    fn return_to_wall(&mut self, pid: ProcessId) {
        self.reset(pid);
        if let Some(inst) = self.registry.get(pid) {
            self.geometry.resize(inst, self.presets.wall, true);
            self.emit(InstanceEvent::ReturnedToWall {
                pid,
                number: inst.number,
            });
        }
    }

    fn toggle_geometry(&mut self, mode: GeometryMode) {
        let Some(pid) = self.active_instance() else {
            debug!("{} toggle: foreground is not a tracked instance", mode);
            return;
        };
        if let Some(inst) = self.registry.get(pid) {
            info!("instance {}: toggle {}", inst.number, mode);
            self.geometry.resize(inst, self.presets.frame(mode), false);
        }
    }

    /// Start a new attempt on `pid`.
    ///
    /// The lock is cleared only after the reset key has been issued.
    fn reset(&mut self, pid: ProcessId) {
        let number = match self.registry.get_mut(pid) {
            Some(inst) if !inst.was_closed => {
                inst.pending = PendingCheck::Generating;
                inst.number
            }
            _ => return,
        };
        info!("reset instance {}", number);
        self.send_key(pid, &self.settings.reset_key);
        if let Some(inst) = self.registry.get_mut(pid) {
            inst.locked = false;
        }
    }

    fn reset_all_except(&mut self, keep: Option<ProcessId>) {
        let targets: Vec<ProcessId> = self
            .registry
            .snapshot()
            .iter()
            .filter(|i| Some(i.pid) != keep && !i.was_closed && self.states.is_resettable(i))
            .map(|i| i.pid)
            .collect();
        for pid in targets {
            self.reset(pid);
        }
    }

    /// Switch the operator into `pid`.
    ///
    /// An instance that is not ready yet is locked instead, and reported
    /// through [`InstanceEvent::Ready`] once it is.  Returns whether the
    /// instance was actually opened.
    fn open(&mut self, pid: ProcessId) -> bool {
        let Some(inst) = self.registry.get_mut(pid) else {
            return false;
        };
        if inst.was_closed {
            return false;
        }
        self.states.update_state(inst, true);
        if !self.states.is_ready(inst) {
            inst.locked = true;
            inst.pending = PendingCheck::AwaitReady;
            info!("instance {} not ready, locked until it is", inst.number);
            return false;
        }

        if self.settings.hide_windows {
            for other in self
                .registry
                .snapshot()
                .iter()
                .filter(|i| i.pid != pid && !i.was_closed)
            {
                self.geometry.hide(other);
            }
        }

        let Some(inst) = self.registry.get(pid) else {
            return false;
        };
        let number = inst.number;
        self.geometry.focus(inst);
        self.geometry.resize(inst, self.presets.gameplay, true);

        self.send_key(pid, &self.settings.escape_key);
        if let Some(extra) = &self.settings.open_extra_key {
            self.send_key(pid, extra);
        }

        if let Some(inst) = self.registry.get_mut(pid) {
            inst.pending = PendingCheck::None;
            inst.locked = false;
        }
        info!("opened instance {}", number);
        true
    }

    fn send_key(&self, pid: ProcessId, key: &Key) {
        let window = self.registry.get(pid).and_then(|i| i.window);
        if let Err(e) = router::press(&self.injector, pid, window, key) {
            warn!("pid {}: key {} not delivered: {}", pid, key, e);
        }
    }

    /// The foreground process, if it is a live tracked instance.
    fn active_instance(&self) -> Option<ProcessId> {
        let pid = match self.geometry.backend().active_pid() {
            Ok(Some(pid)) => pid,
            Ok(None) => return None,
            Err(e) => {
                warn!("querying foreground window failed: {}", e);
                return None;
            }
        };
        self.registry
            .get(pid)
            .filter(|i| !i.was_closed)
            .map(|i| i.pid)
    }

    fn next_locked(&self, active: ProcessId) -> Option<ProcessId> {
        let pos = self.registry.position(active)?;
        let list = self.registry.snapshot();
        cyclic(pos, list.len())
            .map(|idx| &list[idx])
            .find(|i| i.locked && !i.was_closed)
            .map(|i| i.pid)
    }

    /// First ready instance after `active`, force-refreshing each candidate.
    fn next_ready(&mut self, active: ProcessId) -> Option<ProcessId> {
        let pos = self.registry.position(active)?;
        for idx in cyclic(pos, self.registry.len()) {
            let Some(inst) = self.registry.iter_mut().nth(idx) else {
                continue;
            };
            if inst.was_closed {
                continue;
            }
            self.states.update_state(inst, true);
            let ready = self.states.is_ready(inst);
            debug!("candidate {}: ready={}", inst.number, ready);
            if ready {
                return Some(inst.pid);
            }
        }
        None
    }

    /// First resettable instance in cyclic order after `after` (or from
    /// the start of the list).  Never returns a locked instance.
    pub fn next_resettable(&self, after: Option<ProcessId>) -> Option<ProcessId> {
        let list = self.registry.snapshot();
        let order: Vec<usize> = match after.and_then(|p| self.registry.position(p)) {
            Some(pos) => cyclic(pos, list.len()).collect(),
            None => (0..list.len()).collect(),
        };
        order
            .into_iter()
            .map(|idx| &list[idx])
            .find(|i| !i.was_closed && self.states.is_resettable(i))
            .map(|i| i.pid)
    }

    fn pid_of(&self, number: u32) -> Result<ProcessId, OrchestratorError> {
        self.registry
            .by_number(number)
            .map(|i| i.pid)
            .ok_or(OrchestratorError::UnknownInstance(number))
    }

    fn emit(&self, event: InstanceEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

//  Tests
