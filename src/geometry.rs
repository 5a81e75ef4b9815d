//! Window geometry and focus control.
//!
//! Each instance is driven through exactly one geometry channel, chosen by
//! its `remote_port`:
//!
//! * `0`: the **direct** channel: the [`WindowBackend`] reads the window's
//!   current frame and moves/resizes it.
//! * anything else: the **RPC** channel: a `set` request to the instance's
//!   boundless helper through [`GeometryRpc`].
//!
//! All failures are logged and swallowed; geometry is best-effort.

use crate::command::Frame;
use crate::instance::{Instance, WindowId};
use crate::ipc::boundless::SetRequest;
use crate::traits::{GeometryRpc, WindowBackend};
use log::{debug, info, warn};

pub struct GeometryController<W: WindowBackend, R: GeometryRpc> {
    backend: W,
    rpc: R,
    /// Target of the toggle-back when a size is requested twice.
    default_frame: Frame,
    placeholder_title: String,
}

impl<W: WindowBackend, R: GeometryRpc> GeometryController<W, R> {
    pub fn new(backend: W, rpc: R, default_frame: Frame, placeholder_title: impl Into<String>) -> Self {
        Self {
            backend,
            rpc,
            default_frame,
            placeholder_title: placeholder_title.into(),
        }
    }

    /// The underlying window backend.
    pub fn backend(&self) -> &W {
        &self.backend
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn default_frame(&self) -> Frame {
        self.default_frame
    }

    /// Resize (and possibly move) `instance`'s window to `frame`.
    ///
    /// On the direct channel, a non-forced request for the size the window
    /// already has is turned into one forced resize to the default frame, so
    /// pressing a toggle key twice returns to gameplay geometry.
    pub fn resize(&self, instance: &Instance, frame: Frame, force: bool) {
        if instance.was_closed {
            debug!("instance {}: closed, not resizing", instance.number);
            return;
        }
        if instance.uses_remote_geometry() {
            self.resize_remote(instance, frame);
        } else {
            self.resize_direct(instance, frame, force);
        }
    }

    fn resize_remote(&self, instance: &Instance, frame: Frame) {
        let request = SetRequest::from(frame);
        debug!(
            "instance {}: {} via port {}",
            instance.number, request, instance.remote_port
        );
        if let Err(e) = self.rpc.send(instance.remote_port, &request) {
            warn!("instance {}: geometry request not sent: {}", instance.number, e);
        }
    }

    fn resize_direct(&self, instance: &Instance, frame: Frame, force: bool) {
        let Some(window) = self.window_for(instance) else {
            return;
        };
        let current = match self.backend.frame(window) {
            Ok(r) => r,
            Err(e) => {
                warn!("instance {}: reading window frame failed: {}", instance.number, e);
                return;
            }
        };

        if !force && current.same_size(frame.width, frame.height) {
            debug!(
                "instance {}: already {}x{}, returning to default",
                instance.number, frame.width, frame.height
            );
            self.resize_direct(instance, self.default_frame, true);
            return;
        }

        let target = frame.place_around(current);
        if target == current {
            return;
        }
        info!(
            "instance {}: {}x{}+{}+{} -> {}x{}+{}+{}",
            instance.number,
            current.width,
            current.height,
            current.x,
            current.y,
            target.width,
            target.height,
            target.x,
            target.y
        );
        if let Err(e) = self.backend.set_frame(window, target) {
            warn!("instance {}: setting window frame failed: {}", instance.number, e);
        }
    }

    /// Raise and focus `instance`'s window. Returns whether it worked.
    pub fn focus(&self, instance: &Instance) -> bool {
        let Some(window) = self.window_for(instance) else {
            return false;
        };
        match self.backend.activate(window) {
            Ok(()) => true,
            Err(e) => {
                warn!("instance {}: activate failed: {}", instance.number, e);
                false
            }
        }
    }

    pub fn hide(&self, instance: &Instance) {
        let Some(window) = self.window_for(instance) else {
            return;
        };
        if let Err(e) = self.backend.minimize(window) {
            warn!("instance {}: minimize failed: {}", instance.number, e);
        }
    }

    /// The bound window, or the first window of the process whose title is
    /// not the placeholder.
    fn window_for(&self, instance: &Instance) -> Option<WindowId> {
        if let Some(w) = instance.window {
            return Some(w);
        }
        match self.backend.windows(instance.pid) {
            Ok(windows) => {
                let found = windows
                    .into_iter()
                    .find(|w| w.title != self.placeholder_title)
                    .map(|w| w.id);
                if found.is_none() {
                    debug!("instance {}: no usable window", instance.number);
                }
                found
            }
            Err(e) => {
                warn!("instance {}: window lookup failed: {}", instance.number, e);
                None
            }
        }
    }
}
