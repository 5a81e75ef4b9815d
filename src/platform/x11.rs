//! [`WindowBackend`] and [`InputInjector`] implementation for X11.
//!
//! Every operation is a short `xdotool` invocation.  Key events are sent
//! with `--window`, which delivers them to that window even when it is
//! hidden or in the background.

use crate::command::{KeyDirection, KeyEvent, Rect};
use crate::instance::{ProcessId, WindowId};
use crate::traits::{InputInjector, WindowBackend, WindowInfo};
use log::{trace, warn};
use std::process::Command;

/// Errors from running `xdotool` or parsing its output.
#[derive(Debug, thiserror::Error)]
#[error("xdotool error: {0}")]
pub struct X11Error(String);

/// `xdotool`-backed window control and key injection.
#[derive(Debug, Clone)]
pub struct Xdotool {
    /// Title of the throwaway window some launchers create first; such
    /// windows never receive key events.
    placeholder_title: String,
}

impl Xdotool {
    pub fn new(placeholder_title: impl Into<String>) -> Self {
        Self {
            placeholder_title: placeholder_title.into(),
        }
    }

    /// The window of `pid` that key events go to.
    fn input_window(&self, pid: ProcessId) -> Result<WindowId, X11Error> {
        self.windows(pid)?
            .into_iter()
            .find(|w| w.title != self.placeholder_title)
            .map(|w| w.id)
            .ok_or_else(|| X11Error(format!("no window for pid {}", pid)))
    }
}

//  xdotool helpers

/// Run `xdotool` and return its stdout, failing on a non-zero exit.
fn xdotool(args: &[&str]) -> Result<String, X11Error> {
    trace!("xdotool {}", args.join(" "));
    let output = Command::new("xdotool")
        .args(args)
        .output()
        .map_err(|e| X11Error(format!("spawn: {}", e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(X11Error(format!(
            "{} exited with {}: {}",
            args.first().copied().unwrap_or_default(),
            output.status,
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse the `KEY=value` lines printed by `getwindowgeometry --shell`.
fn parse_shell_geometry(text: &str) -> Result<Rect, X11Error> {
    let (mut x, mut y, mut w, mut h) = (None, None, None, None);
    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "X" => x = value.parse::<i32>().ok(),
            "Y" => y = value.parse::<i32>().ok(),
            "WIDTH" => w = value.parse::<u32>().ok(),
            "HEIGHT" => h = value.parse::<u32>().ok(),
            _ => {}
        }
    }
    match (x, y, w, h) {
        (Some(x), Some(y), Some(w), Some(h)) => Ok(Rect::new(x, y, w, h)),
        _ => Err(X11Error(format!("unparseable geometry: {:?}", text))),
    }
}

/// Pair each window with its title.  A window whose title cannot be read
/// (it may have closed since the search) is logged and left out.
fn titled_windows(
    ids: Vec<WindowId>,
    title: impl Fn(WindowId) -> Result<String, X11Error>,
) -> Vec<WindowInfo> {
    ids.into_iter()
        .filter_map(|id| match title(id) {
            Ok(t) => Some(WindowInfo {
                id,
                title: t.trim_end().to_string(),
            }),
            Err(e) => {
                warn!("skipping window {}: {}", id, e);
                None
            }
        })
        .collect()
}

/// Window ids printed one per line by `search`.
fn parse_window_ids(text: &str) -> Vec<WindowId> {
    text.lines()
        .filter_map(|l| l.trim().parse::<u64>().ok())
        .map(WindowId)
        .collect()
}

//  WindowBackend implementation

impl WindowBackend for Xdotool {
    type Error = X11Error;

    fn windows(&self, pid: ProcessId) -> Result<Vec<WindowInfo>, X11Error> {
        let pid_arg = pid.to_string();
        // `search` exits non-zero when nothing matches.
        let ids = match xdotool(&["search", "--pid", &pid_arg]) {
            Ok(out) => parse_window_ids(&out),
            Err(_) => return Ok(Vec::new()),
        };
        Ok(titled_windows(ids, |id| {
            xdotool(&["getwindowname", &id.to_string()])
        }))
    }

    fn frame(&self, window: WindowId) -> Result<Rect, X11Error> {
        let out = xdotool(&["getwindowgeometry", "--shell", &window.to_string()])?;
        parse_shell_geometry(&out)
    }

    fn set_frame(&self, window: WindowId, frame: Rect) -> Result<(), X11Error> {
        let id = window.to_string();
        xdotool(&["windowmove", &id, &frame.x.to_string(), &frame.y.to_string()])?;
        xdotool(&[
            "windowsize",
            &id,
            &frame.width.to_string(),
            &frame.height.to_string(),
        ])?;
        Ok(())
    }

    fn activate(&self, window: WindowId) -> Result<(), X11Error> {
        xdotool(&["windowactivate", &window.to_string()]).map(drop)
    }

    fn minimize(&self, window: WindowId) -> Result<(), X11Error> {
        xdotool(&["windowminimize", &window.to_string()]).map(drop)
    }

    fn active_pid(&self) -> Result<Option<ProcessId>, X11Error> {
        let out = xdotool(&["getactivewindow", "getwindowpid"])?;
        Ok(out.trim().parse::<u32>().ok().map(ProcessId))
    }
}

//  InputInjector implementation

impl InputInjector for Xdotool {
    type Error = X11Error;

    fn send(
        &self,
        pid: ProcessId,
        window: Option<WindowId>,
        event: &KeyEvent,
    ) -> Result<(), X11Error> {
        let window = match window {
            Some(w) => w,
            None => self.input_window(pid)?,
        };
        let action = match event.direction {
            KeyDirection::Down => "keydown",
            KeyDirection::Up => "keyup",
        };
        xdotool(&[action, "--window", &window.to_string(), event.key.as_str()]).map(drop)
    }
}
