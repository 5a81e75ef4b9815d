//! Commands and types used throughout resetwall.
//!
//! This module defines the vocabulary that all components share:
//! [`Command`] describes everything that can arrive on the control channel
//! (hotkey events, in-app gestures, collaborator notifications, timer ticks),
//! and [`Key`] / [`Frame`] / [`Rect`] / [`ResetMode`] / [`GeometryMode`]
//! provide the supporting data types.
//!
//! Hotkey helpers and the wall UI forward raw strings; the daemon parses key
//! directions (`"up"`, `"Down"`), reset modes (`"wall"`, `"Multi"`), frames
//! (`"1920x1080"`, `"384x16384+0+0"` or an object) and window ids (number or
//! `"0x3a00007"`).

use crate::instance::{ProcessId, WindowId};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A key name as understood by the input backend (an X keysym name such as
/// `"F6"`, `"Escape"` or `"r"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(pub String);

impl Key {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a key went down or came back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KeyDirection {
    Down,
    Up,
}

impl fmt::Display for KeyDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyDirection::Down => write!(f, "down"),
            KeyDirection::Up => write!(f, "up"),
        }
    }
}

impl<'de> Deserialize<'de> for KeyDirection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.trim().to_lowercase().as_str() {
            "down" | "press" | "pressed" => Ok(KeyDirection::Down),
            "up" | "release" | "released" => Ok(KeyDirection::Up),
            _ => Err(DeError::custom(format!("invalid key direction: {:?}", s))),
        }
    }
}

/// A single key transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    pub direction: KeyDirection,
}

impl KeyEvent {
    pub fn down(key: Key) -> Self {
        Self {
            key,
            direction: KeyDirection::Down,
        }
    }

    pub fn up(key: Key) -> Self {
        Self {
            key,
            direction: KeyDirection::Up,
        }
    }
}

/// Policy for choosing which instance gets focus after a global reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ResetMode {
    /// Always return to the wall after resetting the active instance.
    #[default]
    Wall,
    /// Jump to another locked instance if there is one.
    Lock,
    /// Jump to the next ready instance in cyclic order.
    Multi,
}

impl fmt::Display for ResetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetMode::Wall => write!(f, "wall"),
            ResetMode::Lock => write!(f, "lock"),
            ResetMode::Multi => write!(f, "multi"),
        }
    }
}

impl<'de> Deserialize<'de> for ResetMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.trim().to_lowercase().as_str() {
            "wall" => Ok(ResetMode::Wall),
            "lock" => Ok(ResetMode::Lock),
            "multi" => Ok(ResetMode::Multi),
            _ => Err(DeError::custom(format!("invalid reset mode: {:?}", s))),
        }
    }
}

/// The window-geometry presets that can be toggled with a global key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryMode {
    Tall,
    Thin,
    Wide,
    Gameplay,
}

impl fmt::Display for GeometryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryMode::Tall => write!(f, "tall"),
            GeometryMode::Thin => write!(f, "thin"),
            GeometryMode::Wide => write!(f, "wide"),
            GeometryMode::Gameplay => write!(f, "gameplay"),
        }
    }
}

/// A concrete window rectangle on the virtual desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn same_size(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

/// A requested window geometry.
///
/// `x` / `y` are optional: an unset coordinate means "keep the window's
/// center on that axis" for the direct channel and "leave unchanged" for the
/// RPC channel.
///
/// On the wire a frame is either an object
/// `{"width":384,"height":16384,"x":0}` or a string `"WxH"` / `"WxH+X+Y"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// A frame that only specifies a size.
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            x: None,
            y: None,
            width,
            height,
        }
    }

    /// A frame with a fixed position.
    pub fn at(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            width,
            height,
        }
    }

    /// Resolve this frame against the window's `current` rectangle.
    ///
    /// Unset coordinates are chosen so that the window's center stays where
    /// it was across the resize.
    pub fn place_around(&self, current: Rect) -> Rect {
        let centered = |origin: i32, old: u32, new: u32| -> i32 {
            let delta = old as i64 - new as i64;
            (origin as i64 + delta / 2).clamp(i32::MIN as i64, i32::MAX as i64) as i32
        };
        Rect {
            x: self
                .x
                .unwrap_or_else(|| centered(current.x, current.width, self.width)),
            y: self
                .y
                .unwrap_or_else(|| centered(current.y, current.height, self.height)),
            width: self.width,
            height: self.height,
        }
    }
}

/// Parse `"WxH"` or `"WxH+X+Y"` (X/Y may be negative: `"WxH+-10+0"`).
fn parse_frame(s: &str) -> Option<Frame> {
    let s = s.trim();
    let mut parts = s.split('+');
    let size = parts.next()?;
    let (w, h) = size.split_once(['x', 'X'])?;
    let width: u32 = w.trim().parse().ok()?;
    let height: u32 = h.trim().parse().ok()?;
    match (parts.next(), parts.next(), parts.next()) {
        (None, None, None) => Some(Frame::sized(width, height)),
        (Some(x), Some(y), None) => Some(Frame::at(
            x.trim().parse().ok()?,
            y.trim().parse().ok()?,
            width,
            height,
        )),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for Frame {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = Frame;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "object {{width, height, x?, y?}} or string \"WxH[+X+Y]\"")
            }
            fn visit_map<A>(self, mut map: A) -> Result<Frame, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut x = None;
                let mut y = None;
                let mut width = None;
                let mut height = None;
                while let Some(k) = map.next_key::<String>()? {
                    match k.as_str() {
                        "x" => x = map.next_value()?,
                        "y" => y = map.next_value()?,
                        "width" => width = Some(map.next_value()?),
                        "height" => height = Some(map.next_value()?),
                        _ => {
                            let _: serde::de::IgnoredAny = map.next_value()?;
                        }
                    }
                }
                Ok(Frame {
                    x,
                    y,
                    width: width.ok_or_else(|| DeError::missing_field("width"))?,
                    height: height.ok_or_else(|| DeError::missing_field("height"))?,
                })
            }
            fn visit_str<E>(self, s: &str) -> Result<Frame, E>
            where
                E: DeError,
            {
                parse_frame(s)
                    .ok_or_else(|| DeError::custom(format!("frame: expected \"WxH[+X+Y]\", got {:?}", s)))
            }
        }
        deserializer.deserialize_any(V)
    }
}

/// An in-app gesture: a configured local key pressed while the wall UI
/// pointer hovers an instance (or nothing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGesture {
    pub key: Key,
    /// Instance number under the pointer, if any.
    #[serde(default)]
    pub hovered: Option<u32>,
}

/// The capture collaborator resolved a window for a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBinding {
    pub pid: ProcessId,
    pub window: WindowId,
}

/// Everything that can arrive on the control channel.
///
/// Commands are produced by [`CommandSource`](crate::traits::CommandSource)
/// implementations, translated by the
/// [`KeyEventRouter`](crate::router::KeyEventRouter) and consumed by the
/// [`ResetOrchestrator`](crate::orchestrator::ResetOrchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// A global hotkey transition, delivered regardless of which
    /// application is in the foreground.
    Key(KeyEvent),

    /// A local key pressed inside the wall UI.
    Local(LocalGesture),

    /// The capture collaborator saw the window of this process disappear.
    WindowClosed(ProcessId),

    /// The capture collaborator resolved the window of a process.
    BindWindow(WindowBinding),

    /// Re-scan the process list and refresh pending instance states.
    ///
    /// Sent periodically by the [`Ticker`](crate::ipc::ticker::Ticker).
    /// On the wire this is encoded as the JSON string `"Reconcile"`.
    Reconcile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_direction_display() {
        assert_eq!(KeyDirection::Down.to_string(), "down");
        assert_eq!(KeyDirection::Up.to_string(), "up");
    }

    #[test]
    fn key_direction_parses_case_insensitively() {
        let d: KeyDirection = serde_json::from_str(r#""Up""#).unwrap();
        assert_eq!(d, KeyDirection::Up);
        let d: KeyDirection = serde_json::from_str(r#""pressed""#).unwrap();
        assert_eq!(d, KeyDirection::Down);
        assert!(serde_json::from_str::<KeyDirection>(r#""sideways""#).is_err());
    }

    #[test]
    fn reset_mode_parses_case_insensitively() {
        let m: ResetMode = serde_json::from_str(r#""Multi""#).unwrap();
        assert_eq!(m, ResetMode::Multi);
        let m: ResetMode = serde_json::from_str(r#""lock""#).unwrap();
        assert_eq!(m, ResetMode::Lock);
        assert!(serde_json::from_str::<ResetMode>(r#""grid""#).is_err());
    }

    #[test]
    fn frame_from_size_string() {
        let f: Frame = serde_json::from_str(r#""384x16384""#).unwrap();
        assert_eq!(f, Frame::sized(384, 16384));
    }

    #[test]
    fn frame_from_positioned_string() {
        let f: Frame = serde_json::from_str(r#""1920x300+0+-20""#).unwrap();
        assert_eq!(f, Frame::at(0, -20, 1920, 300));
    }

    #[test]
    fn frame_from_object_with_partial_position() {
        let f: Frame = serde_json::from_str(r#"{"width":300,"height":1080,"x":10}"#).unwrap();
        assert_eq!(f.x, Some(10));
        assert_eq!(f.y, None);
        assert_eq!((f.width, f.height), (300, 1080));
    }

    #[test]
    fn frame_rejects_garbage() {
        assert!(serde_json::from_str::<Frame>(r#""wide""#).is_err());
        assert!(serde_json::from_str::<Frame>(r#""10x10+1""#).is_err());
        assert!(serde_json::from_str::<Frame>(r#"{"width":10}"#).is_err());
    }

    #[test]
    fn place_around_preserves_center() {
        let current = Rect::new(100, 100, 1000, 600);
        let placed = Frame::sized(400, 200).place_around(current);
        assert_eq!(placed, Rect::new(400, 300, 400, 200));
        // Centers match.
        assert_eq!(placed.x + 200, current.x + 500);
        assert_eq!(placed.y + 100, current.y + 300);
    }

    #[test]
    fn place_around_grows_outward() {
        let current = Rect::new(500, 500, 100, 100);
        let placed = Frame::sized(300, 100).place_around(current);
        assert_eq!(placed, Rect::new(400, 500, 300, 100));
    }

    #[test]
    fn place_around_respects_explicit_axis() {
        let current = Rect::new(100, 100, 1000, 600);
        let frame = Frame {
            x: Some(0),
            y: None,
            width: 400,
            height: 200,
        };
        assert_eq!(frame.place_around(current), Rect::new(0, 300, 400, 200));
    }

    #[test]
    fn commands_deserialize_from_wire() {
        let c: Command =
            serde_json::from_str(r#"{"Key":{"key":"F6","direction":"up"}}"#).unwrap();
        assert_eq!(c, Command::Key(KeyEvent::up(Key::new("F6"))));

        let c: Command = serde_json::from_str(r#"{"Local":{"key":"r","hovered":3}}"#).unwrap();
        assert_eq!(
            c,
            Command::Local(LocalGesture {
                key: Key::new("r"),
                hovered: Some(3)
            })
        );

        let c: Command = serde_json::from_str(r#"{"Local":{"key":"t"}}"#).unwrap();
        assert_eq!(
            c,
            Command::Local(LocalGesture {
                key: Key::new("t"),
                hovered: None
            })
        );

        let c: Command = serde_json::from_str(r#"{"WindowClosed":4321}"#).unwrap();
        assert_eq!(c, Command::WindowClosed(ProcessId(4321)));

        let c: Command =
            serde_json::from_str(r#"{"BindWindow":{"pid":12,"window":"0x3a00007"}}"#).unwrap();
        assert_eq!(
            c,
            Command::BindWindow(WindowBinding {
                pid: ProcessId(12),
                window: WindowId(0x3a00007)
            })
        );

        let c: Command = serde_json::from_str(r#""Reconcile""#).unwrap();
        assert_eq!(c, Command::Reconcile);
    }
}
