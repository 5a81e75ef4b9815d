//! Tracked game instances and their identity.
//!
//! An [`Instance`] is created only by the
//! [`InstanceRegistry`](crate::registry::InstanceRegistry) and owned by it;
//! everything else refers to instances by [`ProcessId`] or instance number.
//!
//! [`classify`] is the pure heuristic that decides whether a process argument
//! vector belongs to a managed instance.

use crate::config::DiscoveryConfig;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// OS process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque window reference understood by the
/// [`WindowBackend`](crate::traits::WindowBackend).
///
/// Deserializes from a number or from a (possibly `0x`-prefixed hex) string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for WindowId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = WindowId;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "window id as integer or string")
            }
            fn visit_u64<E>(self, n: u64) -> Result<WindowId, E> {
                Ok(WindowId(n))
            }
            fn visit_str<E>(self, s: &str) -> Result<WindowId, E>
            where
                E: DeError,
            {
                let s = s.trim();
                let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => s.parse(),
                };
                parsed
                    .map(WindowId)
                    .map_err(|_| DeError::custom(format!("invalid window id: {:?}", s)))
            }
        }
        deserializer.deserialize_any(V)
    }
}

/// Runtime state an instance reports through its state-output file.
///
/// The variants are nominal; there is no ordering between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    Waiting,
    Paused,
    Unpaused,
    InGameScreen,
    Title,
    Generating,
    Previewing,
}

impl InstanceState {
    /// Leading byte of an `inworld,<detail>` record; the detail is
    /// identified by the byte at [`EXTENDED_OFFSET`](Self::EXTENDED_OFFSET).
    pub const EXTENDED_MARKER: u8 = b'i';
    pub const EXTENDED_OFFSET: usize = 11;

    /// Map a single marker byte to a state.
    pub fn from_marker(byte: u8) -> Option<Self> {
        match byte {
            b'w' => Some(InstanceState::Waiting),
            b't' => Some(InstanceState::Title),
            b'g' => Some(InstanceState::Generating),
            b'p' => Some(InstanceState::Previewing),
            b'a' => Some(InstanceState::Unpaused),
            b's' => Some(InstanceState::Paused),
            b'e' => Some(InstanceState::InGameScreen),
            _ => None,
        }
    }

    /// Decode the contents of a state-output file.
    ///
    /// Returns `None` for empty content, an unknown marker, or an extended
    /// record shorter than 12 bytes.
    pub fn decode(content: &[u8]) -> Option<Self> {
        let first = *content.first()?;
        if first == Self::EXTENDED_MARKER {
            Self::from_marker(*content.get(Self::EXTENDED_OFFSET)?)
        } else {
            Self::from_marker(first)
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceState::Waiting => "waiting",
            InstanceState::Paused => "paused",
            InstanceState::Unpaused => "unpaused",
            InstanceState::InGameScreen => "in-game screen",
            InstanceState::Title => "title",
            InstanceState::Generating => "generating",
            InstanceState::Previewing => "previewing",
        };
        f.write_str(s)
    }
}

/// Why an instance's state file is currently worth reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingCheck {
    /// State is irrelevant right now; reads are skipped unless forced.
    #[default]
    None,
    /// A reset was just issued; a `generating`/`waiting` phase is expected.
    Generating,
    /// An open was deferred because the instance was not ready.
    AwaitReady,
}

/// Identity derived from a process argument vector by [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    /// Numeric suffix of the instance directory name, if it has one.
    pub number: Option<u32>,
    /// Parent of the library-path directory. Empty if undetectable.
    pub instance_dir: PathBuf,
    /// Game version, or an empty string.
    pub version: String,
}

/// Decide whether `args` belong to a managed instance.
///
/// A process qualifies iff one argument contains a configured main-class
/// marker **and** one argument starts with the library-path prefix.
pub fn classify(args: &[String], rules: &DiscoveryConfig) -> Option<InstanceIdentity> {
    let has_marker = args.iter().any(|a| {
        rules
            .main_class_markers
            .iter()
            .any(|m| !m.is_empty() && a.contains(m.as_str()))
    });
    if !has_marker {
        return None;
    }

    let library_path = args
        .iter()
        .find_map(|a| a.strip_prefix(rules.library_path_prefix.as_str()))?;

    let instance_dir = Path::new(library_path.trim())
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    Some(InstanceIdentity {
        number: numeric_suffix(&instance_dir),
        version: detect_version(args),
        instance_dir,
    })
}

/// Trailing decimal digits of the last path component (`"Inst12"` → 12).
fn numeric_suffix(dir: &Path) -> Option<u32> {
    let name = dir.file_name()?.to_string_lossy();
    let digits: String = name
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok().filter(|n| *n > 0)
}

/// `--version <v>`, else the `<v>` in a `.../intermediary/<v>/...` path.
fn detect_version(args: &[String]) -> String {
    if let Some(pos) = args.iter().position(|a| a == "--version") {
        if let Some(v) = args.get(pos + 1) {
            return v.clone();
        }
    }
    args.iter()
        .flat_map(|a| a.split([':', ';']))
        .find_map(|entry| {
            let mut parts = entry.split('/');
            parts.find(|p| *p == "intermediary")?;
            parts.next().map(str::to_string)
        })
        .unwrap_or_default()
}

/// One tracked game process.
#[derive(Debug, Clone)]
pub struct Instance {
    pub pid: ProcessId,
    pub number: u32,
    pub working_path: PathBuf,
    pub version: String,
    /// Port of the in-process geometry helper; `0` means "no helper".
    pub remote_port: u16,
    pub pending: PendingCheck,
    pub locked: bool,
    pub was_closed: bool,
    pub window: Option<WindowId>,
    state: Option<InstanceState>,
    prev_state: Option<InstanceState>,
}

impl Instance {
    pub fn new(pid: ProcessId, number: u32, working_path: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            number,
            working_path: working_path.into(),
            version: String::new(),
            remote_port: 0,
            pending: PendingCheck::None,
            locked: false,
            was_closed: false,
            window: None,
            state: None,
            prev_state: None,
        }
    }

    pub fn with_remote_port(mut self, port: u16) -> Self {
        self.remote_port = port;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Last decoded state, `None` until the state file was read once.
    pub fn state(&self) -> Option<InstanceState> {
        self.state
    }

    pub fn prev_state(&self) -> Option<InstanceState> {
        self.prev_state
    }

    /// Whether geometry goes through the boundless RPC helper.
    pub fn uses_remote_geometry(&self) -> bool {
        self.remote_port != 0
    }

    /// Record a freshly decoded state. Returns `true` if it changed.
    ///
    /// Only the [`StateMachine`](crate::state::StateMachine) calls this.
    pub(crate) fn record_state(&mut self, state: InstanceState) -> bool {
        self.prev_state = self.state;
        self.state = Some(state);
        self.prev_state != self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn prism_args(dir: &str) -> Vec<String> {
        args(&[
            "/usr/lib/jvm/java-17/bin/java",
            &format!("-Djava.library.path={}/natives", dir),
            "-cp",
            "/libs/net/fabricmc/intermediary/1.16.1/intermediary-1.16.1.jar:/libs/other.jar",
            "org.prismlauncher.EntryPoint",
        ])
    }

    #[test]
    fn decode_plain_markers() {
        assert_eq!(InstanceState::decode(b"a"), Some(InstanceState::Unpaused));
        assert_eq!(InstanceState::decode(b"waiting"), Some(InstanceState::Waiting));
        assert_eq!(InstanceState::decode(b"title"), Some(InstanceState::Title));
        assert_eq!(
            InstanceState::decode(b"generating,40"),
            Some(InstanceState::Generating)
        );
        assert_eq!(
            InstanceState::decode(b"previewing,80"),
            Some(InstanceState::Previewing)
        );
    }

    #[test]
    fn decode_extended_record_uses_byte_eleven() {
        let mut buf = [b'x'; 12];
        buf[0] = 0x69;
        buf[11] = 0x67;
        assert_eq!(InstanceState::decode(&buf), Some(InstanceState::Generating));
        assert_eq!(
            InstanceState::decode(b"inworld,unpaused"),
            Some(InstanceState::Unpaused)
        );
        assert_eq!(
            InstanceState::decode(b"inworld,paused"),
            Some(InstanceState::Paused)
        );
        assert_eq!(
            InstanceState::decode(b"inworld,gamescreen"),
            Some(InstanceState::InGameScreen)
        );
    }

    #[test]
    fn decode_rejects_empty_short_and_unknown() {
        assert_eq!(InstanceState::decode(b""), None);
        assert_eq!(InstanceState::decode(b"inworld"), None);
        assert_eq!(InstanceState::decode(b"zzz"), None);
    }

    #[test]
    fn classify_prism_instance() {
        let rules = DiscoveryConfig::default();
        let id = classify(&prism_args("/home/u/instances/Inst3"), &rules).unwrap();
        assert_eq!(id.number, Some(3));
        assert_eq!(id.instance_dir, PathBuf::from("/home/u/instances/Inst3"));
        assert_eq!(id.version, "1.16.1");
    }

    #[test]
    fn classify_prefers_explicit_version_flag() {
        let rules = DiscoveryConfig::default();
        let mut a = prism_args("/i/Speed12");
        a.push("--version".into());
        a.push("1.20.1".into());
        let id = classify(&a, &rules).unwrap();
        assert_eq!(id.number, Some(12));
        assert_eq!(id.version, "1.20.1");
    }

    #[test]
    fn classify_requires_both_marker_and_library_path() {
        let rules = DiscoveryConfig::default();
        let no_marker = args(&["java", "-Djava.library.path=/i/Inst1/natives", "Main"]);
        assert!(classify(&no_marker, &rules).is_none());

        let no_lib = args(&["java", "net.minecraft.client.main.Main"]);
        assert!(classify(&no_lib, &rules).is_none());
    }

    #[test]
    fn classify_keeps_instances_without_number_or_dir() {
        let rules = DiscoveryConfig::default();
        let a = args(&["java", "-Djava.library.path=", "org.multimc.EntryPoint"]);
        let id = classify(&a, &rules).unwrap();
        assert_eq!(id.number, None);
        assert_eq!(id.instance_dir, PathBuf::new());
        assert_eq!(id.version, "");
    }

    #[test]
    fn numeric_suffix_ignores_zero_and_missing() {
        assert_eq!(numeric_suffix(Path::new("/a/Inst0")), None);
        assert_eq!(numeric_suffix(Path::new("/a/Practice")), None);
        assert_eq!(numeric_suffix(Path::new("/a/MCSR 07")), Some(7));
    }

    #[test]
    fn record_state_reports_change() {
        let mut inst = Instance::new(ProcessId(1), 1, "/tmp");
        assert!(inst.record_state(InstanceState::Title));
        assert!(!inst.record_state(InstanceState::Title));
        assert!(inst.record_state(InstanceState::Generating));
        assert_eq!(inst.prev_state(), Some(InstanceState::Title));
        assert_eq!(inst.state(), Some(InstanceState::Generating));
    }

    #[test]
    fn window_id_parses_hex_and_decimal() {
        let w: WindowId = serde_json::from_str(r#""0x10""#).unwrap();
        assert_eq!(w, WindowId(16));
        let w: WindowId = serde_json::from_str("42").unwrap();
        assert_eq!(w, WindowId(42));
        let w: WindowId = serde_json::from_str(r#""99""#).unwrap();
        assert_eq!(w, WindowId(99));
    }
}
