//! Application configuration.
//!
//! The configuration is loaded from a JSON file at
//! `$XDG_CONFIG_HOME/resetwall/config.json`.  Every section is optional; a
//! minimal `{}` file is valid and all sections fall back to their
//! compiled-in defaults.  Unknown keys are ignored.
//!
//! # Example
//!
//! ```json
//! {
//!   "keys": { "reset": "F13", "toggle_thin": "F14", "lock": "l" },
//!   "reset": { "mode": "multi", "hide_windows": true },
//!   "geometry": { "thin": "300x1080", "gameplay": "1920x1080+0+0" },
//!   "discovery": { "poll_interval_ms": 2000 },
//!   "rpc": { "timeout_ms": 1000 }
//! }
//! ```

use crate::command::{Frame, GeometryMode, Key, ResetMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logical action → key bindings.
    #[serde(default)]
    pub keys: KeyBindings,

    /// Reset policy and the keys injected into instances.
    #[serde(default)]
    pub reset: ResetConfig,

    /// Window geometry presets.
    #[serde(default)]
    pub geometry: GeometryConfig,

    /// How managed instances are recognised and where their files live.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Geometry RPC client settings.
    #[serde(default)]
    pub rpc: RpcConfig,
}

/// Key bindings. `null` or a missing entry means "unbound": the action never
/// triggers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    /// Global, on key-up: reset the foreground instance.
    pub reset: Option<Key>,
    /// Global, on key-down: geometry toggles.
    pub toggle_tall: Option<Key>,
    pub toggle_thin: Option<Key>,
    pub toggle_wide: Option<Key>,
    pub toggle_gameplay: Option<Key>,
    /// Local (wall UI) actions.
    pub reset_all: Option<Key>,
    pub reset_one: Option<Key>,
    pub reset_others: Option<Key>,
    pub run: Option<Key>,
    pub lock: Option<Key>,
}

/// Reset policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    pub mode: ResetMode,
    /// When `false`, every instance counts as ready and resettable
    /// regardless of its reported state.
    pub check_state: bool,
    /// Minimize every other tracked window when opening an instance.
    pub hide_windows: bool,
    /// Key the game binds to "create new world".
    pub reset_key: Key,
    /// Key injected into an instance when it is opened (unpauses it).
    pub escape_key: Key,
    /// Optional key injected right after `escape_key`.
    pub open_extra_key: Option<Key>,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            mode: ResetMode::Wall,
            check_state: true,
            hide_windows: false,
            reset_key: Key::new("F6"),
            escape_key: Key::new("Escape"),
            open_extra_key: None,
        }
    }
}

/// Window geometry presets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Canonical playing geometry; also the target of a toggle-back.
    pub gameplay: Frame,
    /// Geometry an instance returns to after a wall-mode reset.
    pub wall: Frame,
    pub tall: Frame,
    pub thin: Frame,
    pub wide: Frame,
    /// Windows with exactly this title are helper windows, never the game.
    pub placeholder_title: String,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            gameplay: Frame::at(0, 0, 1920, 1080),
            wall: Frame::sized(1280, 720),
            tall: Frame::sized(384, 16384),
            thin: Frame::sized(300, 1080),
            wide: Frame::sized(1920, 300),
            placeholder_title: "Window".into(),
        }
    }
}

impl GeometryConfig {
    pub fn frame(&self, mode: GeometryMode) -> Frame {
        match mode {
            GeometryMode::Tall => self.tall,
            GeometryMode::Thin => self.thin,
            GeometryMode::Wide => self.wide,
            GeometryMode::Gameplay => self.gameplay,
        }
    }
}

/// Instance discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// A process is a candidate if any argument contains one of these.
    pub main_class_markers: Vec<String>,
    /// Prefix of the argument naming the native library directory.
    pub library_path_prefix: String,
    /// Interval between registry reconciliations (ms).
    pub poll_interval_ms: u64,
    /// State-output file, relative to the working path.
    pub state_file: String,
    /// Boundless helper port marker, relative to the working path.
    pub port_file: String,
    /// Game log whose creation time invalidates older port markers.
    pub log_file: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            main_class_markers: vec![
                "net.minecraft.client.main.Main".into(),
                "org.prismlauncher.EntryPoint".into(),
                "org.multimc.EntryPoint".into(),
            ],
            library_path_prefix: "-Djava.library.path=".into(),
            poll_interval_ms: 2000,
            state_file: "wpstateout.txt".into(),
            port_file: "boundless_port.txt".into(),
            log_file: "logs/latest.log".into(),
        }
    }
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }
}

/// Geometry RPC settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Deadline for connect, write and read, each (ms).
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { timeout_ms: 1000 }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_full_config() {
        let json = r#"{
            "keys": {
                "reset": "F13",
                "toggle_thin": "F14",
                "run": "space",
                "lock": null
            },
            "reset": {
                "mode": "Multi",
                "check_state": false,
                "hide_windows": true,
                "reset_key": "F7",
                "open_extra_key": "F3"
            },
            "geometry": {
                "thin": "280x1000",
                "gameplay": { "x": 0, "y": 0, "width": 2560, "height": 1440 }
            },
            "discovery": { "poll_interval_ms": 500, "state_file": "state.txt" },
            "rpc": { "timeout_ms": 250 }
        }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.keys.reset, Some(Key::new("F13")));
        assert_eq!(cfg.keys.toggle_thin, Some(Key::new("F14")));
        assert_eq!(cfg.keys.run, Some(Key::new("space")));
        assert_eq!(cfg.keys.lock, None);
        assert_eq!(cfg.keys.toggle_wide, None);
        assert_eq!(cfg.reset.mode, ResetMode::Multi);
        assert!(!cfg.reset.check_state);
        assert!(cfg.reset.hide_windows);
        assert_eq!(cfg.reset.reset_key, Key::new("F7"));
        assert_eq!(cfg.reset.escape_key, Key::new("Escape"));
        assert_eq!(cfg.reset.open_extra_key, Some(Key::new("F3")));
        assert_eq!(cfg.geometry.thin, Frame::sized(280, 1000));
        assert_eq!(cfg.geometry.gameplay, Frame::at(0, 0, 2560, 1440));
        assert_eq!(cfg.geometry.tall, GeometryConfig::default().tall);
        assert_eq!(cfg.discovery.poll_interval_ms, 500);
        assert_eq!(cfg.discovery.state_file, "state.txt");
        assert_eq!(cfg.discovery.port_file, "boundless_port.txt");
        assert_eq!(cfg.rpc.timeout_ms, 250);
    }

    #[test]
    fn deserialize_empty_uses_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.keys, KeyBindings::default());
        assert_eq!(cfg.reset, ResetConfig::default());
        assert_eq!(cfg.geometry, GeometryConfig::default());
        assert_eq!(cfg.discovery, DiscoveryConfig::default());
        assert_eq!(cfg.rpc, RpcConfig::default());
        assert_eq!(cfg.reset.mode, ResetMode::Wall);
        assert!(cfg.reset.check_state);
    }

    #[test]
    fn unknown_top_level_keys_ignored() {
        let json = r#"{ "keys": {}, "profiles": { "ranked": 1 } }"#;
        let _cfg: Config = serde_json::from_str(json).unwrap();
    }

    #[test]
    fn geometry_frame_lookup() {
        let g = GeometryConfig::default();
        assert_eq!(g.frame(GeometryMode::Tall), g.tall);
        assert_eq!(g.frame(GeometryMode::Gameplay), g.gameplay);
    }

    #[test]
    fn poll_interval_has_floor() {
        let d = DiscoveryConfig {
            poll_interval_ms: 0,
            ..DiscoveryConfig::default()
        };
        assert_eq!(d.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/resetwall.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
