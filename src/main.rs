//! Entry point for the **resetwall** daemon.
//!
//! Spawns the Unix-socket listener and the reconcile ticker on background
//! threads and processes incoming commands on the main thread, which owns
//! the [`ResetOrchestrator`](resetwall::orchestrator::ResetOrchestrator).

use resetwall::command::Command;
use resetwall::config::Config;
use resetwall::geometry::GeometryController;
use resetwall::ipc::boundless::BoundlessClient;
use resetwall::ipc::listener::UnixSocketListener;
use resetwall::ipc::ticker::Ticker;
use resetwall::orchestrator::ResetOrchestrator;
use resetwall::platform::linux::ProcFs;
use resetwall::platform::x11::Xdotool;
use resetwall::registry::InstanceRegistry;
use resetwall::router::KeyEventRouter;
use resetwall::state::{FileStateReader, StateMachine};
use resetwall::traits::{CommandSource, InstanceEvent};
use log::{error, info};
use std::sync::mpsc;

/// Default socket path for the command listener.
fn default_socket_path() -> String {
    let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
    format!("{}/resetwall.sock", runtime)
}

/// Resolve the config directory (`$XDG_CONFIG_HOME/resetwall`).
fn config_dir() -> std::path::PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    std::path::PathBuf::from(base).join("resetwall")
}

/// Try to load the config from `$XDG_CONFIG_HOME/resetwall/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

//  Main

fn main() {
    env_logger::init();

    let config = load_config();
    let router = KeyEventRouter::new(config.keys.clone());

    let x11 = Xdotool::new(config.geometry.placeholder_title.clone());
    let geometry = GeometryController::new(
        x11.clone(),
        BoundlessClient::new(config.rpc.timeout()),
        config.geometry.gameplay,
        config.geometry.placeholder_title.clone(),
    );
    let mut orchestrator = ResetOrchestrator::new(
        InstanceRegistry::new(ProcFs::default(), config.discovery.clone()),
        StateMachine::new(
            FileStateReader::new(config.discovery.state_file.clone()),
            config.reset.check_state,
        ),
        geometry,
        x11,
        config.reset.clone(),
        config.geometry.clone(),
    );
    info!("reset mode: {}", orchestrator.mode());

    let (event_tx, event_rx) = mpsc::channel::<InstanceEvent>();
    orchestrator.set_events(event_tx);
    spawn_event_logger(event_rx);

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    spawn_command_sources(cmd_tx, &config);

    info!("resetwall running");
    for cmd in cmd_rx {
        let Some(intent) = router.route(cmd) else {
            continue;
        };
        if let Err(e) = orchestrator.handle(intent) {
            error!("command error: {}", e);
        }
    }
    info!("all command sources closed, exiting");
}

//  Helpers

fn spawn_command_sources(tx: mpsc::Sender<Command>, config: &Config) {
    {
        let tx = tx.clone();
        let path = default_socket_path();
        std::thread::spawn(move || {
            let mut source = UnixSocketListener::new(&path);
            if let Err(e) = source.run(tx) {
                error!("socket listener error: {}", e);
            }
        });
    }

    let interval = config.discovery.poll_interval();
    std::thread::spawn(move || {
        let mut source = Ticker::new(interval);
        if let Err(e) = source.run(tx) {
            error!("ticker error: {}", e);
        }
    });
}

/// Stand-in for the capture collaborator: logs instance events.
fn spawn_event_logger(rx: mpsc::Receiver<InstanceEvent>) {
    std::thread::spawn(move || {
        for event in rx {
            info!("{:?}", event);
        }
    });
}
