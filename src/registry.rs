//! Discovery and bookkeeping of managed instances.
//!
//! [`InstanceRegistry::reconcile`] is the only place instances are created or
//! dropped.  It builds the next instance list off to the side and swaps it
//! in at the end, so anything holding the registry never observes a
//! half-applied diff.

use crate::config::DiscoveryConfig;
use crate::instance::{classify, Instance, ProcessId};
use crate::traits::ProcessSource;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Outcome of one [`reconcile`](InstanceRegistry::reconcile) pass.
#[derive(Debug, Default)]
pub struct Reconciled {
    /// Copies of the instances that were created.
    pub added: Vec<Instance>,
    /// The dropped instances themselves.
    pub removed: Vec<Instance>,
}

impl Reconciled {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Authoritative set of tracked instances, sorted by instance number.
pub struct InstanceRegistry<P: ProcessSource> {
    source: P,
    rules: DiscoveryConfig,
    instances: Vec<Instance>,
}

impl<P: ProcessSource> InstanceRegistry<P> {
    pub fn new(source: P, rules: DiscoveryConfig) -> Self {
        Self {
            source,
            rules,
            instances: Vec::new(),
        }
    }

    /// Re-scan the process list and apply the difference.
    ///
    /// Never fails: an enumeration error leaves the tracked set untouched,
    /// and a process whose arguments cannot be read is skipped.
    ///
    /// Untracked processes are classified again on every pass, since a
    /// launch wrapper may `exec` the game under its own pid.  Numbers parsed
    /// from launch arguments are assigned before any fallback number is
    /// handed out.
    pub fn reconcile(&mut self) -> Reconciled {
        let live: HashSet<ProcessId> = match self.source.processes() {
            Ok(pids) => pids.into_iter().collect(),
            Err(e) => {
                warn!("process enumeration failed: {}", e);
                return Reconciled::default();
            }
        };

        let (mut next, removed): (Vec<Instance>, Vec<Instance>) = self
            .instances
            .drain(..)
            .partition(|inst| live.contains(&inst.pid));

        let tracked: HashSet<ProcessId> = next.iter().map(|i| i.pid).collect();
        let mut fresh: Vec<ProcessId> = live
            .iter()
            .filter(|pid| !tracked.contains(*pid))
            .copied()
            .collect();
        fresh.sort();

        let mut candidates = Vec::new();
        for pid in fresh {
            let args = match self.source.arguments(pid) {
                Ok(a) => a,
                Err(e) => {
                    debug!("skipping pid {}: {}", pid, e);
                    continue;
                }
            };
            if let Some(identity) = classify(&args, &self.rules) {
                candidates.push((pid, identity));
            }
        }

        // Parsed numbers first, so a fallback never takes a number some
        // instance was launched with.
        let mut taken: HashSet<u32> = next.iter().map(|i| i.number).collect();
        let mut numbered = Vec::with_capacity(candidates.len());
        let mut unnumbered = Vec::new();
        for (pid, identity) in candidates {
            match identity.number {
                Some(n) if taken.insert(n) => numbered.push((pid, n, identity)),
                _ => unnumbered.push((pid, identity)),
            }
        }
        for (pid, identity) in unnumbered {
            let n = taken.iter().max().copied().unwrap_or(0) + 1;
            taken.insert(n);
            numbered.push((pid, n, identity));
        }

        let mut added = Vec::new();
        for (pid, number, identity) in numbered {
            let working_path = resolve_working_path(&identity.instance_dir);
            let remote_port = read_remote_port(&working_path, &self.rules);
            let instance = Instance::new(pid, number, working_path)
                .with_version(identity.version)
                .with_remote_port(remote_port);

            info!(
                "tracking instance {} (pid {}, {}, port {})",
                instance.number,
                pid,
                instance.working_path.display(),
                instance.remote_port
            );
            added.push(instance.clone());
            next.push(instance);
        }

        for gone in &removed {
            info!("instance {} (pid {}) exited", gone.number, gone.pid);
        }

        next.sort_by_key(|i| i.number);
        self.instances = next;

        Reconciled { added, removed }
    }

    /// The process source this registry enumerates.
    pub fn source(&self) -> &P {
        &self.source
    }

    /// Read-only view of the tracked instances, sorted by number.
    pub fn snapshot(&self) -> &[Instance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, pid: ProcessId) -> Option<&Instance> {
        self.instances.iter().find(|i| i.pid == pid)
    }

    pub fn get_mut(&mut self, pid: ProcessId) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|i| i.pid == pid)
    }

    pub fn by_number(&self, number: u32) -> Option<&Instance> {
        self.instances.iter().find(|i| i.number == number)
    }

    /// Index of `pid` in [`snapshot`](Self::snapshot) order.
    pub fn position(&self, pid: ProcessId) -> Option<usize> {
        self.instances.iter().position(|i| i.pid == pid)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Instance> {
        self.instances.iter_mut()
    }
}

/// Prefer the game directory inside the instance directory.
fn resolve_working_path(instance_dir: &Path) -> PathBuf {
    if instance_dir.as_os_str().is_empty() {
        return PathBuf::new();
    }
    [".minecraft", "minecraft"]
        .iter()
        .map(|child| instance_dir.join(child))
        .find(|p| p.is_dir())
        .unwrap_or_else(|| instance_dir.to_path_buf())
}

/// Port of the boundless helper, or `0`.
///
/// A marker older than the game log's creation belongs to a previous run of
/// the same directory and is ignored.
fn read_remote_port(working_path: &Path, rules: &DiscoveryConfig) -> u16 {
    if working_path.as_os_str().is_empty() {
        return 0;
    }
    let marker = working_path.join(&rules.port_file);
    let Ok(contents) = std::fs::read_to_string(&marker) else {
        return 0;
    };
    let Ok(port) = contents.trim().parse::<u16>() else {
        warn!("ignoring malformed port marker {}", marker.display());
        return 0;
    };

    let marker_time = std::fs::metadata(&marker).and_then(|m| m.modified()).ok();
    let log_time = log_created(&working_path.join(&rules.log_file));
    if let (Some(marker_time), Some(log_time)) = (marker_time, log_time) {
        if marker_time < log_time {
            debug!("ignoring stale port marker {}", marker.display());
            return 0;
        }
    }
    port
}

fn log_created(path: &Path) -> Option<SystemTime> {
    let meta = std::fs::metadata(path).ok()?;
    meta.created().or_else(|_| meta.modified()).ok()
}
