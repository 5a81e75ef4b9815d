//! Per-instance state tracking.
//!
//! Instances publish their state by rewriting a tiny file in their working
//! directory.  [`StateMachine::update_state`] is the only way an
//! [`Instance`]'s state changes; the readiness predicates used by the
//! orchestrator live here as well.

use crate::instance::{Instance, InstanceState, PendingCheck};
use crate::traits::StateReader;
use log::{debug, trace};
use std::io::Read;

/// Reads at most this many bytes of a state file.
const MAX_STATE_BYTES: u64 = 64;

/// [`StateReader`] backed by `<working_path>/<file_name>`.
#[derive(Debug, Clone)]
pub struct FileStateReader {
    file_name: String,
}

impl FileStateReader {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl StateReader for FileStateReader {
    type Error = std::io::Error;

    fn read_state(&self, instance: &Instance) -> Result<Vec<u8>, Self::Error> {
        let path = instance.working_path.join(&self.file_name);
        let mut buf = Vec::with_capacity(MAX_STATE_BYTES as usize);
        std::fs::File::open(path)?
            .take(MAX_STATE_BYTES)
            .read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Decodes instance state and answers readiness questions.
pub struct StateMachine<S: StateReader> {
    reader: S,
    check_state: bool,
}

impl<S: StateReader> StateMachine<S> {
    /// `check_state = false` makes every instance ready and (if unlocked)
    /// resettable regardless of what it reports.
    pub fn new(reader: S, check_state: bool) -> Self {
        Self {
            reader,
            check_state,
        }
    }

    pub fn check_state(&self) -> bool {
        self.check_state
    }

    pub fn reader(&self) -> &S {
        &self.reader
    }

    /// Refresh `instance`'s state from its state file.
    ///
    /// Without `force`, instances with no pending check are skipped without
    /// any I/O.  Read failures and undecodable content leave the state
    /// untouched.  Returns whether the state changed.
    pub fn update_state(&self, instance: &mut Instance, force: bool) -> bool {
        if !force && instance.pending == PendingCheck::None {
            return false;
        }

        let content = match self.reader.read_state(instance) {
            Ok(c) => c,
            Err(e) => {
                debug!("instance {}: state read failed: {}", instance.number, e);
                return false;
            }
        };

        let Some(state) = InstanceState::decode(&content) else {
            trace!(
                "instance {}: undecodable state {:?}",
                instance.number,
                String::from_utf8_lossy(&content)
            );
            return false;
        };

        let changed = instance.record_state(state);
        if changed {
            debug!("instance {}: state -> {}", instance.number, state);
        }
        changed
    }

    /// Safe to switch into: paused or unpaused in a world.
    pub fn is_ready(&self, instance: &Instance) -> bool {
        !self.check_state
            || matches!(
                instance.state(),
                Some(InstanceState::Paused) | Some(InstanceState::Unpaused)
            )
    }

    /// Unlocked and not in the middle of creating a world.
    pub fn is_resettable(&self, instance: &Instance) -> bool {
        if instance.locked {
            return false;
        }
        !self.check_state
            || !matches!(
                instance.state(),
                Some(InstanceState::Waiting) | Some(InstanceState::Generating)
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::ProcessId;
    use std::cell::Cell;
    use std::io;

    /// Serves fixed bytes and counts reads.
    struct FixedReader {
        content: Option<Vec<u8>>,
        reads: Cell<usize>,
    }

    impl FixedReader {
        fn new(content: Option<&[u8]>) -> Self {
            Self {
                content: content.map(<[u8]>::to_vec),
                reads: Cell::new(0),
            }
        }
    }

    impl StateReader for FixedReader {
        type Error = io::Error;

        fn read_state(&self, _: &Instance) -> Result<Vec<u8>, io::Error> {
            self.reads.set(self.reads.get() + 1);
            self.content
                .clone()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no state file"))
        }
    }

    fn inst() -> Instance {
        Instance::new(ProcessId(10), 1, "/tmp/none")
    }

    #[test]
    fn skips_io_without_pending_check() {
        let sm = StateMachine::new(FixedReader::new(Some(b"a")), true);
        let mut i = inst();
        assert!(!sm.update_state(&mut i, false));
        assert_eq!(sm.reader.reads.get(), 0);
        assert_eq!(i.state(), None);
    }

    #[test]
    fn forced_update_decodes_and_reports_change() {
        let sm = StateMachine::new(FixedReader::new(Some(b"a")), true);
        let mut i = inst();
        assert!(sm.update_state(&mut i, true));
        assert_eq!(i.state(), Some(InstanceState::Unpaused));
        assert!(!sm.update_state(&mut i, true), "same state is not a change");
        assert_eq!(sm.reader.reads.get(), 2);
    }

    #[test]
    fn pending_check_enables_unforced_update() {
        let sm = StateMachine::new(FixedReader::new(Some(b"generating,10")), true);
        let mut i = inst();
        i.pending = PendingCheck::Generating;
        assert!(sm.update_state(&mut i, false));
        assert_eq!(i.state(), Some(InstanceState::Generating));
    }

    #[test]
    fn extended_record_decodes_generating() {
        let mut buf = vec![0x69u8; 12];
        buf[11] = 0x67;
        let sm = StateMachine::new(FixedReader::new(Some(&buf)), true);
        let mut i = inst();
        assert!(sm.update_state(&mut i, true));
        assert_eq!(i.state(), Some(InstanceState::Generating));
    }

    #[test]
    fn empty_file_leaves_state_and_returns_false() {
        let sm = StateMachine::new(FixedReader::new(Some(b"")), true);
        let mut i = inst();
        i.record_state(InstanceState::Paused);
        assert!(!sm.update_state(&mut i, true));
        assert_eq!(i.state(), Some(InstanceState::Paused));
    }

    #[test]
    fn read_failure_leaves_state_and_returns_false() {
        let sm = StateMachine::new(FixedReader::new(None), true);
        let mut i = inst();
        i.record_state(InstanceState::Title);
        assert!(!sm.update_state(&mut i, true));
        assert_eq!(i.state(), Some(InstanceState::Title));
    }

    #[test]
    fn ready_only_in_world() {
        let sm = StateMachine::new(FixedReader::new(None), true);
        let mut i = inst();
        assert!(!sm.is_ready(&i), "unknown state is not ready");
        for (state, ready) in [
            (InstanceState::Paused, true),
            (InstanceState::Unpaused, true),
            (InstanceState::Previewing, false),
            (InstanceState::Generating, false),
            (InstanceState::Title, false),
            (InstanceState::InGameScreen, false),
            (InstanceState::Waiting, false),
        ] {
            i.record_state(state);
            assert_eq!(sm.is_ready(&i), ready, "{}", state);
        }
    }

    #[test]
    fn resettable_excludes_locked_and_world_creation() {
        let sm = StateMachine::new(FixedReader::new(None), true);
        let mut i = inst();
        assert!(sm.is_resettable(&i));
        i.record_state(InstanceState::Generating);
        assert!(!sm.is_resettable(&i));
        i.record_state(InstanceState::Waiting);
        assert!(!sm.is_resettable(&i));
        i.record_state(InstanceState::Previewing);
        assert!(sm.is_resettable(&i));
        i.locked = true;
        assert!(!sm.is_resettable(&i));
    }

    #[test]
    fn disabled_checking_ignores_state_but_not_lock() {
        let sm = StateMachine::new(FixedReader::new(None), false);
        let mut i = inst();
        i.record_state(InstanceState::Generating);
        assert!(sm.is_ready(&i));
        assert!(sm.is_resettable(&i));
        i.locked = true;
        assert!(!sm.is_resettable(&i));
    }

    #[test]
    fn file_reader_reads_working_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wpstateout.txt"), "inworld,paused").unwrap();
        let reader = FileStateReader::new("wpstateout.txt");
        let i = Instance::new(ProcessId(1), 1, dir.path());
        assert_eq!(reader.read_state(&i).unwrap(), b"inworld,paused");

        let missing = Instance::new(ProcessId(2), 2, dir.path().join("nope"));
        assert!(reader.read_state(&missing).is_err());
    }
}
