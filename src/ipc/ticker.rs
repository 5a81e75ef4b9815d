//! Periodic [`Command::Reconcile`] source.
//!
//! Process discovery and pending state checks are polled; the ticker is
//! what keeps them moving while no key is pressed.

use crate::command::Command;
use crate::traits::CommandSource;
use log::{debug, info};
use std::convert::Infallible;
use std::sync::mpsc;
use std::time::Duration;

pub struct Ticker {
    interval: Duration,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl CommandSource for Ticker {
    type Error = Infallible;

    /// Sends one `Reconcile` immediately, then one per interval until the
    /// receiving side goes away.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Infallible> {
        debug!("ticking every {:?}", self.interval);
        loop {
            if sink.send(Command::Reconcile).is_err() {
                info!("sink closed, ticker stopping");
                return Ok(());
            }
            std::thread::sleep(self.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_until_receiver_drops() {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let mut ticker = Ticker::new(Duration::from_millis(10));
            ticker.run(tx)
        });

        for _ in 0..3 {
            let cmd = rx.recv_timeout(Duration::from_secs(1)).unwrap();
            assert_eq!(cmd, Command::Reconcile);
        }
        drop(rx);
        assert!(handle.join().unwrap().is_ok());
    }
}
