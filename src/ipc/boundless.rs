//! Client for the boundless-window geometry helper.
//!
//! Instances running the helper listen on a loopback TCP port and accept one
//! request per connection.
//!
//! # Wire format
//!
//! ```text
//! → set <x> <y> <w> <h>\n      (an unset coordinate is sent as "~")
//! ← <one line, logged but not interpreted>
//! ```
//!
//! The connection is closed after the single response.  Requests to one
//! port are sent one after another by a worker thread, so the helper sees
//! them in the order they were issued.

use crate::command::Frame;
use crate::traits::GeometryRpc;
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::sync::mpsc;
use std::time::Duration;

/// Sent in place of a coordinate the helper should leave unchanged.
pub const PLACEHOLDER: char = '~';

/// One `set` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetRequest {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: u32,
    pub height: u32,
}

impl From<Frame> for SetRequest {
    fn from(f: Frame) -> Self {
        Self {
            x: f.x,
            y: f.y,
            width: f.width,
            height: f.height,
        }
    }
}

impl fmt::Display for SetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coord = |c: Option<i32>| c.map_or_else(|| PLACEHOLDER.to_string(), |v| v.to_string());
        write!(
            f,
            "set {} {} {} {}",
            coord(self.x),
            coord(self.y),
            self.width,
            self.height
        )
    }
}

/// Errors produced by a single geometry request.
#[derive(Debug, thiserror::Error)]
pub enum BoundlessError {
    #[error("connect to port {port}: {source}")]
    Connect {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("helper closed the connection without responding")]
    NoResponse,
}

/// Request/response client with a per-step deadline.
#[derive(Debug)]
pub struct BoundlessClient {
    timeout: Duration,
    /// One queue per helper port, drained by that port's worker.
    workers: RefCell<HashMap<u16, mpsc::Sender<SetRequest>>>,
}

impl BoundlessClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            workers: RefCell::new(HashMap::new()),
        }
    }

    /// Send `request` to `127.0.0.1:port` and return the helper's response
    /// line (without the line terminator).
    ///
    /// Blocks for at most roughly three times the configured timeout.
    pub fn request(&self, port: u16, request: &SetRequest) -> Result<String, BoundlessError> {
        exchange(self.timeout, port, request)
    }

    fn worker(&self, port: u16) -> io::Result<mpsc::Sender<SetRequest>> {
        if let Some(tx) = self.workers.borrow().get(&port) {
            return Ok(tx.clone());
        }
        let (tx, rx) = mpsc::channel::<SetRequest>();
        let timeout = self.timeout;
        std::thread::Builder::new()
            .name(format!("boundless-{}", port))
            .spawn(move || {
                for request in rx {
                    match exchange(timeout, port, &request) {
                        Ok(response) => {
                            debug!("port {}: {:?} -> {:?}", port, request.to_string(), response)
                        }
                        Err(e) => warn!("port {}: {} failed: {}", port, request, e),
                    }
                }
            })?;
        self.workers.borrow_mut().insert(port, tx.clone());
        Ok(tx)
    }
}

fn exchange(timeout: Duration, port: u16, request: &SetRequest) -> Result<String, BoundlessError> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let mut stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|source| BoundlessError::Connect { port, source })?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_read_timeout(Some(timeout))?;

    writeln!(stream, "{}", request)?;
    stream.flush()?;

    let mut line = String::new();
    let n = BufReader::new(&stream).read_line(&mut line)?;
    if n == 0 {
        return Err(BoundlessError::NoResponse);
    }
    Ok(line.trim_end().to_string())
}

impl GeometryRpc for BoundlessClient {
    type Error = io::Error;

    /// Queue the request for the port's worker thread and return.
    ///
    /// Only starting the worker can fail here; request failures are logged
    /// by the worker.
    fn send(&self, port: u16, request: &SetRequest) -> Result<(), Self::Error> {
        if self.worker(port)?.send(*request).is_ok() {
            return Ok(());
        }
        // The worker is gone; start a fresh one.
        self.workers.borrow_mut().remove(&port);
        self.worker(port)?
            .send(*request)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "boundless worker exited"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    /// Accept one connection, capture the request line, answer `reply`.
    fn one_shot_helper(reply: Option<&'static str>) -> (u16, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(&stream);
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if let Some(reply) = reply {
                (&stream).write_all(reply.as_bytes()).unwrap();
            }
            line
        });
        (port, handle)
    }

    #[test]
    fn request_line_uses_placeholder_for_unset_coordinates() {
        let req = SetRequest::from(Frame::sized(1920, 1080));
        assert_eq!(req.to_string(), "set ~ ~ 1920 1080");

        let req = SetRequest::from(Frame::at(-5, 20, 300, 1080));
        assert_eq!(req.to_string(), "set -5 20 300 1080");
    }

    #[test]
    fn request_round_trip_with_helper() {
        let (port, helper) = one_shot_helper(Some("ok\n"));
        let client = BoundlessClient::new(Duration::from_secs(2));
        let response = client
            .request(port, &SetRequest::from(Frame::sized(384, 16384)))
            .unwrap();
        assert_eq!(response, "ok");
        assert_eq!(helper.join().unwrap(), "set ~ ~ 384 16384\n");
    }

    #[test]
    fn silent_helper_is_protocol_error() {
        let (port, helper) = one_shot_helper(None);
        let client = BoundlessClient::new(Duration::from_secs(2));
        let err = client
            .request(port, &SetRequest::from(Frame::sized(10, 10)))
            .unwrap_err();
        helper.join().unwrap();
        assert!(matches!(err, BoundlessError::NoResponse | BoundlessError::Io(_)));
    }

    #[test]
    fn unreachable_port_is_connect_error() {
        // Bind then drop to get a port nothing listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = BoundlessClient::new(Duration::from_millis(200));
        let err = client
            .request(port, &SetRequest::from(Frame::sized(10, 10)))
            .unwrap_err();
        assert!(matches!(err, BoundlessError::Connect { .. }));
    }

    #[test]
    fn queued_requests_reach_helper_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let helper = std::thread::spawn(move || {
            let mut lines = Vec::new();
            for _ in 0..3 {
                let (stream, _) = listener.accept().unwrap();
                let mut line = String::new();
                BufReader::new(&stream).read_line(&mut line).unwrap();
                (&stream).write_all(b"ok\n").unwrap();
                lines.push(line.trim_end().to_string());
            }
            lines
        });

        let client = BoundlessClient::new(Duration::from_secs(2));
        for frame in [
            Frame::sized(384, 16384),
            Frame::sized(300, 1080),
            Frame::at(0, 0, 1920, 1080),
        ] {
            client.send(port, &SetRequest::from(frame)).unwrap();
        }

        assert_eq!(
            helper.join().unwrap(),
            vec!["set ~ ~ 384 16384", "set ~ ~ 300 1080", "set 0 0 1920 1080"]
        );
        assert_eq!(client.workers.borrow().len(), 1);
    }

    #[test]
    fn send_returns_before_stuck_helper_answers() {
        // Accepts but never replies.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = BoundlessClient::new(Duration::from_millis(300));

        let started = std::time::Instant::now();
        client
            .send(port, &SetRequest::from(Frame::sized(10, 10)))
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(300));
        drop(listener);
    }
}
