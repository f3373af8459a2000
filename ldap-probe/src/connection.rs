//! TCP connection lifecycle for one probe request.
//!
//! A Connection owns exactly one socket, is never pooled or reused,
//! and only exposes sequential send / request operations.  The raw
//! stream never leaves this module, so half-duplex use is structural
//! rather than a convention.

use super::error::Error;
use super::frame::{FrameAssembler, FrameMode};
use std::io::prelude::*;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

// Read data from the socket in chunks this size.
const READ_BUFSIZE: usize = 1024;

/// Consulted before any socket opens.  A refusal short-circuits the
/// request; this module only honors the verdict.
pub trait OriginGate {
    /// None = proceed; Some(reason) = refuse.
    fn refuse_reason(&self, host: &str, port: u16) -> Option<String>;
}

/// Wall-clock budget shared by every network step of one request.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires: Instant,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Deadline {
            expires: Instant::now() + budget,
        }
    }

    /// Time left, or the Timeout kind once expired.
    pub fn remaining(&self) -> Result<Duration, Error> {
        let now = Instant::now();
        if now >= self.expires {
            Err(Error::Timeout)
        } else {
            Ok(self.expires - now)
        }
    }
}

/// One TCP connection to a directory server.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    deadline: Deadline,
    peer: String,
}

impl Connection {
    /// Open a socket to `host:port`, racing the deadline.
    pub fn connect(host: &str, port: u16, deadline: Deadline) -> Result<Self, Error> {
        let peer = format!("{host}:{port}");
        log::debug!("Connection::connect() to {peer}");

        // DNS resolution blocks with no timeout of its own and is not
        // raced against the deadline; at least refuse to start it once
        // the budget is already spent.
        deadline.remaining()?;
        let addr = resolve(&peer)?;
        let budget = deadline.remaining()?;

        let stream = match TcpStream::connect_timeout(&addr, budget) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Err(Error::Timeout),
            Err(e) => {
                log::error!("connect({peer}) failed: {e}");
                return Err(Error::ConnectError(format!("{peer}: {e}")));
            }
        };

        Ok(Connection {
            stream,
            deadline,
            peer,
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Write one request; no response is read.  Used for Unbind.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let budget = self.deadline.remaining()?;

        if let Err(e) = self.stream.set_write_timeout(Some(budget)) {
            return Err(Error::NetworkError(e.to_string()));
        }

        log::trace!("{} OUTBOUND {} bytes", self.peer, bytes.len());

        match self.stream.write_all(bytes) {
            Ok(_) => Ok(()),
            Err(e) if would_block(&e) => Err(Error::Timeout),
            Err(e) => {
                log::error!("{} send() failed: {e}", self.peer);
                Err(Error::NetworkError(e.to_string()))
            }
        }
    }

    /// Write one request, then read until the reassembler certifies a
    /// complete response.  Strictly write-then-read; LDAP here never
    /// runs both directions at once.
    pub fn request(&mut self, bytes: &[u8], mode: FrameMode) -> Result<Vec<u8>, Error> {
        self.send(bytes)?;

        let mut assembler = FrameAssembler::new(mode);
        let mut buf = [0u8; READ_BUFSIZE];

        loop {
            let budget = self.deadline.remaining()?;

            if let Err(e) = self.stream.set_read_timeout(Some(budget)) {
                return Err(Error::NetworkError(e.to_string()));
            }

            let num_bytes = match self.stream.read(&mut buf) {
                Ok(n) => n,
                Err(e) if would_block(&e) => return Err(Error::Timeout),
                Err(e) => {
                    log::error!("{} read failed: {e}", self.peer);
                    return Err(Error::NetworkError(e.to_string()));
                }
            };

            if num_bytes == 0 {
                log::error!("{} peer closed mid-response", self.peer);
                return Err(Error::NetworkError(
                    "connection closed before response completed".to_string(),
                ));
            }

            if assembler.push(&buf[..num_bytes])? {
                log::trace!("{} INBOUND {} bytes", self.peer, assembler.len());
                return Ok(assembler.into_bytes());
            }
        }
    }

    /// Close the socket.  Errors are swallowed; a failed close must
    /// never mask the primary outcome of the request.
    pub fn disconnect(&self) {
        log::debug!("{} Connection::disconnect()", self.peer);

        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            log::debug!("{} shutdown failed: {e}", self.peer);
        }
    }
}

/// Blocking reads/writes report expiry as WouldBlock on some
/// platforms and TimedOut on others.
fn would_block(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

fn resolve(peer: &str) -> Result<SocketAddr, Error> {
    match peer.to_socket_addrs() {
        Ok(mut addrs) => addrs
            .next()
            .ok_or_else(|| Error::ConnectError(format!("{peer}: no addresses"))),
        Err(e) => Err(Error::ConnectError(format!("{peer}: {e}"))),
    }
}
