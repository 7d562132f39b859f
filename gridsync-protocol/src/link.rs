//! One direction of the session: a named TCP stream with exact-length
//! transfers and deadline-bounded readiness probes.
//!
//! Values travel in host byte order, 4 bytes per `i32` and 8 per `f64`,
//! with no framing beyond what the protocol state machine implies.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

/// Which way a readiness probe looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// A connected stream plus the name it is reported under in errors and logs.
#[derive(Debug)]
pub struct Link {
    stream: TcpStream,
    name: &'static str,
}

impl Link {
    /// Wrap an accepted or connected stream. Nagle is disabled so the small
    /// per-interval messages go out immediately.
    pub fn new(stream: TcpStream, name: &'static str) -> Result<Self> {
        stream
            .set_nodelay(true)
            .map_err(|source| Error::Transport { link: name, source })?;
        Ok(Link { stream, name })
    }

    /// Connect to `addr` and wrap the resulting stream.
    pub fn connect<A: ToSocketAddrs>(addr: A, name: &'static str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|source| Error::Transport { link: name, source })?;
        Link::new(stream, name)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn fail(&self, source: io::Error) -> Error {
        Error::Transport {
            link: self.name,
            source,
        }
    }

    /// Fill `buf` completely, looping over short reads. A connection closed
    /// mid-message surfaces as a transport failure.
    pub fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut read = 0;
        while read < buf.len() {
            match self.stream.read(&mut buf[read..]) {
                Ok(0) => {
                    return Err(self.fail(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed by peer",
                    )))
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.fail(e)),
            }
        }
        Ok(())
    }

    /// Write `buf` completely, looping over short writes.
    pub fn send_exact(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            match self.stream.write(&buf[written..]) {
                Ok(0) => {
                    return Err(self.fail(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection refused further data",
                    )))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(self.fail(e)),
            }
        }
        Ok(())
    }

    pub fn recv_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.recv_exact(&mut buf)?;
        Ok(i32::from_ne_bytes(buf))
    }

    pub fn recv_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.recv_exact(&mut buf)?;
        Ok(f64::from_ne_bytes(buf))
    }

    pub fn send_i32(&mut self, value: i32) -> Result<()> {
        self.send_exact(&value.to_ne_bytes())
    }

    pub fn send_f64(&mut self, value: f64) -> Result<()> {
        self.send_exact(&value.to_ne_bytes())
    }

    /// Probe whether the stream is ready for `direction` within
    /// `deadline_ms`, without consuming any data.
    ///
    /// Read readiness uses `peek` under a read timeout (or a non-blocking
    /// probe when the deadline is zero). A peek that sees the peer's close
    /// still reports ready; the following `recv_exact` surfaces the close as
    /// a transport failure. Write readiness checks for a pending socket
    /// error, since a connected TCP stream is otherwise writable.
    pub fn poll_ready(&mut self, deadline_ms: u64, direction: Direction) -> Result<bool> {
        match direction {
            Direction::Read => self.poll_readable(deadline_ms),
            Direction::Write => self.poll_writable(),
        }
    }

    fn poll_readable(&mut self, deadline_ms: u64) -> Result<bool> {
        let mut probe = [0u8; 1];
        let outcome = if deadline_ms == 0 {
            self.stream
                .set_nonblocking(true)
                .map_err(|e| self.fail(e))?;
            let r = self.stream.peek(&mut probe);
            self.stream
                .set_nonblocking(false)
                .map_err(|e| self.fail(e))?;
            r
        } else {
            self.stream
                .set_read_timeout(Some(Duration::from_millis(deadline_ms)))
                .map_err(|e| self.fail(e))?;
            let r = self.stream.peek(&mut probe);
            self.stream
                .set_read_timeout(None)
                .map_err(|e| self.fail(e))?;
            r
        };
        match outcome {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                debug!("{}: not readable within {} ms", self.name, deadline_ms);
                Ok(false)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn poll_writable(&mut self) -> Result<bool> {
        match self.stream.take_error() {
            Ok(None) => Ok(true),
            Ok(Some(pending)) => {
                debug!("{}: pending socket error: {}", self.name, pending);
                Ok(false)
            }
            Err(e) => Err(self.fail(e)),
        }
    }
}
