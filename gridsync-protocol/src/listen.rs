//! Session establishment on the simulator side.
//!
//! The simulator listens on two well-known ports and the controller connects
//! to both; measurement traffic and command traffic never share a stream.

use std::net::{Ipv4Addr, TcpListener};

use log::info;

use crate::error::{Error, Result};
use crate::link::Link;

/// Default port for the measurement connection.
pub const MEAS_PORT: u16 = 2324;
/// Default port for the command connection.
pub const CMDS_PORT: u16 = 2325;

/// A pair of listening sockets awaiting the controller.
#[derive(Debug)]
pub struct SessionListener {
    meas: TcpListener,
    cmds: TcpListener,
}

impl SessionListener {
    /// Bind both listeners. Pass 0 for either port to let the OS pick one,
    /// which [`local_ports`](SessionListener::local_ports) then reports.
    pub fn bind(meas_port: u16, cmds_port: u16) -> Result<Self> {
        let meas = TcpListener::bind((Ipv4Addr::UNSPECIFIED, meas_port)).map_err(|source| {
            Error::Transport {
                link: "measurement listener",
                source,
            }
        })?;
        let cmds = TcpListener::bind((Ipv4Addr::UNSPECIFIED, cmds_port)).map_err(|source| {
            Error::Transport {
                link: "command listener",
                source,
            }
        })?;
        Ok(SessionListener { meas, cmds })
    }

    /// The actual bound ports, `(measurement, command)`.
    pub fn local_ports(&self) -> Result<(u16, u16)> {
        let meas = self
            .meas
            .local_addr()
            .map_err(|source| Error::Transport {
                link: "measurement listener",
                source,
            })?
            .port();
        let cmds = self
            .cmds
            .local_addr()
            .map_err(|source| Error::Transport {
                link: "command listener",
                source,
            })?
            .port();
        Ok((meas, cmds))
    }

    /// Block until the controller has connected on both ports, measurement
    /// first. The OS backlog holds an early command connection while the
    /// measurement accept is still pending, so the controller may connect in
    /// either order.
    pub fn accept(self) -> Result<(Link, Link)> {
        info!("waiting for controller on the measurement port");
        let (meas_stream, meas_peer) = self.meas.accept().map_err(|source| Error::Transport {
            link: "measurement link",
            source,
        })?;
        info!("measurement link established with {}", meas_peer);

        info!("waiting for controller on the command port");
        let (cmds_stream, cmds_peer) = self.cmds.accept().map_err(|source| Error::Transport {
            link: "command link",
            source,
        })?;
        info!("command link established with {}", cmds_peer);

        Ok((
            Link::new(meas_stream, "measurement link")?,
            Link::new(cmds_stream, "command link")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpStream;
    use std::thread;

    #[test]
    fn accepts_both_connections() {
        let listener = SessionListener::bind(0, 0).unwrap();
        let (meas_port, cmds_port) = listener.local_ports().unwrap();
        assert_ne!(meas_port, cmds_port);

        let peer = thread::spawn(move || {
            // connect command-side first to exercise the backlog
            let mut cmds = TcpStream::connect(("127.0.0.1", cmds_port)).unwrap();
            let mut meas = TcpStream::connect(("127.0.0.1", meas_port)).unwrap();
            meas.write_all(&1i32.to_ne_bytes()).unwrap();
            cmds.write_all(&2i32.to_ne_bytes()).unwrap();
        });

        let (mut meas, mut cmds) = listener.accept().unwrap();
        assert_eq!(meas.recv_i32().unwrap(), 1);
        assert_eq!(cmds.recv_i32().unwrap(), 2);
        peer.join().unwrap();
    }
}
