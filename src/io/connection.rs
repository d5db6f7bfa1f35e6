use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::mpsc;

use crate::dialect::Dialect;
use crate::error::{Result, SyncError};
use crate::protocol::{Frame, Parser};
use crate::utils::SharedCloser;

/// Opaque identity of a connection.
///
/// Used as the value of learned routes and as the key of the router's
/// connection map. A UDP server spawns one key per learned remote peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionKey {
    /// The in-process local connection.
    Local,
    /// A remote peer of a UDP server socket.
    UdpPeer {
        /// Local address the server socket is bound to.
        bind_addr: SocketAddr,
        /// Address of the remote peer.
        peer_addr: SocketAddr,
    },
    /// A UDP client socket with a fixed remote.
    UdpOut {
        /// Address of the remote.
        remote_addr: SocketAddr,
    },
    /// A TCP client connection.
    TcpOut {
        /// Address of the remote.
        remote_addr: SocketAddr,
    },
    /// A serial device.
    Serial {
        /// Device path.
        path: String,
    },
}

/// Information about a connection.
///
/// Rendered into the `[{info:?}]` prefix of transport and router log
/// messages.
#[derive(Clone)]
pub enum ConnectionInfo {
    /// The in-process local connection.
    Local,
    /// UDP server socket.
    UdpIn {
        /// Local address the socket is bound to.
        bind_addr: SocketAddr,
    },
    /// A remote peer of a UDP server socket.
    UdpPeer {
        /// Local address the server socket is bound to.
        bind_addr: SocketAddr,
        /// Address of the remote peer.
        peer_addr: SocketAddr,
    },
    /// UDP client.
    UdpOut {
        /// Address of the remote.
        remote_addr: SocketAddr,
    },
    /// TCP client.
    TcpOut {
        /// Address of the remote.
        remote_addr: SocketAddr,
    },
    /// Serial device.
    Serial {
        /// Device path.
        path: String,
        /// Baud rate.
        baud_rate: u32,
    },
}

impl Debug for ConnectionInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionInfo::Local => write!(f, "local"),
            ConnectionInfo::UdpIn { bind_addr } => write!(f, "udpin:{bind_addr}"),
            ConnectionInfo::UdpPeer {
                bind_addr,
                peer_addr,
            } => write!(f, "udpin:{bind_addr}/{peer_addr}"),
            ConnectionInfo::UdpOut { remote_addr } => write!(f, "udpout:{remote_addr}"),
            ConnectionInfo::TcpOut { remote_addr } => write!(f, "tcpout:{remote_addr}"),
            ConnectionInfo::Serial { path, baud_rate } => write!(f, "serial:{path}:{baud_rate}"),
        }
    }
}

/// Per-connection state owned by the router loop.
///
/// Each variant carries the framing parser for its inbound byte stream and
/// the sender feeding the connection's writer thread. The local connection
/// is not represented here: it has no parser and is handled by the router
/// directly.
pub(crate) enum Connection<D: Dialect> {
    /// A remote peer of a UDP server socket.
    UdpPeer {
        info: ConnectionInfo,
        parser: Parser<D>,
        writer: mpsc::Sender<Vec<u8>>,
        state: SharedCloser,
    },
    /// UDP client with a fixed remote.
    UdpOut {
        info: ConnectionInfo,
        parser: Parser<D>,
        writer: mpsc::Sender<Vec<u8>>,
        state: SharedCloser,
    },
    /// TCP client.
    TcpOut {
        info: ConnectionInfo,
        parser: Parser<D>,
        writer: mpsc::Sender<Vec<u8>>,
        state: SharedCloser,
    },
    /// Serial device.
    Serial {
        info: ConnectionInfo,
        parser: Parser<D>,
        writer: mpsc::Sender<Vec<u8>>,
        state: SharedCloser,
    },
}

impl<D: Dialect> Connection<D> {
    pub(crate) fn info(&self) -> &ConnectionInfo {
        match self {
            Connection::UdpPeer { info, .. }
            | Connection::UdpOut { info, .. }
            | Connection::TcpOut { info, .. }
            | Connection::Serial { info, .. } => info,
        }
    }

    fn writer(&self) -> &mpsc::Sender<Vec<u8>> {
        match self {
            Connection::UdpPeer { writer, .. }
            | Connection::UdpOut { writer, .. }
            | Connection::TcpOut { writer, .. }
            | Connection::Serial { writer, .. } => writer,
        }
    }

    fn state(&self) -> &SharedCloser {
        match self {
            Connection::UdpPeer { state, .. }
            | Connection::UdpOut { state, .. }
            | Connection::TcpOut { state, .. }
            | Connection::Serial { state, .. } => state,
        }
    }

    /// Feeds an inbound byte event into the connection's parser.
    ///
    /// Dropped frames only advance parser state; completed valid frames are
    /// returned in arrival order.
    pub(crate) fn on_bytes(&mut self, bytes: &[u8]) -> Vec<Frame<D::Message>> {
        let info = self.info().clone();
        let parser = match self {
            Connection::UdpPeer { parser, .. }
            | Connection::UdpOut { parser, .. }
            | Connection::TcpOut { parser, .. }
            | Connection::Serial { parser, .. } => parser,
        };
        parser.consume(bytes, |err| {
            log::debug!("[{info:?}] frame dropped: {err:?}");
        })
    }

    /// Hands serialized frame bytes to the connection's writer.
    pub(crate) fn forward(&self, bytes: Vec<u8>) -> Result<()> {
        self.writer()
            .send(bytes)
            .map_err(|_| SyncError::Disconnected.into())
    }

    /// Closes the connection state, stopping its worker threads.
    pub(crate) fn close(&self) {
        self.state().close();
    }

    /// Returns `true` for transports that reconnect after a failure.
    ///
    /// UDP sockets are connectionless and never reconnect.
    pub(crate) fn is_repairable(&self) -> bool {
        matches!(self, Connection::TcpOut { .. } | Connection::Serial { .. })
    }
}
