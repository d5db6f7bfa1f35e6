use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::mpsc;
use std::thread;

use crate::consts::{READ_BUF_SIZE, READ_POOLING_INTERVAL};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::io::{Connection, ConnectionInfo, ConnectionKey};
use crate::protocol::Parser;
use crate::router::RouterEvent;
use crate::utils::{Closable, SharedCloser};

use super::TransportContext;

/// Brings up a UDP server.
///
/// One socket, many peers: the first datagram from an unknown remote
/// registers a fresh connection (with its own parser and writer thread) for
/// that peer, and every datagram is enqueued as a byte event for the peer it
/// arrived from. UDP sockets are connectionless and never reconnect.
pub(crate) fn launch_udp_in<D: Dialect>(
    bind_addr: SocketAddr,
    ctx: TransportContext<D>,
) -> Result<()> {
    let socket = UdpSocket::bind(bind_addr)?;
    socket.set_read_timeout(Some(READ_POOLING_INTERVAL))?;
    let info = ConnectionInfo::UdpIn { bind_addr };

    thread::spawn(move || {
        if let Err(err) = listen::<D>(&socket, bind_addr, &ctx) {
            log::debug!("[{info:?}] listener stopped: {err:?}");
        }
    });

    Ok(())
}

fn listen<D: Dialect>(
    socket: &UdpSocket,
    bind_addr: SocketAddr,
    ctx: &TransportContext<D>,
) -> Result<()> {
    let mut peers: HashMap<SocketAddr, ConnectionKey> = HashMap::new();
    let mut buf = [0u8; READ_BUF_SIZE];

    loop {
        if ctx.state.is_closed() {
            return Ok(());
        }

        let (bytes_read, peer_addr) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) if is_timeout(&err) => continue,
            Err(err) => {
                for key in peers.into_values() {
                    _ = ctx.events.send(RouterEvent::Closed(key));
                }
                return Err(err.into());
            }
        };

        #[allow(clippy::map_entry)]
        if !peers.contains_key(&peer_addr) {
            let key = ConnectionKey::UdpPeer {
                bind_addr,
                peer_addr,
            };
            let info = ConnectionInfo::UdpPeer {
                bind_addr,
                peer_addr,
            };
            log::debug!("[{info:?}] new peer");

            let (writer_tx, writer_rx) = mpsc::channel();
            let state = SharedCloser::new();
            spawn_peer_writer(
                socket.try_clone()?,
                peer_addr,
                writer_rx,
                state.to_closable(),
                info.clone(),
            );

            let connection = Connection::UdpPeer {
                info,
                parser: Parser::new(),
                writer: writer_tx,
                state,
            };
            ctx.events
                .send(RouterEvent::AddConnection(key.clone(), connection))?;
            peers.insert(peer_addr, key);
        }

        let key = peers[&peer_addr].clone();
        ctx.events
            .send(RouterEvent::Bytes(key, buf[0..bytes_read].to_vec()))?;
    }
}

fn spawn_peer_writer(
    socket: UdpSocket,
    peer_addr: SocketAddr,
    writer_rx: mpsc::Receiver<Vec<u8>>,
    state: Closable,
    info: ConnectionInfo,
) {
    thread::spawn(move || loop {
        if state.is_closed() {
            return;
        }

        let data = match writer_rx.recv() {
            Ok(data) => data,
            Err(err) => {
                log::trace!("[{info:?}] writer channel is closed: {err:?}");
                return;
            }
        };
        if let Err(err) = socket.send_to(data.as_slice(), peer_addr) {
            log::trace!("[{info:?}] socket is closed: {err:?}");
            return;
        }
    });
}

/// Brings up a UDP client: one socket bound to an ephemeral port and
/// connected to a fixed remote. Never reconnects.
pub(crate) fn launch_udp_out<D: Dialect>(
    remote_addr: SocketAddr,
    ctx: TransportContext<D>,
) -> Result<()> {
    let bind_addr = match remote_addr.ip() {
        IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let socket = UdpSocket::bind(bind_addr)?;
    socket.connect(remote_addr)?;
    socket.set_read_timeout(Some(READ_POOLING_INTERVAL))?;

    let key = ConnectionKey::UdpOut { remote_addr };
    let info = ConnectionInfo::UdpOut { remote_addr };
    let state = SharedCloser::new();
    let (writer_tx, writer_rx) = mpsc::channel::<Vec<u8>>();

    {
        let socket = socket.try_clone()?;
        let state = state.to_closable();
        let info = info.clone();
        thread::spawn(move || loop {
            if state.is_closed() {
                return;
            }
            let data = match writer_rx.recv() {
                Ok(data) => data,
                Err(err) => {
                    log::trace!("[{info:?}] writer channel is closed: {err:?}");
                    return;
                }
            };
            if let Err(err) = socket.send(data.as_slice()) {
                log::trace!("[{info:?}] socket is closed: {err:?}");
                return;
            }
        });
    }

    {
        let key = key.clone();
        let conn_state = state.to_closable();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let mut buf = [0u8; READ_BUF_SIZE];
            loop {
                if ctx.state.is_closed() || conn_state.is_closed() {
                    return;
                }
                match socket.recv(&mut buf) {
                    Ok(bytes_read) => {
                        if ctx
                            .events
                            .send(RouterEvent::Bytes(key.clone(), buf[0..bytes_read].to_vec()))
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(err) if is_timeout(&err) => continue,
                    Err(_) => {
                        _ = ctx.events.send(RouterEvent::Closed(key));
                        return;
                    }
                }
            }
        });
    }

    let connection = Connection::UdpOut {
        info,
        parser: Parser::new(),
        writer: writer_tx,
        state,
    };
    ctx.events.send(RouterEvent::AddConnection(key, connection))?;

    Ok(())
}

pub(super) fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
