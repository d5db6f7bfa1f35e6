use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc;
use std::thread;

use crate::consts::{READ_BUF_SIZE, READ_POOLING_INTERVAL};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::io::{Connection, ConnectionInfo, ConnectionKey};
use crate::protocol::Parser;
use crate::router::RouterEvent;
use crate::utils::{Closable, SharedCloser};

use super::udp::is_timeout;
use super::TransportContext;

/// Brings up a TCP client.
///
/// Connects synchronously, then splits the stream into a reader loop and a
/// writer thread. EOF and stream errors enqueue `Closed`; the router
/// schedules a reconnect afterwards.
pub(crate) fn launch_tcp_out<D: Dialect>(
    remote_addr: SocketAddr,
    ctx: TransportContext<D>,
) -> Result<()> {
    let writer = TcpStream::connect(remote_addr)?;
    let reader = writer.try_clone()?;
    reader.set_read_timeout(Some(READ_POOLING_INTERVAL))?;

    let key = ConnectionKey::TcpOut { remote_addr };
    let info = ConnectionInfo::TcpOut { remote_addr };
    let state = SharedCloser::new();
    let (writer_tx, writer_rx) = mpsc::channel();

    spawn_stream_writer(
        writer,
        writer_rx,
        state.to_closable(),
        info.clone(),
        key.clone(),
        ctx.clone(),
    );
    spawn_stream_reader(reader, state.to_closable(), key.clone(), ctx.clone());

    let connection = Connection::TcpOut {
        info,
        parser: Parser::new(),
        writer: writer_tx,
        state,
    };
    ctx.events.send(RouterEvent::AddConnection(key, connection))?;

    Ok(())
}

fn spawn_stream_writer<D: Dialect>(
    mut writer: TcpStream,
    writer_rx: mpsc::Receiver<Vec<u8>>,
    state: Closable,
    info: ConnectionInfo,
    key: ConnectionKey,
    ctx: TransportContext<D>,
) {
    thread::spawn(move || loop {
        if state.is_closed() || ctx.state.is_closed() {
            return;
        }

        let data = match writer_rx.recv() {
            Ok(data) => data,
            Err(err) => {
                log::trace!("[{info:?}] writer channel is closed: {err:?}");
                return;
            }
        };
        if let Err(err) = writer.write_all(data.as_slice()) {
            log::trace!("[{info:?}] stream write failed: {err:?}");
            _ = ctx.events.send(RouterEvent::Closed(key));
            return;
        }
    });
}

fn spawn_stream_reader<D: Dialect>(
    mut reader: TcpStream,
    state: Closable,
    key: ConnectionKey,
    ctx: TransportContext<D>,
) {
    thread::spawn(move || {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            if state.is_closed() || ctx.state.is_closed() {
                return;
            }
            match reader.read(&mut buf) {
                // EOF: the remote hung up.
                Ok(0) => {
                    _ = ctx.events.send(RouterEvent::Closed(key));
                    return;
                }
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
