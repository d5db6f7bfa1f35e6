use std::io::Read;
use std::io::Write;
use std::sync::mpsc;
use std::thread;

use crate::consts::{READ_BUF_SIZE, READ_POOLING_INTERVAL};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::io::{Connection, ConnectionInfo, ConnectionKey};
use crate::protocol::Parser;
use crate::router::RouterEvent;
use crate::utils::SharedCloser;

use super::udp::is_timeout;
use super::TransportContext;

/// Brings up a serial device.
///
/// Opens the port synchronously and splits it into a reader loop and a
/// writer thread. Device errors enqueue `Closed`; the router then closes the
/// port and schedules a reconnect, which reopens it.
pub(crate) fn launch_serial<D: Dialect>(
    path: String,
    baud_rate: u32,
    ctx: TransportContext<D>,
) -> Result<()> {
    let writer = serialport::new(path.as_str(), baud_rate)
        .timeout(READ_POOLING_INTERVAL)
        .open()?;
    let reader = writer.try_clone()?;

    let key = ConnectionKey::Serial { path: path.clone() };
    let info = ConnectionInfo::Serial { path, baud_rate };
    let state = SharedCloser::new();
    let (writer_tx, writer_rx) = mpsc::channel::<Vec<u8>>();

    {
        let mut writer = writer;
        let state = state.to_closable();
        let info = info.clone();
        let key = key.clone();
        let ctx = ctx.clone();
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
                log::trace!("[{info:?}] device write failed: {err:?}");
                _ = ctx.events.send(RouterEvent::Closed(key));
                return;
            }
        });
    }

    {
        let mut reader = reader;
        let conn_state = state.to_closable();
        let key = key.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let mut buf = [0u8; READ_BUF_SIZE];
            loop {
                if conn_state.is_closed() || ctx.state.is_closed() {
                    return;
                }
                match reader.read(&mut buf) {
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

    let connection = Connection::Serial {
        info,
        parser: Parser::new(),
        writer: writer_tx,
        state,
    };
    ctx.events.send(RouterEvent::AddConnection(key, connection))?;

    Ok(())
}
