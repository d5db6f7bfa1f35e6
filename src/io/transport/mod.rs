//! # Transport workers
//!
//! Each transport runs on its own threads and communicates with the router
//! loop exclusively through events: a successful bring-up enqueues
//! `AddConnection`, inbound data arrives as `Bytes`, and failures surface
//! as `Closed`. Workers never call into the router synchronously.

use std::sync::mpsc;
use std::thread;

use crate::consts::RECONNECT_INTERVAL;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::io::Endpoint;
use crate::router::RouterEvent;
use crate::utils::Closable;

pub(crate) mod serial;
pub(crate) mod tcp;
pub(crate) mod udp;

/// Handles a transport worker needs to talk back to the router loop.
pub(crate) struct TransportContext<D: Dialect> {
    /// Router event queue.
    pub(crate) events: mpsc::Sender<RouterEvent<D>>,
    /// Router-wide state: workers stop once the router is closed.
    pub(crate) state: Closable,
}

impl<D: Dialect> Clone for TransportContext<D> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            state: self.state.clone(),
        }
    }
}

/// Brings up the transport described by `endpoint`.
///
/// Establishes the underlying resource synchronously, then spawns reader
/// and writer threads. For connection-oriented transports an
/// `AddConnection` event is enqueued immediately; a UDP server enqueues one
/// per discovered peer instead.
pub(crate) fn launch<D: Dialect>(endpoint: &Endpoint, ctx: &TransportContext<D>) -> Result<()> {
    match endpoint {
        Endpoint::UdpIn { bind_addr } => udp::launch_udp_in(*bind_addr, ctx.clone()),
        Endpoint::UdpOut { remote_addr } => udp::launch_udp_out(*remote_addr, ctx.clone()),
        Endpoint::TcpOut { remote_addr } => tcp::launch_tcp_out(*remote_addr, ctx.clone()),
        Endpoint::Serial { path, baud_rate } => {
            serial::launch_serial(path.clone(), *baud_rate, ctx.clone())
        }
    }
}

/// Spawns a reconnect loop for a repairable transport.
///
/// Retries with a fixed delay and no upper bound on the attempt count,
/// until the transport comes up again or the router is closed.
pub(crate) fn schedule_reconnect<D: Dialect>(endpoint: Endpoint, ctx: TransportContext<D>) {
    thread::spawn(move || loop {
        thread::sleep(RECONNECT_INTERVAL);
        if ctx.state.is_closed() {
            return;
        }
        match launch(&endpoint, &ctx) {
            Ok(()) => {
                log::info!("[{endpoint}] transport reconnected");
                return;
            }
            Err(err) => {
                log::debug!("[{endpoint}] reconnect attempt failed: {err:?}");
            }
        }
    });
}
