//! # MAVLink router
//!
//! The [`Router`] owns every connection, the learned route table, and the
//! local subscription engine. It is a single-consumer event loop: transport
//! workers, subscriber liveness watches, and API calls all enqueue events,
//! and one loop thread applies them to the router state in arrival order.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc;
use std::thread;

use crate::consts::{LIVENESS_POOLING_INTERVAL, ROUTER_POOLING_INTERVAL};
use crate::dialect::Dialect;
use crate::error::{Error, Result, RouterError, SpecError};
use crate::io::transport::{self, TransportContext};
use crate::io::{Connection, ConnectionKey, Endpoint};
use crate::protocol::{ComponentId, Frame, MavLinkVersion, MessageId, SystemId};
use crate::utils::{Closable, Closer, UniqueId};

mod cache;
mod local;
mod routing;

pub use cache::SubscriptionCache;
pub use local::{Delivery, EventStream, MessageType, Query, Subscriber};

use local::LocalConnection;
use routing::{select_recipients, RouteTable};

/// Events consumed by the router loop.
pub(crate) enum RouterEvent<D: Dialect> {
    /// A transport brought up a connection.
    AddConnection(ConnectionKey, Connection<D>),
    /// Inbound bytes from a transport.
    Bytes(ConnectionKey, Vec<u8>),
    /// A transport connection failed or hung up.
    Closed(ConnectionKey),
    /// Subscription request.
    Subscribe(Query, Subscriber<D::Message>),
    /// Removal of all subscriptions of a handle.
    Unsubscribe(UniqueId),
    /// A subscriber handle became un-deliverable.
    SubscriberDown(UniqueId),
    /// Locally originated outbound message.
    PackAndSend(D::Message, MavLinkVersion),
}

/// MAVLink message router handle.
///
/// Created with [`Router::builder`]. The router runs until the handle is
/// closed or dropped; its [`SubscriptionCache`] (if any) survives and lets
/// a successor router reinstall live subscriptions.
pub struct Router<D: Dialect> {
    events: mpsc::Sender<RouterEvent<D>>,
    state: Closer,
}

impl<D: Dialect> Router<D> {
    /// Creates an empty router builder.
    pub fn builder() -> RouterBuilder<D> {
        RouterBuilder::new()
    }

    /// Registers a subscription query for a subscriber handle.
    ///
    /// Idempotent: identical `(query, subscriber)` pairs are deduplicated.
    /// Fails with [`SpecError::UnknownMessageType`] when the query names a
    /// message type the dialect does not define; otherwise the request is
    /// fire-and-forget.
    pub fn subscribe(&self, query: Query, subscriber: &Subscriber<D::Message>) -> Result<()> {
        query.validate::<D>().map_err(Error::from)?;
        self.ensure_active()?;
        self.events
            .send(RouterEvent::Subscribe(query, subscriber.clone()))?;
        Ok(())
    }

    /// Removes all subscriptions of a subscriber handle.
    pub fn unsubscribe(&self, subscriber: &Subscriber<D::Message>) -> Result<()> {
        self.ensure_active()?;
        self.events
            .send(RouterEvent::Unsubscribe(subscriber.id()))?;
        Ok(())
    }

    /// Packs a message into a `MAVLink 2` frame and routes it as if it had
    /// arrived on the local connection.
    ///
    /// Targeted messages follow learned routes, broadcasts fan out to every
    /// connection, and matching local subscribers receive a copy.
    pub fn send(&self, message: &D::Message) -> Result<()> {
        self.send_versioned(message, MavLinkVersion::V2)
    }

    /// Packs a message into a frame of the given protocol version and
    /// routes it as if it had arrived on the local connection.
    ///
    /// Returns `Ok` once the outbound message is enqueued. Fails when the
    /// dialect cannot encode the message, or when a message with a wide
    /// `ID` is sent as `MAVLink 1`.
    pub fn send_versioned(&self, message: &D::Message, version: MavLinkVersion) -> Result<()> {
        let encoded = D::encode(message)?;
        if matches!(version, MavLinkVersion::V1) && encoded.message_id > MessageId::from(u8::MAX) {
            return Err(SpecError::UnsupportedMessage(encoded.message_id, version).into());
        }
        self.ensure_active()?;
        self.events
            .send(RouterEvent::PackAndSend(message.clone(), version))?;
        Ok(())
    }

    /// Returns `true` while the router loop is running.
    pub fn is_active(&self) -> bool {
        !self.state.is_closed()
    }

    /// Stops the router loop and every transport worker.
    ///
    /// Dropping the handle has the same effect.
    pub fn close(&self) {
        self.state.close();
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state.is_closed() {
            return Err(RouterError::Inactive.into());
        }
        Ok(())
    }
}

/// Builder for [`Router`].
pub struct RouterBuilder<D: Dialect> {
    system_id: SystemId,
    component_id: ComponentId,
    endpoints: Vec<Endpoint>,
    echo_local_broadcast: bool,
    cache: Option<SubscriptionCache<D::Message>>,
}

impl<D: Dialect> RouterBuilder<D> {
    fn new() -> Self {
        Self {
            system_id: 255,
            component_id: 190,
            endpoints: Vec::new(),
            echo_local_broadcast: true,
            cache: None,
        }
    }

    /// System `ID` of locally originated frames. Default: `255`.
    pub fn system_id(mut self, system_id: SystemId) -> Self {
        self.system_id = system_id;
        self
    }

    /// Component `ID` of locally originated frames. Default: `190`.
    pub fn component_id(mut self, component_id: ComponentId) -> Self {
        self.component_id = component_id;
        self
    }

    /// Adds a transport endpoint.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Controls whether locally originated broadcasts are echoed back to
    /// local subscribers. Default: `true`.
    pub fn echo_local_broadcast(mut self, echo: bool) -> Self {
        self.echo_local_broadcast = echo;
        self
    }

    /// Attaches a [`SubscriptionCache`].
    ///
    /// On start the router reinstalls the cached subscriptions whose
    /// subscribers are still alive, and keeps the cache up to date on every
    /// subscription change.
    pub fn subscription_cache(mut self, cache: &SubscriptionCache<D::Message>) -> Self {
        self.cache = Some(cache.clone());
        self
    }

    /// Launches the transports and starts the router loop.
    ///
    /// The local connection is added immediately; each transport enqueues
    /// its connection once brought up. Fails when the configuration is
    /// invalid or a transport cannot be established.
    pub fn spawn(self) -> Result<Router<D>> {
        if self.system_id == 0 || self.component_id == 0 {
            return Err(
                RouterError::Config("system and component ids must be non-zero".into()).into(),
            );
        }

        let (events_tx, events_rx) = mpsc::channel();
        let state = Closer::new();
        let ctx = TransportContext {
            events: events_tx.clone(),
            state: state.to_closable(),
        };

        for endpoint in &self.endpoints {
            transport::launch(endpoint, &ctx)?;
        }

        // Reinstall cached subscriptions, pruning the ones whose
        // subscriber died while no router was running.
        if let Some(cache) = &self.cache {
            let entries = cache.get();
            let alive: Vec<_> = entries
                .into_iter()
                .filter(|(_, subscriber)| !subscriber.is_closed())
                .collect();
            cache.set(alive.clone());
            for (query, subscriber) in alive {
                _ = events_tx.send(RouterEvent::Subscribe(query, subscriber));
            }
        }

        let router_loop = RouterLoop::<D> {
            state: state.to_closable(),
            events_tx: events_tx.clone(),
            events_rx,
            connections: HashMap::new(),
            routes: RouteTable::new(),
            local: LocalConnection::new(self.system_id, self.component_id),
            cache: self.cache,
            endpoints: self.endpoints,
            echo_local_broadcast: self.echo_local_broadcast,
            watched: HashSet::new(),
        };
        thread::spawn(move || router_loop.handle());

        Ok(Router {
            events: events_tx,
            state,
        })
    }
}

/// The router loop: single owner of all mutable router state.
struct RouterLoop<D: Dialect> {
    state: Closable,
    events_tx: mpsc::Sender<RouterEvent<D>>,
    events_rx: mpsc::Receiver<RouterEvent<D>>,
    connections: HashMap<ConnectionKey, Connection<D>>,
    routes: RouteTable,
    local: LocalConnection<D>,
    cache: Option<SubscriptionCache<D::Message>>,
    endpoints: Vec<Endpoint>,
    echo_local_broadcast: bool,
    watched: HashSet<UniqueId>,
}

impl<D: Dialect> RouterLoop<D> {
    fn handle(mut self) {
        log::info!(
            "router started: system {} component {}",
            self.local.system_id,
            self.local.component_id
        );

        while !self.state.is_closed() {
            match self.events_rx.recv_timeout(ROUTER_POOLING_INTERVAL) {
                Ok(event) => self.process(event),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        for connection in self.connections.values() {
            connection.close();
        }
        log::info!("router stopped");
    }

    fn process(&mut self, event: RouterEvent<D>) {
        match event {
            RouterEvent::AddConnection(key, connection) => self.on_add_connection(key, connection),
            RouterEvent::Bytes(key, bytes) => self.on_bytes(key, &bytes),
            RouterEvent::Closed(key) => self.on_closed(key),
            RouterEvent::Subscribe(query, subscriber) => self.on_subscribe(query, subscriber),
            RouterEvent::Unsubscribe(id) | RouterEvent::SubscriberDown(id) => {
                self.on_remove_subscriber(id)
            }
            RouterEvent::PackAndSend(message, version) => self.on_pack_and_send(message, version),
        }
    }

    fn on_add_connection(&mut self, key: ConnectionKey, connection: Connection<D>) {
        log::info!("[{:?}] connection is up", connection.info());
        if let Some(previous) = self.connections.insert(key, connection) {
            previous.close();
        }
    }

    fn on_bytes(&mut self, key: ConnectionKey, bytes: &[u8]) {
        let Some(connection) = self.connections.get_mut(&key) else {
            return;
        };
        let frames = connection.on_bytes(bytes);
        for frame in frames {
            self.route(&key, frame);
        }
    }

    /// Applies the routing policy to a validated frame.
    fn route(&mut self, src: &ConnectionKey, frame: Frame<D::Message>) {
        if *src != ConnectionKey::Local {
            self.routes.learn(frame.system_id, frame.component_id, src);
        }

        let recipients = select_recipients(
            src,
            frame.target,
            &self.routes,
            self.connections.keys(),
            self.echo_local_broadcast,
        );

        if recipients.remote.is_empty() && recipients.local && *src == ConnectionKey::Local {
            log::debug!(
                "destination unreachable: {:?}, delivering locally only",
                frame.target
            );
        }

        let bytes = frame.to_bytes();
        for key in &recipients.remote {
            // Stale routes may point at closed connections; skip them.
            if let Some(connection) = self.connections.get(key) {
                if let Err(err) = connection.forward(bytes.clone()) {
                    log::debug!("[{:?}] can't forward frame: {err:?}", connection.info());
                }
            }
        }

        if recipients.local {
            for id in self.local.deliver(&frame) {
                self.on_remove_subscriber(id);
            }
        }
    }

    fn on_closed(&mut self, key: ConnectionKey) {
        let Some(connection) = self.connections.remove(&key) else {
            return;
        };
        connection.close();
        log::info!("[{:?}] connection closed", connection.info());

        if connection.is_repairable() {
            if let Some(endpoint) = self.endpoint_for(&key) {
                log::debug!("[{endpoint}] scheduling reconnect");
                transport::schedule_reconnect(
                    endpoint,
                    TransportContext {
                        events: self.events_tx.clone(),
                        state: self.state.clone(),
                    },
                );
            }
        }
    }

    fn endpoint_for(&self, key: &ConnectionKey) -> Option<Endpoint> {
        self.endpoints
            .iter()
            .find(|endpoint| match (endpoint, key) {
                (Endpoint::TcpOut { remote_addr }, ConnectionKey::TcpOut { remote_addr: k }) => {
                    remote_addr == k
                }
                (Endpoint::Serial { path, .. }, ConnectionKey::Serial { path: k }) => path == k,
                _ => false,
            })
            .cloned()
    }

    fn on_subscribe(&mut self, query: Query, subscriber: Subscriber<D::Message>) {
        if subscriber.is_closed() {
            return;
        }
        if self.local.subscribe(query, &subscriber) {
            self.persist();
        }
        if self.watched.insert(subscriber.id()) {
            self.spawn_liveness_watch(&subscriber);
        }
    }

    /// Installs a liveness watch that fires exactly once when the handle
    /// becomes un-deliverable.
    fn spawn_liveness_watch(&self, subscriber: &Subscriber<D::Message>) {
        let id = subscriber.id();
        let liveness = subscriber.liveness();
        let router_state = self.state.clone();
        let events = self.events_tx.clone();

        thread::spawn(move || loop {
            if router_state.is_closed() {
                return;
            }
            if liveness.is_closed() {
                _ = events.send(RouterEvent::SubscriberDown(id));
                return;
            }
            thread::sleep(LIVENESS_POOLING_INTERVAL);
        });
    }

    fn on_remove_subscriber(&mut self, id: UniqueId) {
        self.watched.remove(&id);
        if self.local.unsubscribe(id) {
            self.persist();
        }
    }

    fn persist(&self) {
        if let Some(cache) = &self.cache {
            cache.set(self.local.subscriptions().to_vec());
        }
    }

    fn on_pack_and_send(&mut self, message: D::Message, version: MavLinkVersion) {
        let sequence = self.local.next_sequence();
        match Frame::pack::<D>(
            version,
            sequence,
            self.local.system_id,
            self.local.component_id,
            &message,
        ) {
            Ok(frame) => self.route(&ConnectionKey::Local, frame),
            Err(err) => log::debug!("can't pack outbound message: {err:?}"),
        }
    }
}
