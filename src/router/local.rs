use std::fmt::{Debug, Formatter};
use std::sync::mpsc;

use crate::dialect::{Dialect, Message};
use crate::error::{RecvError, RecvTimeoutError, SpecError, TryRecvError};
use crate::protocol::{ComponentId, Frame, MessageId, Sequence, SystemId};
use crate::utils::{Closable, Closer, UniqueId};

/// Standing subscription query.
///
/// All fields default to wildcards: [`Query::any`] matches every routed
/// frame. Identifier fields treat `0` as "any", following the MAVLink
/// broadcast convention.
///
/// ```rust
/// use mavroute::router::Query;
///
/// let query = Query::any().message("HEARTBEAT").source_system(1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Query {
    message_type: Option<MessageType>,
    source_system: SystemId,
    source_component: ComponentId,
    target_system: SystemId,
    target_component: ComponentId,
    as_frame: bool,
}

/// Message type selector of a [`Query`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A named dialect message, e.g. `HEARTBEAT`.
    Named(String),
    /// Frames whose payload did not decode into a dialect message.
    Unknown,
}

impl Query {
    /// A query that matches every routed frame.
    pub fn any() -> Self {
        Self::default()
    }

    /// Match only the named message type.
    pub fn message(mut self, name: impl Into<String>) -> Self {
        self.message_type = Some(MessageType::Named(name.into()));
        self
    }

    /// Match only frames whose payload did not decode.
    pub fn unknown_messages(mut self) -> Self {
        self.message_type = Some(MessageType::Unknown);
        self
    }

    /// Match only frames from the given source system (`0` for any).
    pub fn source_system(mut self, system: SystemId) -> Self {
        self.source_system = system;
        self
    }

    /// Match only frames from the given source component (`0` for any).
    pub fn source_component(mut self, component: ComponentId) -> Self {
        self.source_component = component;
        self
    }

    /// Match only frames targeted at the given system (`0` for any).
    pub fn target_system(mut self, system: SystemId) -> Self {
        self.target_system = system;
        self
    }

    /// Match only frames targeted at the given component (`0` for any).
    pub fn target_component(mut self, component: ComponentId) -> Self {
        self.target_component = component;
        self
    }

    /// Deliver the whole [`Frame`] instead of the decoded message.
    pub fn as_frame(mut self) -> Self {
        self.as_frame = true;
        self
    }

    /// Checks the query against a dialect.
    ///
    /// Fails with [`SpecError::UnknownMessageType`] when the query names a
    /// message type the dialect does not define.
    pub(crate) fn validate<D: Dialect>(&self) -> Result<(), SpecError> {
        if let Some(MessageType::Named(name)) = &self.message_type {
            if D::message_id_from_name(name).is_none() {
                return Err(SpecError::UnknownMessageType(name.clone(), D::name()));
            }
        }
        Ok(())
    }

    /// Returns `true` if the frame satisfies every field of the query.
    pub(crate) fn matches<M: Message>(&self, frame: &Frame<M>) -> bool {
        match &self.message_type {
            None => {}
            Some(MessageType::Unknown) => {
                if frame.message.is_some() {
                    return false;
                }
            }
            Some(MessageType::Named(name)) => match &frame.message {
                Some(message) if message.message_name() == name.as_str() => {}
                _ => return false,
            },
        }

        if self.source_system != 0 && self.source_system != frame.system_id {
            return false;
        }
        if self.source_component != 0 && self.source_component != frame.component_id {
            return false;
        }

        if self.target_system != 0 && frame.target.system() != Some(self.target_system) {
            return false;
        }
        if self.target_component != 0 && frame.target.component() != Some(self.target_component) {
            return false;
        }

        true
    }
}

/// A frame delivered to a subscriber.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery<M> {
    /// The decoded message.
    Message(M),
    /// Sentinel for frames whose payload did not decode: carries the
    /// message `ID`.
    Unknown(MessageId),
    /// The whole frame, for subscriptions created with
    /// [`Query::as_frame`].
    Frame(Frame<M>),
}

/// Subscriber handle.
///
/// An opaque delivery endpoint registered with
/// [`Router::subscribe`](super::Router::subscribe). The handle stays valid
/// while its [`EventStream`] is alive; dropping the stream marks the handle
/// dead, and the router prunes its subscriptions.
pub struct Subscriber<M> {
    id: UniqueId,
    tx: mpsc::Sender<Delivery<M>>,
    state: Closable,
}

/// Receiving side of a subscription.
///
/// Deliveries for every query registered with the paired [`Subscriber`]
/// arrive here in the order the router processed them.
pub struct EventStream<M> {
    rx: mpsc::Receiver<Delivery<M>>,
    _closer: Closer,
}

impl<M> Subscriber<M> {
    /// Creates a connected subscriber handle and event stream pair.
    pub fn channel() -> (Subscriber<M>, EventStream<M>) {
        let (tx, rx) = mpsc::channel();
        let closer = Closer::new();
        let subscriber = Subscriber {
            id: UniqueId::new(),
            tx,
            state: closer.to_closable(),
        };
        let stream = EventStream {
            rx,
            _closer: closer,
        };
        (subscriber, stream)
    }

    pub(crate) fn id(&self) -> UniqueId {
        self.id
    }

    /// Returns `true` once the paired [`EventStream`] was dropped.
    pub(crate) fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    pub(crate) fn liveness(&self) -> Closable {
        self.state.clone()
    }

    /// Attempts to deliver; `false` means the subscriber is gone.
    pub(crate) fn deliver(&self, delivery: Delivery<M>) -> bool {
        self.tx.send(delivery).is_ok()
    }
}

impl<M> Clone for Subscriber<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
            state: self.state.clone(),
        }
    }
}

impl<M> Debug for Subscriber<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Subscriber").field(&self.id).finish()
    }
}

impl<M> EventStream<M> {
    /// Blocks until the next delivery.
    pub fn recv(&self) -> Result<Delivery<M>, RecvError> {
        self.rx.recv().map_err(RecvError::from)
    }

    /// Blocks until the next delivery or the timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Delivery<M>, RecvTimeoutError> {
        self.rx.recv_timeout(timeout).map_err(RecvTimeoutError::from)
    }

    /// Returns the next delivery if one is already pending.
    pub fn try_recv(&self) -> Result<Delivery<M>, TryRecvError> {
        self.rx.try_recv().map_err(TryRecvError::from)
    }
}

impl<M> Iterator for EventStream<M> {
    type Item = Delivery<M>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

/// The in-process local connection.
///
/// Holds the subscription set and the outbound sequence counter for frames
/// originated locally.
pub(crate) struct LocalConnection<D: Dialect> {
    pub(crate) system_id: SystemId,
    pub(crate) component_id: ComponentId,
    sequence: Sequence,
    subscriptions: Vec<(Query, Subscriber<D::Message>)>,
}

impl<D: Dialect> LocalConnection<D> {
    pub(crate) fn new(system_id: SystemId, component_id: ComponentId) -> Self {
        Self {
            system_id,
            component_id,
            sequence: 0,
            subscriptions: Vec::new(),
        }
    }

    /// Next outbound sequence number, wrapping 255 → 0.
    pub(crate) fn next_sequence(&mut self) -> Sequence {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        sequence
    }

    /// Adds a subscription. Identical `(query, subscriber)` pairs are
    /// deduplicated; returns `true` if the set changed.
    pub(crate) fn subscribe(&mut self, query: Query, subscriber: &Subscriber<D::Message>) -> bool {
        let exists = self
            .subscriptions
            .iter()
            .any(|(q, s)| *q == query && s.id() == subscriber.id());
        if exists {
            return false;
        }
        self.subscriptions.push((query, subscriber.clone()));
        true
    }

    /// Removes all subscriptions of a subscriber; returns `true` if the set
    /// changed.
    pub(crate) fn unsubscribe(&mut self, id: UniqueId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|(_, s)| s.id() != id);
        self.subscriptions.len() != before
    }

    /// Delivers a routed frame to every matching live subscriber.
    ///
    /// Dead subscribers are pruned on sight and their ids returned, so the
    /// router can tear down their remaining state.
    pub(crate) fn deliver(&mut self, frame: &Frame<D::Message>) -> Vec<UniqueId> {
        let mut dead = Vec::new();

        for (query, subscriber) in &self.subscriptions {
            if dead.contains(&subscriber.id()) {
                continue;
            }
            if subscriber.is_closed() {
                dead.push(subscriber.id());
                continue;
            }
            if !query.matches(frame) {
                continue;
            }

            let delivery = if query.as_frame {
                Delivery::Frame(frame.clone())
            } else {
                match &frame.message {
                    Some(message) => Delivery::Message(message.clone()),
                    None => Delivery::Unknown(frame.message_id),
                }
            };

            if !subscriber.deliver(delivery) {
                dead.push(subscriber.id());
            }
        }

        for id in &dead {
            self.unsubscribe(*id);
        }
        dead
    }

    pub(crate) fn subscriptions(&self) -> &[(Query, Subscriber<D::Message>)] {
        &self.subscriptions
    }
}

#[cfg(test)]
mod local_tests {
    use super::*;
    use crate::dialect::basic::{messages, BasicDialect, BasicMessage};
    use crate::protocol::{MavLinkVersion, Target};

    type Local = LocalConnection<BasicDialect>;

    fn heartbeat_frame(system_id: SystemId, component_id: ComponentId) -> Frame<BasicMessage> {
        let message = BasicMessage::Heartbeat(messages::Heartbeat {
            mavlink_version: 3,
            ..Default::default()
        });
        Frame::pack::<BasicDialect>(MavLinkVersion::V2, 0, system_id, component_id, &message)
            .unwrap()
    }

    fn command_frame(target_system: SystemId, target_component: ComponentId) -> Frame<BasicMessage> {
        let message = BasicMessage::CommandLong(messages::CommandLong {
            command: 400,
            target_system,
            target_component,
            ..Default::default()
        });
        Frame::pack::<BasicDialect>(MavLinkVersion::V2, 0, 255, 190, &message).unwrap()
    }

    fn unknown_frame() -> Frame<BasicMessage> {
        let mut frame = heartbeat_frame(1, 1);
        frame.message = None;
        frame.target = Target::Broadcast;
        frame
    }

    #[test]
    fn sequence_wraps_to_zero() {
        // Full 8-bit wrap: 255 is a valid sequence number and the counter
        // rolls over to 0 after it.
        let mut local = Local::new(255, 190);
        for expected in 0u8..=255 {
            assert_eq!(local.next_sequence(), expected);
        }
        assert_eq!(local.next_sequence(), 0);
    }

    #[test]
    fn subscriptions_are_deduplicated() {
        let mut local = Local::new(255, 190);
        let (subscriber, _stream) = Subscriber::channel();

        assert!(local.subscribe(Query::any(), &subscriber));
        assert!(!local.subscribe(Query::any(), &subscriber));
        assert!(local.subscribe(Query::any().message("HEARTBEAT"), &subscriber));
        assert_eq!(local.subscriptions().len(), 2);
    }

    #[test]
    fn subscribe_then_unsubscribe_restores_the_set() {
        let mut local = Local::new(255, 190);
        let (subscriber, _stream) = Subscriber::channel();

        local.subscribe(Query::any(), &subscriber);
        assert!(local.unsubscribe(subscriber.id()));
        assert!(local.subscriptions().is_empty());
        assert!(!local.unsubscribe(subscriber.id()));
    }

    #[test]
    fn wildcard_query_matches_everything() {
        let query = Query::any();
        assert!(query.matches(&heartbeat_frame(1, 1)));
        assert!(query.matches(&command_frame(1, 1)));
        assert!(query.matches(&unknown_frame()));
    }

    #[test]
    fn message_type_matching() {
        let query = Query::any().message("HEARTBEAT");
        assert!(query.matches(&heartbeat_frame(1, 1)));
        assert!(!query.matches(&command_frame(1, 1)));
        assert!(!query.matches(&unknown_frame()));

        let query = Query::any().unknown_messages();
        assert!(!query.matches(&heartbeat_frame(1, 1)));
        assert!(query.matches(&unknown_frame()));
    }

    #[test]
    fn source_matching_treats_zero_as_wildcard() {
        let query = Query::any().source_system(1).source_component(1);
        assert!(query.matches(&heartbeat_frame(1, 1)));
        assert!(!query.matches(&heartbeat_frame(2, 1)));
        assert!(!query.matches(&heartbeat_frame(1, 2)));

        let query = Query::any().source_system(1);
        assert!(query.matches(&heartbeat_frame(1, 42)));
    }

    #[test]
    fn target_matching_requires_a_targeted_frame() {
        // Broadcast frames carry no target: a nonzero target filter never
        // matches them.
        let query = Query::any().target_system(1);
        assert!(!query.matches(&heartbeat_frame(1, 1)));
        assert!(query.matches(&command_frame(1, 1)));
        assert!(!query.matches(&command_frame(2, 1)));

        let query = Query::any().target_component(7);
        assert!(query.matches(&command_frame(1, 7)));
        assert!(!query.matches(&command_frame(1, 1)));
    }

    #[test]
    fn query_validation_rejects_unknown_message_types() {
        assert!(Query::any().validate::<BasicDialect>().is_ok());
        assert!(Query::any()
            .message("HEARTBEAT")
            .validate::<BasicDialect>()
            .is_ok());
        assert!(matches!(
            Query::any()
                .message("NO_SUCH_MESSAGE")
                .validate::<BasicDialect>(),
            Err(SpecError::UnknownMessageType(_, _))
        ));
    }

    #[test]
    fn delivery_modes() {
        let mut local = Local::new(255, 190);
        let (messages_sub, messages_stream) = Subscriber::channel();
        let (frames_sub, frames_stream) = Subscriber::channel();

        local.subscribe(Query::any(), &messages_sub);
        local.subscribe(Query::any().as_frame(), &frames_sub);

        let frame = heartbeat_frame(1, 1);
        assert!(local.deliver(&frame).is_empty());

        assert_eq!(
            messages_stream.try_recv().unwrap(),
            Delivery::Message(frame.message.clone().unwrap())
        );
        assert_eq!(
            frames_stream.try_recv().unwrap(),
            Delivery::Frame(frame.clone())
        );

        let unknown = unknown_frame();
        local.deliver(&unknown);
        assert_eq!(
            messages_stream.try_recv().unwrap(),
            Delivery::Unknown(unknown.message_id)
        );
    }

    #[test]
    fn dead_subscribers_are_pruned_without_delivery() {
        let mut local = Local::new(255, 190);
        let (subscriber, stream) = Subscriber::channel();
        local.subscribe(Query::any(), &subscriber);

        drop(stream);
        let dead = local.deliver(&heartbeat_frame(1, 1));
        assert_eq!(dead, vec![subscriber.id()]);
        assert!(local.subscriptions().is_empty());
    }
}
