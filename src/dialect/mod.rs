//! # MAVLink dialects
//!
//! A dialect is a set of message definitions (ids, payload layouts,
//! `CRC_EXTRA` bytes) extending the common protocol. Code generators emit
//! per-dialect implementations of the [`Dialect`] trait; a compact
//! hand-written dialect for tests and examples lives in [`basic`].

use std::fmt::Debug;

use crate::error::SpecError;
use crate::protocol::{MessageId, Target};

pub mod basic;

/// A decoded MAVLink message of some dialect.
pub trait Message: Clone + Debug + PartialEq + Send + Sync + Sized + 'static {
    /// Message `ID` within the dialect.
    fn message_id(&self) -> MessageId;

    /// Canonical upper-case message name, e.g. `HEARTBEAT`.
    fn message_name(&self) -> &'static str;

    /// Addressing mode derived from the `target_system` /
    /// `target_component` payload fields, when the message defines them.
    fn target(&self) -> Target;
}

/// Bit-level knowledge of a MAVLink dialect.
///
/// This is the contract a message-definition code generator satisfies. The
/// router only ever consults the dialect through this trait: `CRC_EXTRA`
/// lookup for checksum validation, declared payload lengths for
/// zero-extension of truncated payloads, and payload codecs.
pub trait Dialect: Send + Sync + 'static {
    /// Message type of this dialect.
    type Message: Message;

    /// Dialect name.
    fn name() -> &'static str;

    /// Per-message `CRC_EXTRA` byte, or `None` for unknown message ids.
    fn crc_extra(message_id: MessageId) -> Option<u8>;

    /// Declared (untruncated) payload length, or `None` for unknown
    /// message ids.
    fn payload_length(message_id: MessageId) -> Option<u8>;

    /// Resolves a canonical message name into a message `ID`.
    fn message_id_from_name(name: &str) -> Option<MessageId>;

    /// Decodes a payload into a message.
    ///
    /// The payload is already zero-extended to the declared length.
    /// Returns `None` when the payload does not form a valid message.
    fn decode(message_id: MessageId, payload: &[u8]) -> Option<Self::Message>;

    /// Encodes a message into its canonical wire payload.
    fn encode(message: &Self::Message) -> Result<EncodedMessage, SpecError>;
}

/// Canonical wire form of an encoded message.
#[derive(Clone, Debug)]
pub struct EncodedMessage {
    /// Message `ID`.
    pub message_id: MessageId,
    /// Canonical (untruncated) payload.
    pub payload: Vec<u8>,
    /// Per-message `CRC_EXTRA` byte.
    pub crc_extra: u8,
    /// Addressing mode of the message.
    pub target: Target,
}
