//! # Basic dialect
//!
//! A compact hand-written dialect covering the handful of common messages
//! the crate's tests and examples need: `HEARTBEAT`, `COMMAND_LONG`, and
//! `COMMAND_ACK`. Message ids, payload layouts, and `CRC_EXTRA` bytes match
//! the MAVLink `common` message set.

use crate::dialect::{Dialect, EncodedMessage, Message};
use crate::error::SpecError;
use crate::protocol::bytes::{Bytes, BytesMut};
use crate::protocol::{MessageId, Target};

/// Message definitions of the [`BasicDialect`].
pub mod messages {
    use super::*;

    /// `HEARTBEAT` message (`ID` 0).
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct Heartbeat {
        /// Autopilot-specific bitfield.
        pub custom_mode: u32,
        /// Vehicle or component type.
        pub mavtype: u8,
        /// Autopilot type.
        pub autopilot: u8,
        /// System mode bitmap.
        pub base_mode: u8,
        /// System status flag.
        pub system_status: u8,
        /// MAVLink version.
        pub mavlink_version: u8,
    }

    /// `COMMAND_LONG` message (`ID` 76).
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct CommandLong {
        /// Parameters 1 through 7.
        pub params: [f32; 7],
        /// Command `ID`.
        pub command: u16,
        /// System which should execute the command (`0` for broadcast).
        pub target_system: u8,
        /// Component which should execute the command (`0` for broadcast).
        pub target_component: u8,
        /// Retransmission counter (`0` for first transmission).
        pub confirmation: u8,
    }

    /// `COMMAND_ACK` message (`ID` 77).
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct CommandAck {
        /// Command `ID` being acknowledged.
        pub command: u16,
        /// Result of the command.
        pub result: u8,
    }

    impl Heartbeat {
        pub(super) fn ser(&self) -> Vec<u8> {
            let mut buf = BytesMut::with_capacity(9);
            buf.put_u32_le(self.custom_mode);
            buf.put_u8(self.mavtype);
            buf.put_u8(self.autopilot);
            buf.put_u8(self.base_mode);
            buf.put_u8(self.system_status);
            buf.put_u8(self.mavlink_version);
            buf.into_vec()
        }

        pub(super) fn deser(payload: &[u8]) -> Option<Self> {
            let mut bytes = Bytes::new(payload);
            Some(Self {
                custom_mode: bytes.get_u32_le().ok()?,
                mavtype: bytes.get_u8().ok()?,
                autopilot: bytes.get_u8().ok()?,
                base_mode: bytes.get_u8().ok()?,
                system_status: bytes.get_u8().ok()?,
                mavlink_version: bytes.get_u8().ok()?,
            })
        }
    }

    impl CommandLong {
        pub(super) fn ser(&self) -> Vec<u8> {
            let mut buf = BytesMut::with_capacity(33);
            for param in self.params {
                buf.put_f32_le(param);
            }
            buf.put_u16_le(self.command);
            buf.put_u8(self.target_system);
            buf.put_u8(self.target_component);
            buf.put_u8(self.confirmation);
            buf.into_vec()
        }

        pub(super) fn deser(payload: &[u8]) -> Option<Self> {
            let mut bytes = Bytes::new(payload);
            let mut params = [0f32; 7];
            for param in &mut params {
                *param = bytes.get_f32_le().ok()?;
            }
            Some(Self {
                params,
                command: bytes.get_u16_le().ok()?,
                target_system: bytes.get_u8().ok()?,
                target_component: bytes.get_u8().ok()?,
                confirmation: bytes.get_u8().ok()?,
            })
        }
    }

    impl CommandAck {
        pub(super) fn ser(&self) -> Vec<u8> {
            let mut buf = BytesMut::with_capacity(3);
            buf.put_u16_le(self.command);
            buf.put_u8(self.result);
            buf.into_vec()
        }

        pub(super) fn deser(payload: &[u8]) -> Option<Self> {
            let mut bytes = Bytes::new(payload);
            Some(Self {
                command: bytes.get_u16_le().ok()?,
                result: bytes.get_u8().ok()?,
            })
        }
    }
}

use messages::{CommandAck, CommandLong, Heartbeat};

/// A message of the [`BasicDialect`].
#[derive(Clone, Debug, PartialEq)]
pub enum BasicMessage {
    /// `HEARTBEAT` message.
    Heartbeat(Heartbeat),
    /// `COMMAND_LONG` message.
    CommandLong(CommandLong),
    /// `COMMAND_ACK` message.
    CommandAck(CommandAck),
}

impl Message for BasicMessage {
    fn message_id(&self) -> MessageId {
        match self {
            BasicMessage::Heartbeat(_) => 0,
            BasicMessage::CommandLong(_) => 76,
            BasicMessage::CommandAck(_) => 77,
        }
    }

    fn message_name(&self) -> &'static str {
        match self {
            BasicMessage::Heartbeat(_) => "HEARTBEAT",
            BasicMessage::CommandLong(_) => "COMMAND_LONG",
            BasicMessage::CommandAck(_) => "COMMAND_ACK",
        }
    }

    fn target(&self) -> Target {
        match self {
            BasicMessage::CommandLong(command) => Target::Component {
                system: command.target_system,
                component: command.target_component,
            },
            _ => Target::Broadcast,
        }
    }
}

/// The basic dialect.
pub struct BasicDialect;

impl Dialect for BasicDialect {
    type Message = BasicMessage;

    fn name() -> &'static str {
        "basic"
    }

    fn crc_extra(message_id: MessageId) -> Option<u8> {
        match message_id {
            0 => Some(50),
            76 => Some(152),
            77 => Some(143),
            _ => None,
        }
    }

    fn payload_length(message_id: MessageId) -> Option<u8> {
        match message_id {
            0 => Some(9),
            76 => Some(33),
            77 => Some(3),
            _ => None,
        }
    }

    fn message_id_from_name(name: &str) -> Option<MessageId> {
        match name {
            "HEARTBEAT" => Some(0),
            "COMMAND_LONG" => Some(76),
            "COMMAND_ACK" => Some(77),
            _ => None,
        }
    }

    fn decode(message_id: MessageId, payload: &[u8]) -> Option<BasicMessage> {
        match message_id {
            0 => Heartbeat::deser(payload).map(BasicMessage::Heartbeat),
            76 => CommandLong::deser(payload).map(BasicMessage::CommandLong),
            77 => CommandAck::deser(payload).map(BasicMessage::CommandAck),
            _ => None,
        }
    }

    fn encode(message: &BasicMessage) -> Result<EncodedMessage, SpecError> {
        let payload = match message {
            BasicMessage::Heartbeat(heartbeat) => heartbeat.ser(),
            BasicMessage::CommandLong(command) => command.ser(),
            BasicMessage::CommandAck(ack) => ack.ser(),
        };
        Ok(EncodedMessage {
            message_id: message.message_id(),
            payload,
            crc_extra: Self::crc_extra(message.message_id())
                .ok_or(SpecError::NotInDialect(message.message_id(), Self::name()))?,
            target: message.target(),
        })
    }
}
