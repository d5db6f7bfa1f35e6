use std::marker::PhantomData;

use crc_any::CRCu16;

use crate::dialect::{Dialect, Message};
use crate::error::FrameError;
use crate::protocol::frame::Frame;
use crate::protocol::types::{
    MavLinkVersion, MessageId, INCOMPAT_FLAG_SIGNED, SIGNATURE_LENGTH, STX_V1, STX_V2,
};

const HEADER_LENGTH_V1: usize = 5;
const HEADER_LENGTH_V2: usize = 9;

/// MAVLink framing state machine.
///
/// One instance exists per inbound connection. Bytes are fed in arrival
/// order through [`Parser::push`]; whenever a complete frame with a valid
/// checksum has been accumulated, it is returned. Invalid frames are
/// reported as [`FrameError`] and dropped, after which the parser has
/// already resynchronised and the stream may continue.
pub struct Parser<D: Dialect> {
    state: State,
    version: MavLinkVersion,
    header: Vec<u8>,
    payload: Vec<u8>,
    checksum_lo: u8,
    crc: CRCu16,
    _dialect: PhantomData<D>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Header { needed: usize },
    Payload { length: usize },
    ChecksumLo,
    ChecksumHi,
    Signature { remaining: usize, checksum: u16 },
}

impl<D: Dialect> Parser<D> {
    /// Creates a parser in the `Idle` state.
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            version: MavLinkVersion::V2,
            header: Vec::with_capacity(HEADER_LENGTH_V2),
            payload: Vec::new(),
            checksum_lo: 0,
            crc: CRCu16::crc16mcrf4cc(),
            _dialect: PhantomData,
        }
    }

    /// Returns `true` if the parser waits for a start marker.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Consumes a single byte of the inbound stream.
    ///
    /// Returns a [`Frame`] when the byte completes a valid frame, `Ok(None)`
    /// while a frame is still being accumulated, and a [`FrameError`] when
    /// the byte completes a frame that has to be dropped. In all cases the
    /// parser is ready to accept the next byte.
    #[allow(clippy::type_complexity)]
    pub fn push(&mut self, byte: u8) -> Result<Option<Frame<D::Message>>, FrameError> {
        match self.state {
            State::Idle => {
                match byte {
                    STX_V1 => self.start(MavLinkVersion::V1, HEADER_LENGTH_V1),
                    STX_V2 => self.start(MavLinkVersion::V2, HEADER_LENGTH_V2),
                    _ => {}
                }
                Ok(None)
            }
            State::Header { needed } => {
                self.header.push(byte);
                self.crc.digest(&[byte]);
                if self.header.len() == needed {
                    let length = self.header[0] as usize;
                    self.state = if length == 0 {
                        State::ChecksumLo
                    } else {
                        State::Payload { length }
                    };
                }
                Ok(None)
            }
            State::Payload { length } => {
                self.payload.push(byte);
                self.crc.digest(&[byte]);
                if self.payload.len() == length {
                    self.state = State::ChecksumLo;
                }
                Ok(None)
            }
            State::ChecksumLo => {
                self.checksum_lo = byte;
                self.state = State::ChecksumHi;
                Ok(None)
            }
            State::ChecksumHi => {
                let checksum = u16::from_le_bytes([self.checksum_lo, byte]);
                if matches!(self.version, MavLinkVersion::V2) && self.is_signed() {
                    self.state = State::Signature {
                        remaining: SIGNATURE_LENGTH,
                        checksum,
                    };
                    return Ok(None);
                }
                self.finalize(checksum).map(Some)
            }
            State::Signature {
                remaining,
                checksum,
            } => {
                // Signature bytes are collected only to keep the stream in
                // sync; signed frames are dropped without verification.
                if remaining > 1 {
                    self.state = State::Signature {
                        remaining: remaining - 1,
                        checksum,
                    };
                    return Ok(None);
                }
                let incompat_flags = self.header[1];
                self.reset();
                Err(FrameError::Signed(incompat_flags))
            }
        }
    }

    /// Consumes a chunk of the inbound stream.
    ///
    /// Completed frames are collected in arrival order; dropped frames are
    /// reported through `on_error` and parsing continues.
    pub fn consume(
        &mut self,
        bytes: &[u8],
        mut on_error: impl FnMut(FrameError),
    ) -> Vec<Frame<D::Message>> {
        let mut frames = Vec::new();
        for &byte in bytes {
            match self.push(byte) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => {}
                Err(err) => on_error(err),
            }
        }
        frames
    }

    fn start(&mut self, version: MavLinkVersion, header_length: usize) {
        self.version = version;
        self.header.clear();
        self.payload.clear();
        self.crc = CRCu16::crc16mcrf4cc();
        self.state = State::Header {
            needed: header_length,
        };
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.header.clear();
        self.payload.clear();
    }

    fn is_signed(&self) -> bool {
        self.header[1] & INCOMPAT_FLAG_SIGNED != 0
    }

    fn message_id(&self) -> MessageId {
        match self.version {
            MavLinkVersion::V1 => MessageId::from(self.header[4]),
            MavLinkVersion::V2 => {
                u32::from_le_bytes([self.header[6], self.header[7], self.header[8], 0])
            }
        }
    }

    fn finalize(&mut self, checksum: u16) -> Result<Frame<D::Message>, FrameError> {
        let message_id = self.message_id();

        let Some(crc_extra) = D::crc_extra(message_id) else {
            self.reset();
            return Err(FrameError::UnknownMessageId(message_id));
        };

        self.crc.digest(&[crc_extra]);
        let calculated = self.crc.get_crc();
        if calculated != checksum {
            self.reset();
            return Err(FrameError::Checksum {
                received: checksum,
                calculated,
            });
        }

        let message = self.decode(message_id);
        let target = message.as_ref().map(Message::target).unwrap_or_default();

        let (incompat_flags, compat_flags, sequence, system_id, component_id) = match self.version {
            MavLinkVersion::V1 => (0, 0, self.header[1], self.header[2], self.header[3]),
            MavLinkVersion::V2 => (
                self.header[1],
                self.header[2],
                self.header[3],
                self.header[4],
                self.header[5],
            ),
        };

        let frame = Frame {
            version: self.version,
            incompat_flags,
            compat_flags,
            sequence,
            system_id,
            component_id,
            message_id,
            payload: std::mem::take(&mut self.payload),
            checksum,
            target,
            message,
        };
        self.reset();

        Ok(frame)
    }

    /// Decodes the accumulated payload, zero-extending it to the declared
    /// length first (`MAVLink 2` trailing-zero truncation).
    fn decode(&self, message_id: MessageId) -> Option<D::Message> {
        let declared = D::payload_length(message_id)
            .map(usize::from)
            .unwrap_or(self.payload.len());

        if self.payload.len() < declared {
            let mut padded = self.payload.clone();
            padded.resize(declared, 0);
            D::decode(message_id, &padded)
        } else {
            D::decode(message_id, &self.payload)
        }
    }
}

impl<D: Dialect> Default for Parser<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dialect> std::fmt::Debug for Parser<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser").field("state", &self.state).finish()
    }
}

#[cfg(test)]
mod parser_state_tests {
    use super::*;
    use crate::dialect::basic::{messages, BasicDialect, BasicMessage};
    use crate::protocol::frame::calculate_crc;

    type BasicParser = Parser<BasicDialect>;

    fn heartbeat() -> BasicMessage {
        BasicMessage::Heartbeat(messages::Heartbeat {
            custom_mode: 7,
            mavtype: 2,
            autopilot: 3,
            base_mode: 81,
            system_status: 4,
            mavlink_version: 3,
        })
    }

    fn heartbeat_frame(version: MavLinkVersion) -> Frame<BasicMessage> {
        Frame::pack::<BasicDialect>(version, 11, 1, 1, &heartbeat()).unwrap()
    }

    fn parse_all(parser: &mut BasicParser, bytes: &[u8]) -> Vec<Frame<BasicMessage>> {
        parser.consume(bytes, |err| panic!("unexpected parser error: {err:?}"))
    }

    #[test]
    fn v2_frame_round_trip() {
        let frame = heartbeat_frame(MavLinkVersion::V2);
        let mut parser = BasicParser::new();

        let frames = parse_all(&mut parser, &frame.to_bytes());
        assert_eq!(frames, vec![frame]);
        assert!(parser.is_idle());
    }

    #[test]
    fn v1_frame_round_trip() {
        let frame = heartbeat_frame(MavLinkVersion::V1);
        let mut parser = BasicParser::new();

        let frames = parse_all(&mut parser, &frame.to_bytes());
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn back_to_back_frames() {
        let first = heartbeat_frame(MavLinkVersion::V2);
        let second = heartbeat_frame(MavLinkVersion::V1);
        let mut bytes = first.to_bytes();
        bytes.extend_from_slice(&second.to_bytes());

        let mut parser = BasicParser::new();
        let frames = parse_all(&mut parser, &bytes);
        assert_eq!(frames, vec![first, second]);
    }

    #[test]
    fn garbage_stream_produces_no_frames() {
        // No start markers anywhere.
        let garbage: Vec<u8> = (0..512u32).map(|i| (i % 0xFD) as u8).collect();
        let mut parser = BasicParser::new();

        let frames = parse_all(&mut parser, &garbage);
        assert!(frames.is_empty());
        assert!(parser.is_idle());
    }

    #[test]
    fn corrupted_payload_is_dropped_and_parser_recovers() {
        let frame = heartbeat_frame(MavLinkVersion::V2);
        let mut bytes = frame.to_bytes();
        bytes[12] ^= 0x01; // flip one payload bit

        let mut parser = BasicParser::new();
        let mut errors = Vec::new();
        let frames = parser.consume(&bytes, |err| errors.push(err));
        assert!(frames.is_empty());
        assert!(matches!(errors.as_slice(), [FrameError::Checksum { .. }]));

        // A subsequent valid frame parses.
        let frames = parse_all(&mut parser, &frame.to_bytes());
        assert_eq!(frames, vec![frame]);
    }

    #[test]
    fn unknown_message_id_is_dropped() {
        // Hand-built v2 frame with message ID 99, which `BasicDialect` does
        // not define. Without CRC_EXTRA the checksum cannot be verified.
        let mut bytes = vec![STX_V2, 1, 0, 0, 0, 1, 1, 99, 0, 0, 0xAA];
        let crc = calculate_crc(&bytes[1..], 0);
        bytes.extend_from_slice(&crc.to_le_bytes());

        let mut parser = BasicParser::new();
        let mut errors = Vec::new();
        let frames = parser.consume(&bytes, |err| errors.push(err));
        assert!(frames.is_empty());
        assert_eq!(errors, vec![FrameError::UnknownMessageId(99)]);

        let valid = heartbeat_frame(MavLinkVersion::V2);
        let frames = parse_all(&mut parser, &valid.to_bytes());
        assert_eq!(frames, vec![valid]);
    }

    #[test]
    fn zero_length_payload_parses() {
        // Zero-length HEARTBEAT payload: every field zero-extends.
        let mut bytes = vec![STX_V2, 0, 0, 0, 5, 1, 1, 0, 0, 0];
        let crc = calculate_crc(&bytes[1..], 50);
        bytes.extend_from_slice(&crc.to_le_bytes());

        let mut parser = BasicParser::new();
        let frames = parse_all(&mut parser, &bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].message,
            Some(BasicMessage::Heartbeat(messages::Heartbeat::default()))
        );
    }

    #[test]
    fn truncated_payload_is_zero_extended() {
        let message = BasicMessage::Heartbeat(messages::Heartbeat::default());
        let frame = Frame::pack::<BasicDialect>(MavLinkVersion::V2, 0, 1, 1, &message).unwrap();
        assert_eq!(frame.payload, vec![0]);

        let mut parser = BasicParser::new();
        let frames = parse_all(&mut parser, &frame.to_bytes());
        assert_eq!(frames[0].message, Some(message));
    }

    #[test]
    fn signed_frame_is_skipped_and_dropped() {
        // Signed v2 HEARTBEAT: incompatibility bit 0x01 plus a 13-byte
        // signature trailer.
        let unsigned = heartbeat_frame(MavLinkVersion::V2);
        let mut bytes = vec![STX_V2, unsigned.payload.len() as u8, INCOMPAT_FLAG_SIGNED, 0, 11, 1, 1, 0, 0, 0];
        bytes.extend_from_slice(&unsigned.payload);
        let crc = calculate_crc(&bytes[1..], 50);
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&[0u8; SIGNATURE_LENGTH]);

        let mut parser = BasicParser::new();
        let mut errors = Vec::new();
        let frames = parser.consume(&bytes, |err| errors.push(err));
        assert!(frames.is_empty());
        assert_eq!(errors, vec![FrameError::Signed(INCOMPAT_FLAG_SIGNED)]);
        assert!(parser.is_idle());

        // The stream stays synchronised.
        let frames = parse_all(&mut parser, &unsigned.to_bytes());
        assert_eq!(frames, vec![unsigned]);
    }
}
