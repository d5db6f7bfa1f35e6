use crc_any::CRCu16;

use crate::dialect::{Dialect, Message};
use crate::error::{Result, SpecError};
use crate::protocol::types::{
    ComponentId, MavLinkVersion, MessageId, Sequence, SystemId, Target, STX_V1, STX_V2,
};

/// MAVLink frame.
///
/// A parsed or producible MAVLink packet together with its metadata. Frames
/// produced by the [`Parser`](super::Parser) always carry a checksum that
/// was verified against the dialect's `CRC_EXTRA`; frames built with
/// [`Frame::pack`] carry a freshly calculated one.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame<M> {
    /// Protocol version of this frame.
    pub version: MavLinkVersion,
    /// Incompatibility flags (`MAVLink 2` only, `0` on `MAVLink 1`).
    pub incompat_flags: u8,
    /// Compatibility flags (`MAVLink 2` only, `0` on `MAVLink 1`).
    pub compat_flags: u8,
    /// Frame sequence number.
    pub sequence: Sequence,
    /// System `ID` of the sender.
    pub system_id: SystemId,
    /// Component `ID` of the sender.
    pub component_id: ComponentId,
    /// Message `ID` (24-bit on `MAVLink 2`, 8-bit on `MAVLink 1`).
    pub message_id: MessageId,
    /// Payload as it appears on the wire.
    ///
    /// On `MAVLink 2` trailing zero bytes may be truncated; receivers
    /// zero-extend to the dialect-declared length before field extraction.
    pub payload: Vec<u8>,
    /// `X.25` checksum (CRC-16/MCRF4XX) transmitted with the frame.
    pub checksum: u16,
    /// Addressing mode derived from the decoded message.
    pub target: Target,
    /// Decoded message, if the dialect recognised the payload.
    pub message: Option<M>,
}

impl<M: Message> Frame<M> {
    /// Builds an outbound frame from a dialect message.
    ///
    /// Encodes the message, truncates trailing payload zeros (`MAVLink 2`
    /// only), and stamps the checksum.
    ///
    /// Fails with [`SpecError::UnsupportedMessage`] when a message with a
    /// wide `ID` is packed into a `MAVLink 1` frame, or when the dialect
    /// cannot encode the message.
    pub fn pack<D: Dialect<Message = M>>(
        version: MavLinkVersion,
        sequence: Sequence,
        system_id: SystemId,
        component_id: ComponentId,
        message: &M,
    ) -> Result<Self> {
        let encoded = D::encode(message)?;

        if matches!(version, MavLinkVersion::V1) && encoded.message_id > MessageId::from(u8::MAX) {
            return Err(SpecError::UnsupportedMessage(encoded.message_id, version).into());
        }

        let mut payload = encoded.payload;
        if matches!(version, MavLinkVersion::V2) {
            truncate_payload(&mut payload);
        }

        let mut frame = Frame {
            version,
            incompat_flags: 0,
            compat_flags: 0,
            sequence,
            system_id,
            component_id,
            message_id: encoded.message_id,
            payload,
            checksum: 0,
            target: encoded.target,
            message: Some(message.clone()),
        };
        frame.checksum = calculate_crc(&frame.crc_bytes(), encoded.crc_extra);

        Ok(frame)
    }
}

impl<M> Frame<M> {
    /// Serializes the frame into its wire representation.
    ///
    /// The stored payload and checksum are emitted as-is, so a frame
    /// received on one connection forwards to another byte-identical.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12 + self.payload.len());
        match self.version {
            MavLinkVersion::V1 => buf.push(STX_V1),
            MavLinkVersion::V2 => buf.push(STX_V2),
        }
        buf.extend_from_slice(&self.crc_bytes());
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Verifies the stored checksum against the given `CRC_EXTRA`.
    pub fn checksum_valid(&self, crc_extra: u8) -> bool {
        calculate_crc(&self.crc_bytes(), crc_extra) == self.checksum
    }

    /// Bytes covered by the checksum: everything after the start marker
    /// through the last payload byte.
    fn crc_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9 + self.payload.len());
        buf.push(self.payload.len() as u8);
        match self.version {
            MavLinkVersion::V1 => {
                buf.push(self.sequence);
                buf.push(self.system_id);
                buf.push(self.component_id);
                buf.push(self.message_id as u8);
            }
            MavLinkVersion::V2 => {
                buf.push(self.incompat_flags);
                buf.push(self.compat_flags);
                buf.push(self.sequence);
                buf.push(self.system_id);
                buf.push(self.component_id);
                let id = self.message_id.to_le_bytes();
                buf.extend_from_slice(&id[0..3]);
            }
        }
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Calculates the MAVLink checksum: CRC-16/MCRF4XX over the given bytes
/// followed by the per-message `CRC_EXTRA` byte.
pub(crate) fn calculate_crc(data: &[u8], crc_extra: u8) -> u16 {
    let mut crc = CRCu16::crc16mcrf4cc();
    crc.digest(data);
    crc.digest(&[crc_extra]);
    crc.get_crc()
}

/// Strips trailing zero payload bytes down to a single byte (`MAVLink 2`
/// payload truncation). Empty payloads stay empty.
fn truncate_payload(payload: &mut Vec<u8>) {
    while payload.len() > 1 && payload.last() == Some(&0) {
        payload.pop();
    }
}

#[cfg(test)]
mod frame_tests {
    use super::*;
    use crate::dialect::basic::{messages, BasicDialect, BasicMessage};

    fn heartbeat() -> BasicMessage {
        BasicMessage::Heartbeat(messages::Heartbeat {
            custom_mode: 0,
            mavtype: 2,
            autopilot: 3,
            base_mode: 81,
            system_status: 4,
            mavlink_version: 3,
        })
    }

    #[test]
    fn packed_frame_has_valid_checksum() {
        let frame =
            Frame::pack::<BasicDialect>(MavLinkVersion::V2, 0, 1, 1, &heartbeat()).unwrap();
        assert!(frame.checksum_valid(50));
        assert!(!frame.checksum_valid(51));
    }

    #[test]
    fn v2_payload_is_truncated() {
        // All-zero heartbeat payload truncates down to a single byte.
        let message = BasicMessage::Heartbeat(messages::Heartbeat::default());
        let frame = Frame::pack::<BasicDialect>(MavLinkVersion::V2, 0, 1, 1, &message).unwrap();
        assert_eq!(frame.payload, vec![0]);

        // A nonzero tail survives.
        let frame =
            Frame::pack::<BasicDialect>(MavLinkVersion::V2, 0, 1, 1, &heartbeat()).unwrap();
        assert_eq!(frame.payload.len(), 9);
    }

    #[test]
    fn v1_payload_is_not_truncated() {
        let message = BasicMessage::Heartbeat(messages::Heartbeat::default());
        let frame = Frame::pack::<BasicDialect>(MavLinkVersion::V1, 0, 1, 1, &message).unwrap();
        assert_eq!(frame.payload.len(), 9);
    }

    #[test]
    fn wire_layout_v2() {
        let frame =
            Frame::pack::<BasicDialect>(MavLinkVersion::V2, 7, 42, 17, &heartbeat()).unwrap();
        let bytes = frame.to_bytes();

        assert_eq!(bytes[0], STX_V2);
        assert_eq!(bytes[1] as usize, frame.payload.len());
        assert_eq!(bytes[2], 0); // incompat_flags
        assert_eq!(bytes[3], 0); // compat_flags
        assert_eq!(bytes[4], 7); // sequence
        assert_eq!(bytes[5], 42); // system id
        assert_eq!(bytes[6], 17); // component id
        assert_eq!(&bytes[7..10], &[0, 0, 0]); // HEARTBEAT message id
        assert_eq!(bytes.len(), 10 + frame.payload.len() + 2);
    }

    #[test]
    fn wire_layout_v1() {
        let frame =
            Frame::pack::<BasicDialect>(MavLinkVersion::V1, 3, 1, 2, &heartbeat()).unwrap();
        let bytes = frame.to_bytes();

        assert_eq!(bytes[0], STX_V1);
        assert_eq!(bytes[1], 9);
        assert_eq!(bytes[2], 3);
        assert_eq!(bytes[3], 1);
        assert_eq!(bytes[4], 2);
        assert_eq!(bytes[5], 0);
        assert_eq!(bytes.len(), 6 + 9 + 2);
    }
}
