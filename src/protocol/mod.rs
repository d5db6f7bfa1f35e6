//! # MAVLink protocol entities
//!
//! Wire-level abstractions: protocol types and constants, the [`Frame`]
//! value type, and the byte-stream [`Parser`].

pub(crate) mod bytes;
mod frame;
mod parser;
mod types;

pub use frame::Frame;
pub use parser::Parser;
pub use types::{
    ComponentId, MavLinkVersion, MessageId, Sequence, SystemId, Target, INCOMPAT_FLAG_SIGNED,
    PAYLOAD_MAX_SIZE, SIGNATURE_LENGTH, STX_V1, STX_V2,
};
