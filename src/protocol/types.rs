//! Basic MAVLink protocol types and constants.

/// MAVLink system `ID`.
pub type SystemId = u8;

/// MAVLink component `ID`.
pub type ComponentId = u8;

/// MAVLink message `ID`.
///
/// Message `ID` is 24-bit on `MAVLink 2` and 8-bit on `MAVLink 1`.
pub type MessageId = u32;

/// Frame sequence number.
pub type Sequence = u8;

/// `MAVLink 1` frame start marker.
pub const STX_V1: u8 = 0xFE;

/// `MAVLink 2` frame start marker.
pub const STX_V2: u8 = 0xFD;

/// Incompatibility flag bit that marks a signed `MAVLink 2` frame.
pub const INCOMPAT_FLAG_SIGNED: u8 = 0x01;

/// Length of a `MAVLink 2` signature trailer in bytes.
pub const SIGNATURE_LENGTH: usize = 13;

/// Maximum payload size of a MAVLink frame.
pub const PAYLOAD_MAX_SIZE: usize = 255;

/// MAVLink protocol version.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MavLinkVersion {
    /// `MAVLink 1` protocol version.
    V1,
    /// `MAVLink 2` protocol version.
    #[default]
    V2,
}

/// Addressing mode of a MAVLink message.
///
/// Derived from the `target_system` / `target_component` payload fields when
/// the message defines them. Messages without target fields are broadcast.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Target {
    /// Message addresses every system and component.
    #[default]
    Broadcast,
    /// Message addresses a whole system.
    System {
        /// Target system `ID` (`0` means "any system").
        system: SystemId,
    },
    /// Message addresses a specific component of a system.
    Component {
        /// Target system `ID` (`0` means "any system").
        system: SystemId,
        /// Target component `ID` (`0` means "any component").
        component: ComponentId,
    },
}

impl Target {
    /// Target system `ID`, if the message carries one.
    pub fn system(&self) -> Option<SystemId> {
        match self {
            Target::Broadcast => None,
            Target::System { system } => Some(*system),
            Target::Component { system, .. } => Some(*system),
        }
    }

    /// Target component `ID`, if the message carries one.
    pub fn component(&self) -> Option<ComponentId> {
        match self {
            Target::Component { component, .. } => Some(*component),
            _ => None,
        }
    }
}
