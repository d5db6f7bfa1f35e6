//! # Mavroute errors
//!
//! These errors are returned by all `mavroute` methods and functions.
//!
//! The top-level error is [`Error`]. Library API returns versions of this
//! error possibly wrapping other types of errors like [`FrameError`] or
//! [`SpecError`].

use std::sync::{mpsc, Arc, PoisonError};

use crate::protocol::{MavLinkVersion, MessageId};

/// Mavroute result type.
pub type Result<T> = core::result::Result<T, Error>;

/// All errors generated by Mavroute.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// [`std::io::Error`] wrapper.
    #[error("I/O error: {0:?}")]
    Io(Arc<std::io::Error>),

    /// Frame validation error. Frames that fail validation are dropped by
    /// the parser; this error surfaces only in diagnostics.
    #[error("frame error: {0:?}")]
    Frame(#[from] FrameError),

    /// Message encoding/decoding and specification discovery error.
    #[error("message decoding/encoding error: {0:?}")]
    Spec(#[from] SpecError),

    /// Unparseable transport specification string.
    #[error("invalid transport specification: {0}")]
    InvalidTransportSpec(String),

    /// Router errors.
    #[error("router error: {0:?}")]
    Router(#[from] RouterError),

    /// Synchronisation errors.
    #[error("multi-threading error: {0:?}")]
    Sync(#[from] SyncError),
}

/// Errors that cause an inbound frame to be dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Checksum mismatch between the received and the calculated value.
    #[error("checksum mismatch: received {received:#06x}, calculated {calculated:#06x}")]
    Checksum {
        /// Checksum as received on the wire.
        received: u16,
        /// Checksum calculated over the received frame.
        calculated: u16,
    },

    /// Message `ID` has no `CRC_EXTRA` in the current dialect, so the
    /// checksum cannot be verified.
    #[error("message ID {0} has no CRC_EXTRA in the current dialect")]
    UnknownMessageId(MessageId),

    /// `MAVLink 2` frame carries a signature. Signature verification is not
    /// supported and such frames are dropped.
    #[error("signed MAVLink 2 frame (incompat_flags = {0:#04x})")]
    Signed(u8),
}

/// Message specification errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    /// A subscription query names a message type that does not exist in the
    /// current dialect.
    #[error("message type `{0}` does not exist in dialect `{1}`")]
    UnknownMessageType(String, &'static str),

    /// Message cannot be encoded for the requested protocol version.
    #[error("message ID {0} cannot be encoded for {1:?}")]
    UnsupportedMessage(MessageId, MavLinkVersion),

    /// Message `ID` is not a member of the current dialect.
    #[error("message ID {0} is not in dialect `{1}`")]
    NotInDialect(MessageId, &'static str),

    /// Payload does not decode into a dialect message.
    #[error("invalid payload for message ID {0}")]
    InvalidPayload(MessageId),
}

/// Router errors.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RouterError {
    /// Router is no longer active.
    #[error("router is no longer active")]
    Inactive,

    /// Invalid router configuration.
    #[error("invalid router configuration: {0}")]
    Config(String),
}

/// Synchronisation errors.
#[derive(Clone, Copy, Debug, thiserror::Error)]
pub enum SyncError {
    /// Failed due to a poisoned mutex.
    #[error("poisoned mutex: {0}")]
    PoisonedMutex(&'static str),

    /// Attempt to read from an empty channel.
    #[error("channel is empty")]
    Empty,

    /// Attempt to read or write into a closed channel.
    #[error("channel is closed")]
    Disconnected,

    /// Blocking read from a channel timed out.
    #[error("timed out")]
    Timeout,
}

/// Error returned by a blocking receive on an [`EventStream`].
///
/// [`EventStream`]: crate::router::EventStream
#[derive(Clone, Copy, Debug, thiserror::Error)]
pub enum RecvError {
    /// Channel is disconnected, no messages will be received.
    #[error("channel is disconnected")]
    Disconnected,
}

/// Error returned by a bounded-time receive on an [`EventStream`].
///
/// [`EventStream`]: crate::router::EventStream
#[derive(Clone, Copy, Debug, thiserror::Error)]
pub enum RecvTimeoutError {
    /// Channel is disconnected, no messages will be received.
    #[error("channel is disconnected")]
    Disconnected,

    /// The channel is currently empty, but senders have not yet
    /// disconnected, so data may yet become available.
    #[error("timed out")]
    Timeout,
}

/// Error returned by a non-blocking receive on an [`EventStream`].
///
/// [`EventStream`]: crate::router::EventStream
#[derive(Clone, Copy, Debug, thiserror::Error)]
pub enum TryRecvError {
    /// Channel is empty.
    #[error("channel is empty")]
    Empty,

    /// Channel is disconnected, no messages will be received.
    #[error("channel is disconnected")]
    Disconnected,
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<serialport::Error> for Error {
    fn from(value: serialport::Error) -> Self {
        Self::Io(Arc::new(value.into()))
    }
}

impl<Guard> From<PoisonError<Guard>> for Error {
    fn from(_: PoisonError<Guard>) -> Self {
        Error::Sync(SyncError::PoisonedMutex("lock poisoned by a panic"))
    }
}

///////////////////////////////////////////////////////////////////////////////
//                                   MPSC                                    //
///////////////////////////////////////////////////////////////////////////////

impl<T> From<mpsc::SendError<T>> for Error {
    fn from(_: mpsc::SendError<T>) -> Self {
        SyncError::Disconnected.into()
    }
}

impl From<mpsc::RecvError> for Error {
    fn from(_: mpsc::RecvError) -> Self {
        SyncError::Disconnected.into()
    }
}

impl From<mpsc::RecvTimeoutError> for Error {
    fn from(value: mpsc::RecvTimeoutError) -> Self {
        match value {
            mpsc::RecvTimeoutError::Timeout => SyncError::Timeout,
            mpsc::RecvTimeoutError::Disconnected => SyncError::Disconnected,
        }
        .into()
    }
}

impl From<mpsc::TryRecvError> for Error {
    fn from(value: mpsc::TryRecvError) -> Self {
        match value {
            mpsc::TryRecvError::Empty => SyncError::Empty,
            mpsc::TryRecvError::Disconnected => SyncError::Disconnected,
        }
        .into()
    }
}

impl From<mpsc::RecvError> for RecvError {
    fn from(_: mpsc::RecvError) -> Self {
        RecvError::Disconnected
    }
}

impl From<mpsc::RecvTimeoutError> for RecvTimeoutError {
    fn from(value: mpsc::RecvTimeoutError) -> Self {
        match value {
            mpsc::RecvTimeoutError::Timeout => RecvTimeoutError::Timeout,
            mpsc::RecvTimeoutError::Disconnected => RecvTimeoutError::Disconnected,
        }
    }
}

impl From<mpsc::TryRecvError> for TryRecvError {
    fn from(value: mpsc::TryRecvError) -> Self {
        match value {
            mpsc::TryRecvError::Empty => TryRecvError::Empty,
            mpsc::TryRecvError::Disconnected => TryRecvError::Disconnected,
        }
    }
}
