//! # Common constants

use std::time::Duration;

/// Pooling interval for the router event loop.
pub(crate) const ROUTER_POOLING_INTERVAL: Duration = Duration::from_millis(1);

/// Pooling interval for subscriber liveness watches.
pub(crate) const LIVENESS_POOLING_INTERVAL: Duration = Duration::from_millis(50);

/// Fixed delay between reconnect attempts for repairable transports.
pub(crate) const RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Read timeout for blocking transport readers.
///
/// Bounds how long a worker may lag behind a close request.
pub(crate) const READ_POOLING_INTERVAL: Duration = Duration::from_millis(100);

/// Receive buffer size for datagram and stream readers.
pub(crate) const READ_BUF_SIZE: usize = 512;
