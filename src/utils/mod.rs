//! # Internal utils

pub(crate) mod closable;
pub(crate) mod unique_id;

pub(crate) use closable::{Closable, Closer, SharedCloser};
pub(crate) use unique_id::UniqueId;
