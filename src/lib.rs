/*! # Mavroute

A [MAVLink](https://mavlink.io/en/) message router written in Rust.

Mavroute terminates multiple heterogeneous transports (UDP server, UDP
client, TCP client, serial port), parses the MAVLink v1/v2 wire protocol,
and forwards validated frames among those transports and to in-process
subscribers, following the MAVLink routing rules. It is intended for
ground-control-station and vehicle-proxy use.

# Usage

Create a router that listens for MAVLink peers on a UDP port and subscribe
to everything it routes:

```rust,no_run
use mavroute::prelude::*;
use mavroute::dialect::basic::BasicDialect;

# fn main() -> mavroute::error::Result<()> {
let router = Router::<BasicDialect>::builder()
    .system_id(255)
    .component_id(190)
    .endpoint("udpin:127.0.0.1:14550".parse()?)
    .spawn()?;

let (subscriber, events) = Subscriber::channel();
router.subscribe(Query::any(), &subscriber)?;

for delivery in events {
    match delivery {
        Delivery::Message(message) => println!("{message:?}"),
        Delivery::Unknown(message_id) => println!("unknown message {message_id}"),
        Delivery::Frame(frame) => println!("{frame:?}"),
    }
}
# Ok(()) }
```

Messages sent with [`Router::send`](router::Router::send) are routed exactly
as if they had arrived from the local connection: targeted messages follow
learned routes, broadcasts fan out to every other connection, and matching
local subscribers receive a copy.

Dialects are pluggable: the router is generic over [`dialect::Dialect`],
the contract a message-definition code generator satisfies. A compact
hand-written dialect is bundled in [`dialect::basic`] for tests and
examples.
*/

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub(crate) mod consts;
pub mod dialect;
pub mod error;
pub mod io;
pub mod protocol;
pub mod router;
pub(crate) mod utils;

pub mod prelude {
    //! # Mavroute prelude
    //!
    //! Commonly used entities re-exported for convenience.

    pub use crate::dialect::{Dialect, Message};
    pub use crate::error::{Error, Result};
    pub use crate::io::Endpoint;
    pub use crate::protocol::{Frame, MavLinkVersion, Target};
    pub use crate::router::{
        Delivery, EventStream, Query, Router, Subscriber, SubscriptionCache,
    };
}
