//! NETLINK_ROUTE responder.
//!
//! The responder sits inside a network stack and answers rtnetlink
//! requests from the stack's own device list, routing tables and neighbor
//! caches:
//!
//! - `RTM_GETLINK` dumps every device
//! - `RTM_GETNEIGH` dumps the ARP (INET) or IPv6 neighbor (INET6) cache
//! - `RTM_GETROUTE` dumps the IPv4 or IPv6 routing table
//! - `RTM_NEWADDR` / `RTM_DELADDR` / `RTM_GETADDR` manage device addresses
//!
//! State changes are broadcast to the rtnetlink multicast groups through a
//! [`Notifier`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::{Arc, RwLock};
//! use nlroute::netlink::{GroupHub, MemoryStack, Responder, ResponderConfig, ResponseQueue};
//!
//! let stack = MemoryStack::from_json(&std::fs::read_to_string("stack.json")?)?;
//! let hub = Arc::new(GroupHub::default());
//! let responder = Responder::new(Arc::new(RwLock::new(stack)), ResponderConfig::default(), hub)?;
//!
//! let mut queue = ResponseQueue::new();
//! let consumed = responder.handle(&request_bytes, &mut queue)?;
//! for record in queue.drain() {
//!     println!("{:?} {} bytes", record.kind(), record.len());
//! }
//! ```

pub mod attr;
pub mod builder;
pub mod config;
pub mod error;
pub mod message;
pub mod notify;
pub mod records;
pub mod responder;
pub mod snapshot;
pub mod stack;
pub mod state;
pub mod transport;
pub mod types;

pub use attr::{Attr, AttrPolicy, AttrTable, PolicyKind, validate_and_index};
pub use builder::MessageBuilder;
pub use config::{DispatchTable, Operation, ResponderConfig};
pub use error::{Error, Result};
pub use message::{Family, NlMsgHdr, NlMsgType, Request};
pub use notify::Notifier;
pub use records::{Record, RecordKind};
pub use responder::Responder;
pub use snapshot::TableSnapshot;
pub use stack::MemoryStack;
pub use state::{
    DeviceTable, IpRoute, Ipv4Route, Ipv6Route, LinkType, NeighborTable, NetDevice, NetState,
    RouteTable,
};
pub use transport::{GroupHub, GroupSink, ResponseQueue, ResponseSink, RtnlGroup};
pub use types::neigh::{ArpEntry, NeighborEntry};
pub use types::prefix::PrefixInfo;
