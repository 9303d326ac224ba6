//! In-stack rtnetlink (NETLINK_ROUTE) responder.
//!
//! This crate answers link, neighbor, route and address requests from
//! state owned by an embedding network stack, and broadcasts change
//! notifications to the rtnetlink multicast groups. It has no socket
//! layer of its own: requests arrive as byte buffers and responses leave
//! as framed [`netlink::Record`]s.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::{Arc, RwLock};
//! use nlroute::netlink::{GroupHub, MemoryStack, Responder, ResponderConfig, ResponseQueue};
//!
//! let responder = Responder::new(
//!     Arc::new(RwLock::new(MemoryStack::new())),
//!     ResponderConfig::default(),
//!     Arc::new(GroupHub::default()),
//! )?;
//! let mut queue = ResponseQueue::new();
//! let status = responder.sendto(&request, &mut queue);
//! ```

pub mod netlink;

pub use netlink::{Error, Responder, Result};
