//! Fixed-size rtnetlink headers and raw table entries.

pub mod addr;
pub mod link;
pub mod neigh;
pub mod prefix;
pub mod route;
