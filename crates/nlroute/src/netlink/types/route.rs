//! Route message types.

use crate::netlink::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Route message (struct rtmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtMsg {
    /// Address family.
    pub rtm_family: u8,
    /// Destination prefix length.
    pub rtm_dst_len: u8,
    /// Source prefix length.
    pub rtm_src_len: u8,
    /// Type of service.
    pub rtm_tos: u8,
    /// Routing table ID.
    pub rtm_table: u8,
    /// Routing protocol.
    pub rtm_protocol: u8,
    /// Route scope.
    pub rtm_scope: u8,
    /// Route type.
    pub rtm_type: u8,
    /// Route flags.
    pub rtm_flags: u32,
}

impl RtMsg {
    /// Size of this structure.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            })
    }
}

/// Route attribute ids (RTA_*).
pub mod rta {
    pub const RTA_DST: u16 = 1;
    pub const RTA_GATEWAY: u16 = 5;
    pub const RTA_GENMASK: u16 = 20;
}

/// Main routing table id.
pub const RT_TABLE_MAIN: u8 = 254;

/// Route installed by admin.
pub const RTPROT_STATIC: u8 = 4;

/// Gateway or direct route.
pub const RTN_UNICAST: u8 = 1;
