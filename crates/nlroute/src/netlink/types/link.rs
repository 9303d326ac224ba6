//! Link (network interface) message types.

use crate::netlink::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Interface info message (struct ifinfomsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    /// Address family.
    pub ifi_family: u8,
    /// Padding.
    pub ifi_pad: u8,
    /// Device type (ARPHRD_*).
    pub ifi_type: u16,
    /// Interface index.
    pub ifi_index: i32,
    /// Device flags (IFF_*).
    pub ifi_flags: u32,
    /// Change mask.
    pub ifi_change: u32,
}

impl IfInfoMsg {
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

/// Link attribute ids (IFLA_*) emitted by the responder.
pub mod ifla {
    pub const IFLA_ADDRESS: u16 = 1;
    pub const IFLA_IFNAME: u16 = 3;
    pub const IFLA_MTU: u16 = 4;
}

/// Hardware types (ARPHRD_*).
pub mod arphrd {
    pub const ARPHRD_ETHER: u16 = 1;
    pub const ARPHRD_SLIP: u16 = 256;
    pub const ARPHRD_CAN: u16 = 280;
    pub const ARPHRD_LOOPBACK: u16 = 772;
    pub const ARPHRD_IEEE80211: u16 = 801;
    pub const ARPHRD_IEEE802154: u16 = 804;
    pub const ARPHRD_PHONET_PIPE: u16 = 821;
    pub const ARPHRD_NONE: u16 = 0xfffe;
    pub const ARPHRD_VOID: u16 = 0xffff;
}

/// Interface flags (IFF_*).
pub mod iff {
    pub const UP: u32 = 1 << 0;
    pub const BROADCAST: u32 = 1 << 1;
    pub const LOOPBACK: u32 = 1 << 3;
    pub const POINTOPOINT: u32 = 1 << 4;
    pub const RUNNING: u32 = 1 << 6;
    pub const NOARP: u32 = 1 << 7;
    pub const MULTICAST: u32 = 1 << 12;
}

/// Maximum interface name length including the terminator.
pub const IFNAMSIZ: usize = 16;

/// Hardware address length carried in IFLA_ADDRESS.
pub const ETH_ALEN: usize = 6;
