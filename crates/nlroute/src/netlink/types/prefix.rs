//! IPv6 router-advertisement prefix notification types.

use std::net::Ipv6Addr;

use crate::netlink::error::{Error, Result};
use zerocopy::byteorder::network_endian::U16 as NetU16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Prefix message (struct prefixmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PrefixMsg {
    pub prefix_family: u8,
    pub prefix_pad1: u8,
    pub prefix_pad2: u16,
    pub prefix_ifindex: i32,
    /// ICMPv6 option type.
    pub prefix_type: u8,
    pub prefix_len: u8,
    /// On-link / autonomous flags from the option.
    pub prefix_flags: u8,
    pub prefix_pad3: u8,
}

impl PrefixMsg {
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

/// Prefix lifetimes (struct prefix_cacheinfo), host order.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct PrefixCacheInfo {
    pub preferred_time: u32,
    pub valid_time: u32,
}

impl PrefixCacheInfo {
    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Prefix attribute ids (PREFIX_*).
pub mod prefix_attr {
    pub const PREFIX_ADDRESS: u16 = 1;
    pub const PREFIX_CACHEINFO: u16 = 2;
}

/// ICMPv6 option type of a prefix-information option.
pub const ND_OPT_PREFIX_INFORMATION: u8 = 3;

/// ICMPv6 prefix-information option as received in a router advertisement.
///
/// Lifetimes arrive as two 16-bit network-order halves, high half first.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PrefixInfo {
    pub opt_type: u8,
    /// Option length in units of 8 bytes.
    pub opt_len: u8,
    pub prefix_len: u8,
    pub flags: u8,
    pub valid_lifetime: [NetU16; 2],
    pub preferred_lifetime: [NetU16; 2],
    pub reserved: [u8; 4],
    pub prefix: [u8; 16],
}

impl PrefixInfo {
    /// Size of the option on the wire.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Build an option for `prefix`/`prefix_len` with lifetimes in seconds.
    pub fn new(prefix: Ipv6Addr, prefix_len: u8, flags: u8, valid: u32, preferred: u32) -> Self {
        let split = |v: u32| [NetU16::new((v >> 16) as u16), NetU16::new(v as u16)];
        Self {
            opt_type: ND_OPT_PREFIX_INFORMATION,
            opt_len: (Self::SIZE / 8) as u8,
            prefix_len,
            flags,
            valid_lifetime: split(valid),
            preferred_lifetime: split(preferred),
            reserved: [0; 4],
            prefix: prefix.octets(),
        }
    }

    /// Parse from raw option bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: Self::SIZE,
                actual: data.len(),
            })
    }

    /// Valid lifetime in seconds.
    pub fn valid_time(&self) -> u32 {
        join(self.valid_lifetime)
    }

    /// Preferred lifetime in seconds.
    pub fn preferred_time(&self) -> u32 {
        join(self.preferred_lifetime)
    }

    /// The advertised prefix.
    pub fn prefix(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.prefix)
    }
}

fn join(halves: [NetU16; 2]) -> u32 {
    (u32::from(halves[0].get()) << 16) | u32::from(halves[1].get())
}
