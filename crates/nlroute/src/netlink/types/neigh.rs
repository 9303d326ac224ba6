//! Neighbor (ARP/NDP) message types and raw table entries.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::netlink::error::{Error, Result};
use zerocopy::byteorder::native_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Neighbor message (struct ndmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NdMsg {
    /// Address family.
    pub ndm_family: u8,
    /// Padding.
    pub ndm_pad1: u8,
    /// Padding.
    pub ndm_pad2: u16,
    /// Interface index.
    pub ndm_ifindex: i32,
    /// Neighbor state (NUD_*).
    pub ndm_state: u16,
    /// Neighbor flags (NTF_*).
    pub ndm_flags: u8,
    /// Neighbor type.
    pub ndm_type: u8,
}

impl NdMsg {
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

/// Neighbor attribute carrying the raw table entries.
pub const NDA_UNSPEC: u16 = 0;

/// ARP entry flags (ATF_*).
pub mod atf {
    /// Completed entry (hardware address valid).
    pub const ATF_COM: u16 = 0x02;
    /// Permanent entry.
    pub const ATF_PERM: u16 = 0x04;
}

/// One ARP cache entry as copied out of the ARP table.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct ArpEntry {
    /// IPv4 address, network order.
    pub ipaddr: [u8; 4],
    /// Ethernet address.
    pub hwaddr: [u8; 6],
    /// ATF_* flags.
    pub flags: U16,
    /// Owning interface.
    pub ifindex: U32,
}

impl ArpEntry {
    /// Size of one entry on the wire.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a completed entry.
    pub fn new(ip: Ipv4Addr, hwaddr: [u8; 6], ifindex: u32) -> Self {
        Self {
            ipaddr: ip.octets(),
            hwaddr,
            flags: U16::new(atf::ATF_COM),
            ifindex: U32::new(ifindex),
        }
    }

    /// The entry's IPv4 address.
    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ipaddr)
    }

    /// Decode a packed run of entries (trailing partial entry ignored).
    pub fn slice_from_bytes(data: &[u8]) -> &[Self] {
        let usable = data.len() - data.len() % Self::SIZE;
        <[Self]>::ref_from_bytes(&data[..usable]).unwrap_or(&[])
    }
}

/// Neighbor reachability states (NUD_*), low byte.
pub mod nud {
    pub const NUD_INCOMPLETE: u8 = 0x01;
    pub const NUD_REACHABLE: u8 = 0x02;
    pub const NUD_STALE: u8 = 0x04;
    pub const NUD_DELAY: u8 = 0x08;
    pub const NUD_PROBE: u8 = 0x10;
}

/// One IPv6 neighbor cache entry as copied out of the neighbor table.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct NeighborEntry {
    /// IPv6 address, network order.
    pub ipaddr: [u8; 16],
    /// Link-layer address, zero padded.
    pub lladdr: [u8; 8],
    /// Valid bytes in `lladdr`.
    pub lladdr_len: u8,
    /// NUD_* state.
    pub state: u8,
    pub reserved: [u8; 2],
    /// Owning interface.
    pub ifindex: U32,
    /// Milliseconds since last confirmation.
    pub age_ms: U32,
}

impl NeighborEntry {
    /// Size of one entry on the wire.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Create a reachable entry. Link-layer addresses longer than 8 bytes
    /// are truncated.
    pub fn new(ip: Ipv6Addr, lladdr: &[u8], ifindex: u32) -> Self {
        let len = lladdr.len().min(8);
        let mut addr = [0u8; 8];
        addr[..len].copy_from_slice(&lladdr[..len]);
        Self {
            ipaddr: ip.octets(),
            lladdr: addr,
            lladdr_len: len as u8,
            state: nud::NUD_REACHABLE,
            reserved: [0; 2],
            ifindex: U32::new(ifindex),
            age_ms: U32::new(0),
        }
    }

    /// The entry's IPv6 address.
    pub fn ip(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.ipaddr)
    }

    /// The valid part of the link-layer address.
    pub fn lladdr(&self) -> &[u8] {
        &self.lladdr[..(self.lladdr_len as usize).min(8)]
    }

    /// Decode a packed run of entries (trailing partial entry ignored).
    pub fn slice_from_bytes(data: &[u8]) -> &[Self] {
        let usable = data.len() - data.len() % Self::SIZE;
        <[Self]>::ref_from_bytes(&data[..usable]).unwrap_or(&[])
    }
}
