//! Network state registries consumed by the responder.
//!
//! The responder never owns the device list, routing tables or neighbor
//! caches. It borrows them through the traits below while holding the
//! shared state lock, and releases the lock before building or queuing
//! anything that is not a table copy.

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::message::Family;
use super::types::link::{ETH_ALEN, arphrd, iff};

pub use super::types::neigh::{ArpEntry, NeighborEntry};

/// Link-layer type of a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    #[default]
    Ethernet,
    Ieee80211,
    Loopback,
    Slip,
    Tun,
    Bluetooth,
    PacketRadio,
    Mbim,
    Ieee802154,
    Can,
    Cellular,
    /// A link-layer type the responder has no ARPHRD mapping for.
    Unknown(u8),
}

impl LinkType {
    /// ARPHRD_* hardware type, or `None` when the type has no mapping.
    pub fn arphrd(self) -> Option<u16> {
        match self {
            LinkType::Ethernet => Some(arphrd::ARPHRD_ETHER),
            LinkType::Ieee80211 => Some(arphrd::ARPHRD_IEEE80211),
            LinkType::Loopback => Some(arphrd::ARPHRD_LOOPBACK),
            LinkType::Slip => Some(arphrd::ARPHRD_SLIP),
            LinkType::Tun | LinkType::Bluetooth | LinkType::PacketRadio | LinkType::Mbim => {
                Some(arphrd::ARPHRD_NONE)
            }
            LinkType::Ieee802154 => Some(arphrd::ARPHRD_IEEE802154),
            LinkType::Can => Some(arphrd::ARPHRD_CAN),
            LinkType::Cellular => Some(arphrd::ARPHRD_PHONET_PIPE),
            LinkType::Unknown(_) => None,
        }
    }

    /// Length of the link-layer header in front of every packet.
    pub fn header_len(self) -> u16 {
        match self {
            LinkType::Ethernet | LinkType::Ieee80211 => 14,
            _ => 0,
        }
    }

    /// Whether the device carries a stable Ethernet-style address.
    pub fn has_hwaddr(self) -> bool {
        matches!(
            self,
            LinkType::Ethernet | LinkType::Ieee80211 | LinkType::Loopback | LinkType::Tun
        )
    }
}

/// One IPv6 address assigned to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv6Ifaddr {
    pub addr: Ipv6Addr,
    pub prefix_len: u8,
}

/// A network device as seen by the responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetDevice {
    pub index: u32,
    pub name: String,
    #[serde(default)]
    pub link_type: LinkType,
    /// IFF_* flags.
    #[serde(default)]
    pub flags: u32,
    /// Largest packet including the link-layer header.
    #[serde(default = "default_pktsize")]
    pub pktsize: u16,
    #[serde(default, with = "mac")]
    pub hwaddr: [u8; ETH_ALEN],
    #[serde(default = "unspecified_v4")]
    pub ipv4_addr: Ipv4Addr,
    #[serde(default = "unspecified_v4")]
    pub ipv4_netmask: Ipv4Addr,
    #[serde(default)]
    pub ipv6: Vec<Ipv6Ifaddr>,
}

fn default_pktsize() -> u16 {
    1514
}

fn unspecified_v4() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

impl NetDevice {
    /// Create a down device with no addresses.
    pub fn new(index: u32, name: impl Into<String>, link_type: LinkType) -> Self {
        Self {
            index,
            name: name.into(),
            link_type,
            flags: 0,
            pktsize: default_pktsize(),
            hwaddr: [0; ETH_ALEN],
            ipv4_addr: Ipv4Addr::UNSPECIFIED,
            ipv4_netmask: Ipv4Addr::UNSPECIFIED,
            ipv6: Vec::new(),
        }
    }

    /// Mark the device administratively up and running.
    pub fn up(mut self) -> Self {
        self.flags |= iff::UP | iff::RUNNING;
        self
    }

    /// Set the hardware address.
    pub fn hwaddr(mut self, hwaddr: [u8; ETH_ALEN]) -> Self {
        self.hwaddr = hwaddr;
        self
    }

    /// Set the MTU (the packet size excluding the link-layer header).
    pub fn mtu(mut self, mtu: u16) -> Self {
        self.pktsize = mtu.saturating_add(self.link_type.header_len());
        self
    }

    /// Assign the IPv4 address.
    pub fn ipv4(mut self, addr: Ipv4Addr, prefix_len: u8) -> Self {
        self.set_ipv4(addr, prefix_len);
        self
    }

    /// Add an IPv6 address.
    pub fn ipv6(mut self, addr: Ipv6Addr, prefix_len: u8) -> Self {
        self.ipv6.push(Ipv6Ifaddr { addr, prefix_len });
        self
    }

    /// Check IFF_UP.
    pub fn is_up(&self) -> bool {
        self.flags & iff::UP != 0
    }

    /// Usable MTU.
    pub fn mtu_value(&self) -> u32 {
        u32::from(self.pktsize.saturating_sub(self.link_type.header_len()))
    }

    /// Prefix length of the IPv4 netmask.
    pub fn ipv4_prefix_len(&self) -> u8 {
        ipv4_mask_to_prefix(self.ipv4_netmask)
    }

    /// Replace the IPv4 address and netmask.
    pub fn set_ipv4(&mut self, addr: Ipv4Addr, prefix_len: u8) {
        self.ipv4_addr = addr;
        self.ipv4_netmask = ipv4_prefix_to_mask(prefix_len);
    }

    /// Clear the IPv4 address; the netmask is left as is.
    pub fn clear_ipv4(&mut self) {
        self.ipv4_addr = Ipv4Addr::UNSPECIFIED;
    }

    /// Whether `addr` is one of this device's IPv6 addresses.
    pub fn owns_ipv6(&self, addr: &Ipv6Addr) -> bool {
        self.ipv6.iter().any(|a| a.addr == *addr)
    }
}

/// A routing table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route<A> {
    /// Destination network.
    pub target: A,
    pub netmask: A,
    /// Next hop.
    pub router: A,
}

pub type Ipv4Route = Route<Ipv4Addr>;
pub type Ipv6Route = Route<Ipv6Addr>;

/// A route of either family, as handed to the record builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpRoute {
    V4(Ipv4Route),
    V6(Ipv6Route),
}

impl IpRoute {
    /// Address family of the route.
    pub fn family(&self) -> Family {
        match self {
            IpRoute::V4(_) => Family::Inet,
            IpRoute::V6(_) => Family::Inet6,
        }
    }

    /// Destination prefix length derived from the netmask.
    pub fn dst_len(&self) -> u8 {
        match self {
            IpRoute::V4(r) => ipv4_mask_to_prefix(r.netmask),
            IpRoute::V6(r) => ipv6_mask_to_prefix(r.netmask),
        }
    }
}

impl From<Ipv4Route> for IpRoute {
    fn from(route: Ipv4Route) -> Self {
        IpRoute::V4(route)
    }
}

impl From<Ipv6Route> for IpRoute {
    fn from(route: Ipv6Route) -> Self {
        IpRoute::V6(route)
    }
}

/// Device registry.
pub trait DeviceTable {
    /// Devices in registration order.
    fn devices(&self) -> impl Iterator<Item = &NetDevice>;

    /// Mutable access to one device.
    fn device_mut(&mut self, index: u32) -> Option<&mut NetDevice>;

    /// Look up a device by interface index.
    fn find_by_index(&self, index: u32) -> Option<&NetDevice> {
        self.devices().find(|dev| dev.index == index)
    }

    /// Assign an IPv6 address to a device.
    fn add_ipv6_address(&mut self, index: u32, addr: Ipv6Addr, prefix_len: u8) -> Result<()> {
        let dev = self
            .device_mut(index)
            .ok_or(Error::DeviceNotFound { index })?;
        if dev.owns_ipv6(&addr) {
            return Err(Error::from_errno(libc::EEXIST));
        }
        dev.ipv6.push(Ipv6Ifaddr { addr, prefix_len });
        Ok(())
    }

    /// Remove an IPv6 address from a device.
    fn del_ipv6_address(&mut self, index: u32, addr: Ipv6Addr, _prefix_len: u8) -> Result<()> {
        let dev = self
            .device_mut(index)
            .ok_or(Error::DeviceNotFound { index })?;
        let before = dev.ipv6.len();
        dev.ipv6.retain(|a| a.addr != addr);
        if dev.ipv6.len() == before {
            return Err(Error::AddressNotAvailable);
        }
        Ok(())
    }
}

/// IPv4 and IPv6 routing tables.
pub trait RouteTable {
    fn ipv4_routes(&self) -> impl Iterator<Item = &Ipv4Route>;
    fn ipv6_routes(&self) -> impl Iterator<Item = &Ipv6Route>;
}

/// ARP and IPv6 neighbor caches.
///
/// Snapshots copy at most `out.len()` entries and return how many were
/// written.
pub trait NeighborTable {
    fn snapshot_arp(&self, out: &mut [ArpEntry]) -> usize;
    fn snapshot_neighbors(&self, out: &mut [NeighborEntry]) -> usize;
}

/// Everything the responder reads or mutates.
pub trait NetState: DeviceTable + RouteTable + NeighborTable {}

impl<T: DeviceTable + RouteTable + NeighborTable> NetState for T {}

/// Number of leading one bits in an IPv4 netmask.
pub fn ipv4_mask_to_prefix(mask: Ipv4Addr) -> u8 {
    u32::from(mask).leading_ones() as u8
}

/// IPv4 netmask for a prefix length (lengths above 32 saturate).
pub fn ipv4_prefix_to_mask(prefix_len: u8) -> Ipv4Addr {
    match prefix_len {
        0 => Ipv4Addr::UNSPECIFIED,
        n => Ipv4Addr::from(u32::MAX << (32 - u32::from(n.min(32)))),
    }
}

/// Number of leading one bits in an IPv6 netmask.
pub fn ipv6_mask_to_prefix(mask: Ipv6Addr) -> u8 {
    u128::from(mask).leading_ones() as u8
}

/// IPv6 netmask for a prefix length (lengths above 128 saturate).
pub fn ipv6_prefix_to_mask(prefix_len: u8) -> Ipv6Addr {
    match prefix_len {
        0 => Ipv6Addr::UNSPECIFIED,
        n => Ipv6Addr::from(u128::MAX << (128 - u32::from(n.min(128)))),
    }
}

/// Colon-separated hex encoding for hardware addresses.
pub(crate) mod mac {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    use super::ETH_ALEN;

    pub fn serialize<S: Serializer>(addr: &[u8; ETH_ALEN], ser: S) -> Result<S::Ok, S::Error> {
        let text = addr
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":");
        ser.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; ETH_ALEN], D::Error> {
        let text = String::deserialize(de)?;
        let mut addr = [0u8; ETH_ALEN];
        let mut parts = text.split(':');
        for byte in addr.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| D::Error::custom(format!("short hardware address: {}", text)))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| D::Error::custom(format!("bad hardware address: {}", text)))?;
        }
        if parts.next().is_some() {
            return Err(D::Error::custom(format!("long hardware address: {}", text)));
        }
        Ok(addr)
    }
}
