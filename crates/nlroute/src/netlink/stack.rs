//! In-memory network stack.
//!
//! A self-contained [`NetState`](super::state::NetState) implementation
//! that can be described in JSON. Used by the `rtnl` tool and by tests.

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::state::{
    DeviceTable, Ipv4Route, Ipv6Route, NeighborTable, NetDevice, RouteTable, mac,
};
use super::types::link::ETH_ALEN;
use super::types::neigh::{ArpEntry, NeighborEntry};

/// One ARP cache entry in a stack description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpSpec {
    pub ip: Ipv4Addr,
    #[serde(with = "mac")]
    pub hwaddr: [u8; ETH_ALEN],
    pub ifindex: u32,
}

impl From<&ArpSpec> for ArpEntry {
    fn from(spec: &ArpSpec) -> Self {
        ArpEntry::new(spec.ip, spec.hwaddr, spec.ifindex)
    }
}

/// One IPv6 neighbor cache entry in a stack description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborSpec {
    pub ip: Ipv6Addr,
    #[serde(with = "mac")]
    pub lladdr: [u8; ETH_ALEN],
    pub ifindex: u32,
}

impl From<&NeighborSpec> for NeighborEntry {
    fn from(spec: &NeighborSpec) -> Self {
        NeighborEntry::new(spec.ip, &spec.lladdr, spec.ifindex)
    }
}

/// Devices, routing tables and neighbor caches held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStack {
    pub devices: Vec<NetDevice>,
    pub ipv4_routes: Vec<Ipv4Route>,
    pub ipv6_routes: Vec<Ipv6Route>,
    pub arp: Vec<ArpSpec>,
    pub neighbors: Vec<NeighborSpec>,
}

impl MemoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a stack description.
    pub fn from_json(json: &str) -> Result<Self> {
        let stack: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        let mut seen = std::collections::HashSet::new();
        for dev in &stack.devices {
            if !seen.insert(dev.index) {
                return Err(Error::Config(format!(
                    "duplicate device index {}",
                    dev.index
                )));
            }
        }
        Ok(stack)
    }

    pub fn device(mut self, dev: NetDevice) -> Self {
        self.devices.push(dev);
        self
    }

    pub fn ipv4_route(mut self, target: Ipv4Addr, netmask: Ipv4Addr, router: Ipv4Addr) -> Self {
        self.ipv4_routes.push(Ipv4Route {
            target,
            netmask,
            router,
        });
        self
    }

    pub fn ipv6_route(mut self, target: Ipv6Addr, netmask: Ipv6Addr, router: Ipv6Addr) -> Self {
        self.ipv6_routes.push(Ipv6Route {
            target,
            netmask,
            router,
        });
        self
    }

    pub fn arp_entry(mut self, ip: Ipv4Addr, hwaddr: [u8; ETH_ALEN], ifindex: u32) -> Self {
        self.arp.push(ArpSpec {
            ip,
            hwaddr,
            ifindex,
        });
        self
    }

    pub fn neighbor(mut self, ip: Ipv6Addr, lladdr: [u8; ETH_ALEN], ifindex: u32) -> Self {
        self.neighbors.push(NeighborSpec {
            ip,
            lladdr,
            ifindex,
        });
        self
    }
}

impl DeviceTable for MemoryStack {
    fn devices(&self) -> impl Iterator<Item = &NetDevice> {
        self.devices.iter()
    }

    fn device_mut(&mut self, index: u32) -> Option<&mut NetDevice> {
        self.devices.iter_mut().find(|dev| dev.index == index)
    }
}

impl RouteTable for MemoryStack {
    fn ipv4_routes(&self) -> impl Iterator<Item = &Ipv4Route> {
        self.ipv4_routes.iter()
    }

    fn ipv6_routes(&self) -> impl Iterator<Item = &Ipv6Route> {
        self.ipv6_routes.iter()
    }
}

impl NeighborTable for MemoryStack {
    fn snapshot_arp(&self, out: &mut [ArpEntry]) -> usize {
        let mut copied = 0;
        for (slot, spec) in out.iter_mut().zip(&self.arp) {
            *slot = ArpEntry::from(spec);
            copied += 1;
        }
        copied
    }

    fn snapshot_neighbors(&self, out: &mut [NeighborEntry]) -> usize {
        let mut copied = 0;
        for (slot, spec) in out.iter_mut().zip(&self.neighbors) {
            *slot = NeighborEntry::from(spec);
            copied += 1;
        }
        copied
    }
}
