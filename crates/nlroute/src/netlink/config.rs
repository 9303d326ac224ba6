//! Responder capabilities and the dispatch table derived from them.
//!
//! Every message type and family the responder can serve is switched by
//! [`ResponderConfig`]. The config is evaluated once into a
//! [`DispatchTable`]; disabled message types then answer ENOSYS and
//! disabled families EAFNOSUPPORT. A type left with no family to serve
//! counts as disabled.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::attr::NLA_HDRLEN;
use super::error::{Error, Result};
use super::message::{Family, NlMsgType};
use super::types::neigh::{ArpEntry, NeighborEntry};

/// Capability switches and table sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub ipv4: bool,
    pub ipv6: bool,
    /// ARP cache present (IPv4 neighbor dumps).
    pub arp: bool,
    /// Routing tables present.
    pub routes: bool,
    pub get_link: bool,
    pub get_neighbor: bool,
    pub get_route: bool,
    pub new_address: bool,
    pub del_address: bool,
    pub get_address: bool,
    /// Check address attributes against their policies.
    pub validate_policy: bool,
    /// ARP entries reserved per neighbor dump.
    pub arp_table_size: usize,
    /// IPv6 neighbor entries reserved per neighbor dump.
    pub neighbor_table_size: usize,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
            arp: true,
            routes: true,
            get_link: true,
            get_neighbor: true,
            get_route: true,
            new_address: true,
            del_address: true,
            get_address: true,
            validate_policy: true,
            arp_table_size: 16,
            neighbor_table_size: 16,
        }
    }
}

impl ResponderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that each table fits in a single snapshot attribute.
    pub fn validate(&self) -> Result<()> {
        check_table("arp_table_size", self.arp_table_size, ArpEntry::SIZE)?;
        check_table(
            "neighbor_table_size",
            self.neighbor_table_size,
            NeighborEntry::SIZE,
        )
    }

    pub fn with_ipv4(mut self, on: bool) -> Self {
        self.ipv4 = on;
        self
    }

    pub fn with_ipv6(mut self, on: bool) -> Self {
        self.ipv6 = on;
        self
    }

    pub fn with_arp(mut self, on: bool) -> Self {
        self.arp = on;
        self
    }

    pub fn with_routes(mut self, on: bool) -> Self {
        self.routes = on;
        self
    }

    pub fn with_get_link(mut self, on: bool) -> Self {
        self.get_link = on;
        self
    }

    pub fn with_get_neighbor(mut self, on: bool) -> Self {
        self.get_neighbor = on;
        self
    }

    pub fn with_get_route(mut self, on: bool) -> Self {
        self.get_route = on;
        self
    }

    pub fn with_new_address(mut self, on: bool) -> Self {
        self.new_address = on;
        self
    }

    pub fn with_del_address(mut self, on: bool) -> Self {
        self.del_address = on;
        self
    }

    pub fn with_get_address(mut self, on: bool) -> Self {
        self.get_address = on;
        self
    }

    pub fn with_validate_policy(mut self, on: bool) -> Self {
        self.validate_policy = on;
        self
    }

    pub fn with_arp_table_size(mut self, entries: usize) -> Self {
        self.arp_table_size = entries;
        self
    }

    pub fn with_neighbor_table_size(mut self, entries: usize) -> Self {
        self.neighbor_table_size = entries;
        self
    }
}

fn check_table(field: &str, entries: usize, entry_size: usize) -> Result<()> {
    let bytes = entries
        .checked_mul(entry_size)
        .and_then(|n| n.checked_add(NLA_HDRLEN));
    match bytes {
        Some(n) if n <= u16::MAX as usize => Ok(()),
        _ => Err(Error::Config(format!(
            "{} = {} does not fit one attribute ({} bytes per entry)",
            field, entries, entry_size
        ))),
    }
}

/// A handler the dispatcher can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DumpLinks,
    DumpArp,
    DumpIpv6Neighbors,
    DumpIpv4Routes,
    DumpIpv6Routes,
    NewIpv4Address,
    NewIpv6Address,
    DelIpv4Address,
    DelIpv6Address,
    DumpIpv4Addresses,
    DumpIpv6Addresses,
}

#[derive(Debug, Clone)]
enum Slot {
    AnyFamily(Operation),
    ByFamily(Vec<(Family, Operation)>),
}

/// Message type and family to handler, built once from a config.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    slots: HashMap<u16, Slot>,
}

impl DispatchTable {
    pub fn from_config(config: &ResponderConfig) -> Self {
        let mut slots = HashMap::new();

        let by_family = |v4: Option<Operation>, v6: Option<Operation>| {
            let mut ops = Vec::new();
            if let Some(op) = v4.filter(|_| config.ipv4) {
                ops.push((Family::Inet, op));
            }
            if let Some(op) = v6.filter(|_| config.ipv6) {
                ops.push((Family::Inet6, op));
            }
            (!ops.is_empty()).then_some(Slot::ByFamily(ops))
        };

        if config.get_link {
            slots.insert(NlMsgType::RTM_GETLINK, Slot::AnyFamily(Operation::DumpLinks));
        }
        let served = [
            (
                config.get_neighbor,
                NlMsgType::RTM_GETNEIGH,
                by_family(
                    Some(Operation::DumpArp).filter(|_| config.arp),
                    Some(Operation::DumpIpv6Neighbors),
                ),
            ),
            (
                config.get_route,
                NlMsgType::RTM_GETROUTE,
                by_family(
                    Some(Operation::DumpIpv4Routes).filter(|_| config.routes),
                    Some(Operation::DumpIpv6Routes).filter(|_| config.routes),
                ),
            ),
            (
                config.new_address,
                NlMsgType::RTM_NEWADDR,
                by_family(
                    Some(Operation::NewIpv4Address),
                    Some(Operation::NewIpv6Address),
                ),
            ),
            (
                config.del_address,
                NlMsgType::RTM_DELADDR,
                by_family(
                    Some(Operation::DelIpv4Address),
                    Some(Operation::DelIpv6Address),
                ),
            ),
            (
                config.get_address,
                NlMsgType::RTM_GETADDR,
                by_family(
                    Some(Operation::DumpIpv4Addresses),
                    Some(Operation::DumpIpv6Addresses),
                ),
            ),
        ];
        for (enabled, msg_type, slot) in served {
            if let Some(slot) = slot.filter(|_| enabled) {
                slots.insert(msg_type, slot);
            }
        }

        Self { slots }
    }

    /// Resolve the handler for a request.
    pub fn lookup(&self, msg_type: u16, family: Family) -> Result<Operation> {
        match self.slots.get(&msg_type) {
            None => Err(Error::NotImplemented(NlMsgType::name(msg_type).into())),
            Some(Slot::AnyFamily(op)) => Ok(*op),
            Some(Slot::ByFamily(ops)) => ops
                .iter()
                .find(|(f, _)| *f == family)
                .map(|(_, op)| *op)
                .ok_or(Error::FamilyNotSupported {
                    family: family.as_u8(),
                }),
        }
    }

    /// Whether a message type is served at all.
    pub fn serves(&self, msg_type: u16) -> bool {
        self.slots.contains_key(&msg_type)
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::from_config(&ResponderConfig::default())
    }
}
