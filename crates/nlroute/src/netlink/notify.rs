//! Unsolicited change notifications.
//!
//! Each notification is one record built without a request context,
//! followed by a group-scoped terminator, handed to a [`GroupSink`].
//! Nothing here fails towards the caller: build errors and unknown
//! families are logged and the notification is dropped.

use std::net::IpAddr;
use std::sync::Arc;

use super::config::ResponderConfig;
use super::error::Result;
use super::message::{Family, NlMsgType};
use super::records::{
    Record, address_record, done_record, link_record, neighbor_record, prefix_record,
    route_record,
};
use super::state::{IpRoute, NetDevice};
use super::transport::{GroupSink, RtnlGroup};
use super::types::neigh::{ArpEntry, NeighborEntry};
use super::types::prefix::PrefixInfo;

/// Builds and broadcasts state-change notifications.
#[derive(Clone)]
pub struct Notifier {
    groups: Arc<dyn GroupSink + Send + Sync>,
    config: ResponderConfig,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn new(config: &ResponderConfig, groups: Arc<dyn GroupSink + Send + Sync>) -> Self {
        Self {
            groups,
            config: config.clone(),
        }
    }

    /// A device changed state.
    pub fn link_changed(&self, dev: &NetDevice) {
        if !self.config.get_link {
            tracing::debug!(device = %dev.name, "link notifications disabled");
            return;
        }
        self.broadcast(RtnlGroup::Link, link_record(dev, None));
    }

    /// An address was added (RTM_NEWADDR) or removed (RTM_DELADDR).
    pub fn address_changed(&self, ifindex: u32, addr: IpAddr, prefix_len: u8, msg_type: u16) {
        let config = &self.config;
        if !(config.new_address || config.del_address || config.get_address) {
            tracing::debug!(ifindex, "address notifications disabled");
            return;
        }

        let group = match addr {
            IpAddr::V4(_) if config.ipv4 => RtnlGroup::Ipv4Ifaddr,
            IpAddr::V6(_) if config.ipv6 => RtnlGroup::Ipv6Ifaddr,
            _ => {
                tracing::warn!(
                    msg_type = NlMsgType::name(msg_type),
                    %addr,
                    "address notification for disabled family"
                );
                return;
            }
        };
        self.broadcast(
            group,
            address_record(ifindex, addr, prefix_len, msg_type, None),
        );
    }

    /// A route was added (RTM_NEWROUTE) or removed (RTM_DELROUTE).
    pub fn route_changed(&self, route: &IpRoute, msg_type: u16) {
        if !(self.config.get_route && self.config.routes) {
            tracing::debug!("route notifications disabled");
            return;
        }

        let group = match route {
            IpRoute::V4(_) if self.config.ipv4 => RtnlGroup::Ipv4Route,
            IpRoute::V6(_) if self.config.ipv6 => RtnlGroup::Ipv6Route,
            _ => {
                tracing::warn!(
                    msg_type = NlMsgType::name(msg_type),
                    family = %route.family(),
                    "route notification for disabled family"
                );
                return;
            }
        };
        self.broadcast(group, route_record(route, msg_type, None));
    }

    /// A neighbor entry changed. `entry` holds one raw ARP entry for
    /// INET or one raw neighbor entry for INET6.
    pub fn neighbor_changed(&self, family: Family, entry: &[u8], msg_type: u16) {
        if !self.config.get_neighbor {
            tracing::debug!(%family, "neighbor notifications disabled");
            return;
        }

        let expected = match family {
            Family::Inet if self.config.arp => ArpEntry::SIZE,
            Family::Inet6 if self.config.ipv6 => NeighborEntry::SIZE,
            _ => {
                tracing::warn!(
                    msg_type = NlMsgType::name(msg_type),
                    %family,
                    "neighbor notification for unsupported family"
                );
                return;
            }
        };
        if entry.len() != expected {
            tracing::warn!(
                %family,
                len = entry.len(),
                expected,
                "neighbor notification with malformed entry"
            );
            return;
        }

        self.broadcast(
            RtnlGroup::Neighbor,
            neighbor_record(family, entry, msg_type, None),
        );
    }

    /// A router advertisement carried a prefix-information option.
    pub fn prefix_advertised(&self, ifindex: u32, info: &PrefixInfo) {
        if !(self.config.new_address && self.config.ipv6) {
            tracing::debug!(ifindex, "prefix notifications disabled");
            return;
        }
        self.broadcast(RtnlGroup::Ipv6Prefix, prefix_record(ifindex, info));
    }

    fn broadcast(&self, group: RtnlGroup, record: Result<Record>) {
        let batch = record.and_then(|record| Ok(vec![record, done_record(None)?]));
        match batch {
            Ok(batch) => self.groups.deliver(group, batch),
            Err(e) => tracing::error!(%group, error = %e, "dropping notification"),
        }
    }
}
