//! Request dispatch.
//!
//! [`Responder`] turns one raw rtnetlink request into queued response
//! records. The handler is picked from the [`DispatchTable`] by message
//! type and family. Dumps are built completely and then committed
//! together with their terminator, so a failed dump leaves nothing behind
//! in the requester's queue. Address mutations validate the whole request
//! before the state lock is taken for writing, and broadcast their
//! notification after it is released.

use std::net::IpAddr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::attr::{AttrPolicy, AttrTable, extract_address, validate_and_index};
use super::config::{DispatchTable, Operation, ResponderConfig};
use super::error::{Error, Result};
use super::message::{Family, NlMsgHdr, NlMsgType, Request};
use super::notify::Notifier;
use super::records::{
    Record, address_record, done_record, link_record, neighbor_table_record, route_record,
};
use super::state::{DeviceTable, IpRoute, NeighborTable, NetState, RouteTable};
use super::transport::{GroupSink, ResponseSink};
use super::types::addr::{IFA_CACHEINFO_SIZE, IfAddrMsg, ifa};
use super::types::link::IFNAMSIZ;
use super::types::neigh::{ArpEntry, NeighborEntry};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

const IFA_POLICY_LEN: usize = ifa::IFA_MAX as usize + 1;

/// Attribute policy for INET address requests.
pub const IPV4_ADDR_POLICY: [AttrPolicy; IFA_POLICY_LEN] = [
    AttrPolicy::ANY,                    // IFA_UNSPEC
    AttrPolicy::u32(),                  // IFA_ADDRESS
    AttrPolicy::u32(),                  // IFA_LOCAL
    AttrPolicy::string(IFNAMSIZ - 1),   // IFA_LABEL
    AttrPolicy::u32(),                  // IFA_BROADCAST
    AttrPolicy::ANY,                    // IFA_ANYCAST
    AttrPolicy::min(IFA_CACHEINFO_SIZE), // IFA_CACHEINFO
    AttrPolicy::ANY,                    // IFA_MULTICAST
    AttrPolicy::u32(),                  // IFA_FLAGS
    AttrPolicy::u32(),                  // IFA_RT_PRIORITY
];

/// Attribute policy for INET6 address requests.
pub const IPV6_ADDR_POLICY: [AttrPolicy; IFA_POLICY_LEN] = [
    AttrPolicy::ANY,                    // IFA_UNSPEC
    AttrPolicy::fixed(16),              // IFA_ADDRESS
    AttrPolicy::fixed(16),              // IFA_LOCAL
    AttrPolicy::ANY,                    // IFA_LABEL
    AttrPolicy::ANY,                    // IFA_BROADCAST
    AttrPolicy::ANY,                    // IFA_ANYCAST
    AttrPolicy::min(IFA_CACHEINFO_SIZE), // IFA_CACHEINFO
    AttrPolicy::ANY,                    // IFA_MULTICAST
    AttrPolicy::min(4),                 // IFA_FLAGS
    AttrPolicy::min(4),                 // IFA_RT_PRIORITY
];

/// NETLINK_ROUTE responder over shared network state.
pub struct Responder<S> {
    state: Arc<RwLock<S>>,
    config: ResponderConfig,
    table: DispatchTable,
    notifier: Notifier,
}

impl<S> std::fmt::Debug for Responder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("config", &self.config)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl<S: NetState> Responder<S> {
    /// Create a responder. The config is validated and compiled into a
    /// dispatch table once, here.
    pub fn new(
        state: Arc<RwLock<S>>,
        config: ResponderConfig,
        groups: Arc<dyn GroupSink + Send + Sync>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state,
            table: DispatchTable::from_config(&config),
            notifier: Notifier::new(&config, groups),
            config,
        })
    }

    /// Shared state handle, for other writers in the stack.
    pub fn state(&self) -> &Arc<RwLock<S>> {
        &self.state
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Notifier for state changes made outside the responder.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Handle one request. On success returns the number of request bytes
    /// consumed, which is always the full buffer length.
    pub fn handle(&self, data: &[u8], sink: &mut impl ResponseSink) -> Result<usize> {
        let request = Request::parse(data)?;
        let family = request.family();
        let op = self.table.lookup(request.msg_type(), family)?;

        tracing::debug!(
            msg_type = NlMsgType::name(request.msg_type()),
            %family,
            seq = request.header().nlmsg_seq,
            ?op,
            "dispatching request"
        );

        match op {
            Operation::DumpLinks => self.dump_links(&request, sink)?,
            Operation::DumpArp => self.dump_neighbors::<ArpEntry>(
                &request,
                self.config.arp_table_size,
                |state, out| state.snapshot_arp(out),
                sink,
            )?,
            Operation::DumpIpv6Neighbors => self.dump_neighbors::<NeighborEntry>(
                &request,
                self.config.neighbor_table_size,
                |state, out| state.snapshot_neighbors(out),
                sink,
            )?,
            Operation::DumpIpv4Routes => self.dump_routes(&request, Family::Inet, sink)?,
            Operation::DumpIpv6Routes => self.dump_routes(&request, Family::Inet6, sink)?,
            Operation::NewIpv4Address => self.new_ipv4_address(&request)?,
            Operation::NewIpv6Address => self.new_ipv6_address(&request)?,
            Operation::DelIpv4Address => self.del_ipv4_address(&request)?,
            Operation::DelIpv6Address => self.del_ipv6_address(&request)?,
            Operation::DumpIpv4Addresses => self.dump_addresses(&request, Family::Inet, sink)?,
            Operation::DumpIpv6Addresses => self.dump_addresses(&request, Family::Inet6, sink)?,
        }

        Ok(request.consumed())
    }

    /// Like [`handle`](Self::handle), reporting failure as a negative errno
    /// in place of the byte count.
    pub fn sendto(&self, data: &[u8], sink: &mut impl ResponseSink) -> isize {
        match self.handle(data, sink) {
            Ok(consumed) => consumed as isize,
            Err(e) => {
                tracing::debug!(error = %e, errno = e.errno(), "request failed");
                e.status()
            }
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, S>> {
        self.state.read().map_err(|_| Error::StatePoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, S>> {
        self.state.write().map_err(|_| Error::StatePoisoned)
    }

    fn dump_links(&self, request: &Request<'_>, sink: &mut impl ResponseSink) -> Result<()> {
        let context = Some((request.header(), request.family()));
        let mut batch = {
            let state = self.read()?;
            state
                .devices()
                .map(|dev| link_record(dev, context))
                .collect::<Result<Vec<_>>>()?
        };
        self.finish_dump(request.header(), &mut batch)?;
        sink.commit(batch)
    }

    fn dump_neighbors<T>(
        &self,
        request: &Request<'_>,
        max_entries: usize,
        copy: impl FnOnce(&S, &mut [T]) -> usize,
        sink: &mut impl ResponseSink,
    ) -> Result<()>
    where
        T: FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned,
    {
        let family = request.family();
        let record = neighbor_table_record(family, Some(request.header()), max_entries, |out| {
            let state = self.read()?;
            Ok(copy(&*state, out))
        })?;

        let Some(record) = record else {
            tracing::warn!(%family, "neighbor table is empty");
            return Err(Error::NoEntry(format!("{} neighbor table empty", family)));
        };

        let mut batch = vec![record];
        self.finish_dump(request.header(), &mut batch)?;
        sink.commit(batch)
    }

    fn dump_routes(
        &self,
        request: &Request<'_>,
        family: Family,
        sink: &mut impl ResponseSink,
    ) -> Result<()> {
        let header = Some(request.header());
        let mut batch = {
            let state = self.read()?;
            let build = |route: IpRoute| route_record(&route, NlMsgType::RTM_NEWROUTE, header);
            match family {
                Family::Inet => state
                    .ipv4_routes()
                    .map(|r| build(IpRoute::V4(*r)))
                    .collect::<Result<Vec<_>>>()?,
                _ => state
                    .ipv6_routes()
                    .map(|r| build(IpRoute::V6(*r)))
                    .collect::<Result<Vec<_>>>()?,
            }
        };
        self.finish_dump(request.header(), &mut batch)?;
        sink.commit(batch)
    }

    fn dump_addresses(
        &self,
        request: &Request<'_>,
        family: Family,
        sink: &mut impl ResponseSink,
    ) -> Result<()> {
        let header = Some(request.header());
        let mut batch = Vec::new();
        {
            let state = self.read()?;
            for dev in state.devices() {
                match family {
                    Family::Inet => batch.push(address_record(
                        dev.index,
                        IpAddr::V4(dev.ipv4_addr),
                        dev.ipv4_prefix_len(),
                        NlMsgType::RTM_NEWADDR,
                        header,
                    )?),
                    _ => {
                        for addr in &dev.ipv6 {
                            batch.push(address_record(
                                dev.index,
                                IpAddr::V6(addr.addr),
                                addr.prefix_len,
                                NlMsgType::RTM_NEWADDR,
                                header,
                            )?);
                        }
                    }
                }
            }
        }
        self.finish_dump(request.header(), &mut batch)?;
        sink.commit(batch)
    }

    fn finish_dump(&self, header: &NlMsgHdr, batch: &mut Vec<Record>) -> Result<()> {
        let done = done_record(Some(header))?;
        batch.try_reserve(1)?;
        batch.push(done);
        Ok(())
    }

    /// Parse the ifaddrmsg header and attributes of an address request.
    fn address_request<'a>(
        &self,
        request: &Request<'a>,
        policy: &[AttrPolicy],
    ) -> Result<(IfAddrMsg, AttrTable<'a>)> {
        let policy = self.config.validate_policy.then_some(policy);
        let attrs = validate_and_index(request.body(), IfAddrMsg::SIZE, ifa::IFA_MAX, policy)?;
        let (msg, _) = IfAddrMsg::read_from_prefix(request.body()).map_err(|_| {
            Error::Truncated {
                expected: IfAddrMsg::SIZE,
                actual: request.body().len(),
            }
        })?;
        Ok((msg, attrs))
    }

    fn new_ipv4_address(&self, request: &Request<'_>) -> Result<()> {
        let (msg, attrs) = self.address_request(request, &IPV4_ADDR_POLICY)?;
        check_prefix_len(msg.ifa_prefixlen, 32)?;
        let local = local_address(&attrs, Family::Inet)?;
        let IpAddr::V4(addr) = local else {
            return Err(Error::InvalidAttribute("IFA_LOCAL is not an IPv4 address".into()));
        };

        {
            let mut state = self.write()?;
            let dev = state
                .device_mut(msg.ifa_index)
                .ok_or(Error::DeviceNotFound {
                    index: msg.ifa_index,
                })?;
            dev.set_ipv4(addr, msg.ifa_prefixlen);
        }

        tracing::debug!(ifindex = msg.ifa_index, %addr, prefix_len = msg.ifa_prefixlen, "address set");
        self.notifier.address_changed(
            msg.ifa_index,
            local,
            msg.ifa_prefixlen,
            NlMsgType::RTM_NEWADDR,
        );
        Ok(())
    }

    fn del_ipv4_address(&self, request: &Request<'_>) -> Result<()> {
        let (msg, attrs) = self.address_request(request, &IPV4_ADDR_POLICY)?;
        let wanted = attrs
            .get(ifa::IFA_LOCAL)
            .map(|attr| extract_address(attr, Family::Inet))
            .transpose()?;

        let (old, prefix_len) = {
            let mut state = self.write()?;
            let dev = state
                .device_mut(msg.ifa_index)
                .ok_or(Error::DeviceNotFound {
                    index: msg.ifa_index,
                })?;
            if wanted.is_some_and(|addr| addr != IpAddr::V4(dev.ipv4_addr)) {
                return Err(Error::AddressNotAvailable);
            }
            let old = dev.ipv4_addr;
            let prefix_len = dev.ipv4_prefix_len();
            dev.clear_ipv4();
            (old, prefix_len)
        };

        tracing::debug!(ifindex = msg.ifa_index, %old, "address cleared");
        self.notifier.address_changed(
            msg.ifa_index,
            IpAddr::V4(old),
            prefix_len,
            NlMsgType::RTM_DELADDR,
        );
        Ok(())
    }

    fn new_ipv6_address(&self, request: &Request<'_>) -> Result<()> {
        let (msg, attrs) = self.address_request(request, &IPV6_ADDR_POLICY)?;
        check_prefix_len(msg.ifa_prefixlen, 128)?;
        let local = local_address(&attrs, Family::Inet6)?;
        let IpAddr::V6(addr) = local else {
            return Err(Error::InvalidAttribute("IFA_LOCAL is not an IPv6 address".into()));
        };

        {
            let mut state = self.write()?;
            if state.find_by_index(msg.ifa_index).is_none() {
                return Err(Error::DeviceNotFound {
                    index: msg.ifa_index,
                });
            }
            state.add_ipv6_address(msg.ifa_index, addr, msg.ifa_prefixlen)?;
        }

        tracing::debug!(ifindex = msg.ifa_index, %addr, prefix_len = msg.ifa_prefixlen, "address added");
        self.notifier.address_changed(
            msg.ifa_index,
            local,
            msg.ifa_prefixlen,
            NlMsgType::RTM_NEWADDR,
        );
        Ok(())
    }

    fn del_ipv6_address(&self, request: &Request<'_>) -> Result<()> {
        let (msg, attrs) = self.address_request(request, &IPV6_ADDR_POLICY)?;
        check_prefix_len(msg.ifa_prefixlen, 128)?;
        let local = local_address(&attrs, Family::Inet6)?;
        let IpAddr::V6(addr) = local else {
            return Err(Error::InvalidAttribute("IFA_LOCAL is not an IPv6 address".into()));
        };

        {
            let mut state = self.write()?;
            let dev = state
                .find_by_index(msg.ifa_index)
                .ok_or(Error::DeviceNotFound {
                    index: msg.ifa_index,
                })?;
            if !dev.owns_ipv6(&addr) {
                return Err(Error::AddressNotAvailable);
            }
            state.del_ipv6_address(msg.ifa_index, addr, msg.ifa_prefixlen)?;
        }

        tracing::debug!(ifindex = msg.ifa_index, %addr, "address removed");
        self.notifier.address_changed(
            msg.ifa_index,
            local,
            msg.ifa_prefixlen,
            NlMsgType::RTM_DELADDR,
        );
        Ok(())
    }
}

fn check_prefix_len(prefix_len: u8, max: u8) -> Result<()> {
    if prefix_len > max {
        return Err(Error::InvalidMessage(format!(
            "prefix length {} exceeds {}",
            prefix_len, max
        )));
    }
    Ok(())
}

fn local_address(attrs: &AttrTable<'_>, family: Family) -> Result<IpAddr> {
    let attr = attrs
        .get(ifa::IFA_LOCAL)
        .ok_or_else(|| Error::InvalidMessage("missing IFA_LOCAL".into()))?;
    extract_address(attr, family)
}
