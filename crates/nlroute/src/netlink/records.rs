//! Response record construction.
//!
//! Each constructor produces one complete, length-stamped netlink message
//! for a single entity. Attribute order inside a record is fixed per kind.
//! Header flags, sequence and port are copied from the originating request
//! when there is one and zeroed for unsolicited notifications.

use std::net::IpAddr;

use bytes::Bytes;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::attr::AttrIter;
use super::builder::MessageBuilder;
use super::error::Result;
use super::message::{Family, NLM_F_MULTI, NLMSG_HDRLEN, NlMsgHdr, NlMsgType, nlmsg_align};
use super::snapshot::{TableSnapshot, snapshot};
use super::state::{IpRoute, NetDevice};
use super::types::addr::{IFA_F_PERMANENT, IfAddrMsg, ifa, scope};
use super::types::link::{ETH_ALEN, IFNAMSIZ, IfInfoMsg, arphrd, ifla};
use super::types::neigh::{NDA_UNSPEC, NdMsg};
use super::types::prefix::{PrefixCacheInfo, PrefixInfo, PrefixMsg, prefix_attr};
use super::types::route::{RTN_UNICAST, RTPROT_STATIC, RT_TABLE_MAIN, RtMsg, rta};

/// Entity kind carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Link,
    Neighbor,
    Route,
    Address,
    Prefix,
    /// End-of-dump marker.
    Done,
}

impl RecordKind {
    /// Size of the family header that precedes the attributes.
    pub fn header_size(self) -> usize {
        match self {
            RecordKind::Link => IfInfoMsg::SIZE,
            RecordKind::Neighbor => NdMsg::SIZE,
            RecordKind::Route => RtMsg::SIZE,
            RecordKind::Address => IfAddrMsg::SIZE,
            RecordKind::Prefix => PrefixMsg::SIZE,
            RecordKind::Done => 4,
        }
    }
}

/// One framed response message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    kind: RecordKind,
    bytes: Bytes,
}

impl Record {
    pub(crate) fn new(kind: RecordKind, bytes: impl Into<Bytes>) -> Self {
        Self {
            kind,
            bytes: bytes.into(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Netlink header.
    pub fn header(&self) -> NlMsgHdr {
        NlMsgHdr::read_from_prefix(&self.bytes)
            .map(|(hdr, _)| hdr)
            .unwrap_or_default()
    }

    pub fn msg_type(&self) -> u16 {
        self.header().nlmsg_type
    }

    /// Everything after the netlink header.
    pub fn body(&self) -> &[u8] {
        self.bytes.get(NLMSG_HDRLEN..).unwrap_or(&[])
    }

    /// Attributes following the family header.
    pub fn attrs(&self) -> AttrIter<'_> {
        let start = nlmsg_align(self.kind.header_size());
        AttrIter::new(self.body().get(start..).unwrap_or(&[]))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn is_done(&self) -> bool {
        self.kind == RecordKind::Done
    }
}

fn request_header(request: Option<&NlMsgHdr>, msg_type: u16) -> NlMsgHdr {
    NlMsgHdr::reply_to(msg_type, request)
}

/// Link record for one device.
///
/// `request` carries the originating header and family; notifications pass
/// `None` and are reported in the PACKET family.
pub fn link_record(dev: &NetDevice, request: Option<(&NlMsgHdr, Family)>) -> Result<Record> {
    let msg_type = if dev.is_up() {
        NlMsgType::RTM_NEWLINK
    } else {
        NlMsgType::RTM_DELLINK
    };

    let ifi_type = dev.link_type.arphrd().unwrap_or_else(|| {
        tracing::warn!(
            device = %dev.name,
            link_type = ?dev.link_type,
            "no hardware type for link layer"
        );
        arphrd::ARPHRD_VOID
    });

    let info = IfInfoMsg {
        ifi_family: request
            .map(|(_, family)| family)
            .unwrap_or(Family::Packet)
            .as_u8(),
        ifi_pad: 0,
        ifi_type,
        ifi_index: dev.index as i32,
        ifi_flags: dev.flags,
        ifi_change: 0xffff_ffff,
    };

    let hwaddr = if dev.link_type.has_hwaddr() {
        dev.hwaddr
    } else {
        [0; ETH_ALEN]
    };

    let mut builder = MessageBuilder::try_new(
        request_header(request.map(|(hdr, _)| hdr), msg_type),
        NLMSG_HDRLEN + IfInfoMsg::SIZE + 8 + 12 + 4 + IFNAMSIZ,
    )?;
    builder.append(&info)?;
    builder.append_attr_u32(ifla::IFLA_MTU, dev.mtu_value())?;
    builder.append_attr(ifla::IFLA_ADDRESS, &hwaddr)?;
    builder.append_attr_str(ifla::IFLA_IFNAME, &dev.name, IFNAMSIZ)?;

    Ok(Record::new(RecordKind::Link, builder.finish()))
}

/// Address record carrying one local address.
pub fn address_record(
    ifindex: u32,
    addr: IpAddr,
    prefix_len: u8,
    msg_type: u16,
    request: Option<&NlMsgHdr>,
) -> Result<Record> {
    let (family, octets): (Family, Vec<u8>) = match addr {
        IpAddr::V4(v4) => (Family::Inet, v4.octets().to_vec()),
        IpAddr::V6(v6) => (Family::Inet6, v6.octets().to_vec()),
    };

    let msg = IfAddrMsg {
        ifa_family: family.as_u8(),
        ifa_prefixlen: prefix_len,
        ifa_flags: IFA_F_PERMANENT,
        ifa_scope: scope::RT_SCOPE_UNIVERSE,
        ifa_index: ifindex,
    };

    let mut builder = MessageBuilder::try_new(
        request_header(request, msg_type),
        NLMSG_HDRLEN + IfAddrMsg::SIZE + 4 + octets.len(),
    )?;
    builder.append(&msg)?;
    builder.append_attr(ifa::IFA_LOCAL, &octets)?;

    Ok(Record::new(RecordKind::Address, builder.finish()))
}

/// Route record: destination, genmask and gateway, in that order.
pub fn route_record(route: &IpRoute, msg_type: u16, request: Option<&NlMsgHdr>) -> Result<Record> {
    let msg = RtMsg {
        rtm_family: route.family().as_u8(),
        rtm_dst_len: route.dst_len(),
        rtm_src_len: 0,
        rtm_tos: 0,
        rtm_table: RT_TABLE_MAIN,
        rtm_protocol: RTPROT_STATIC,
        rtm_scope: scope::RT_SCOPE_SITE,
        rtm_type: RTN_UNICAST,
        rtm_flags: 0,
    };

    let mut builder = MessageBuilder::try_new(
        request_header(request, msg_type),
        NLMSG_HDRLEN + RtMsg::SIZE + 3 * (4 + 16),
    )?;
    builder.append(&msg)?;
    match route {
        IpRoute::V4(r) => {
            builder.append_attr(rta::RTA_DST, &r.target.octets())?;
            builder.append_attr(rta::RTA_GENMASK, &r.netmask.octets())?;
            builder.append_attr(rta::RTA_GATEWAY, &r.router.octets())?;
        }
        IpRoute::V6(r) => {
            builder.append_attr(rta::RTA_DST, &r.target.octets())?;
            builder.append_attr(rta::RTA_GENMASK, &r.netmask.octets())?;
            builder.append_attr(rta::RTA_GATEWAY, &r.router.octets())?;
        }
    }

    Ok(Record::new(RecordKind::Route, builder.finish()))
}

fn neighbor_prefix(family: Family) -> NdMsg {
    NdMsg {
        ndm_family: family.as_u8(),
        ..Default::default()
    }
}

/// Neighbor record carrying one raw table entry.
pub fn neighbor_record(
    family: Family,
    entry: &[u8],
    msg_type: u16,
    request: Option<&NlMsgHdr>,
) -> Result<Record> {
    let mut builder = MessageBuilder::try_new(
        request_header(request, msg_type),
        NLMSG_HDRLEN + NdMsg::SIZE + 4 + entry.len(),
    )?;
    builder.append(&neighbor_prefix(family))?;
    builder.append_attr(NDA_UNSPEC, entry)?;
    Ok(Record::new(RecordKind::Neighbor, builder.finish()))
}

/// Neighbor dump record holding a whole table snapshot in one attribute.
///
/// `fill` copies entries under the caller's state lock. Returns `Ok(None)`
/// when the table is empty.
pub fn neighbor_table_record<T, F>(
    family: Family,
    request: Option<&NlMsgHdr>,
    max_entries: usize,
    fill: F,
) -> Result<Option<Record>>
where
    T: FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned,
    F: FnOnce(&mut [T]) -> Result<usize>,
{
    let msg_type = NlMsgType::RTM_GETNEIGH;
    let mut prefix = MessageBuilder::try_new(
        request_header(request, msg_type),
        NLMSG_HDRLEN + NdMsg::SIZE,
    )?;
    prefix.append(&neighbor_prefix(family))?;

    let snap: Option<TableSnapshot> = snapshot(prefix.as_bytes(), NDA_UNSPEC, max_entries, fill)?;
    Ok(snap.map(|s| Record::new(RecordKind::Neighbor, s.into_bytes())))
}

/// Prefix notification built from a received prefix-information option.
pub fn prefix_record(ifindex: u32, info: &PrefixInfo) -> Result<Record> {
    let msg = PrefixMsg {
        prefix_family: Family::Inet6.as_u8(),
        prefix_ifindex: ifindex as i32,
        prefix_type: info.opt_type,
        prefix_len: info.prefix_len,
        prefix_flags: info.flags,
        ..Default::default()
    };
    let cache = PrefixCacheInfo {
        preferred_time: info.preferred_time(),
        valid_time: info.valid_time(),
    };

    let mut builder = MessageBuilder::try_new(
        NlMsgHdr::new(NlMsgType::RTM_NEWPREFIX, 0),
        NLMSG_HDRLEN + PrefixMsg::SIZE + 4 + 16 + 4 + 8,
    )?;
    builder.append(&msg)?;
    builder.append_attr(prefix_attr::PREFIX_ADDRESS, &info.prefix)?;
    builder.append_attr(prefix_attr::PREFIX_CACHEINFO, cache.as_bytes())?;

    Ok(Record::new(RecordKind::Prefix, builder.finish()))
}

/// End-of-dump marker with a zero status.
pub fn done_record(request: Option<&NlMsgHdr>) -> Result<Record> {
    let mut header = NlMsgHdr::reply_to(NlMsgType::DONE, request);
    header.nlmsg_flags = NLM_F_MULTI;

    let mut builder = MessageBuilder::try_new(header, NLMSG_HDRLEN + 4)?;
    builder.append_bytes(&0i32.to_ne_bytes())?;
    Ok(Record::new(RecordKind::Done, builder.finish()))
}
