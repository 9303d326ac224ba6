//! Neighbor table snapshot tests.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::common::*;
use nlroute::Result;
use nlroute::netlink::attr::NLA_HDRLEN;
use nlroute::netlink::message::NLMSG_HDRLEN;
use nlroute::netlink::types::neigh::NdMsg;
use nlroute::netlink::{
    ArpEntry, Family, MemoryStack, NeighborEntry, NlMsgType, ResponderConfig, ResponseQueue,
};
use zerocopy::FromBytes;

const SNAPSHOT_BASE: usize = NLMSG_HDRLEN + NdMsg::SIZE + NLA_HDRLEN;

#[test]
fn test_arp_snapshot_trimmed_to_entries() -> Result<()> {
    let stack = TestStack::with_config(
        fixture(),
        ResponderConfig::new().with_arp_table_size(64),
    )?;
    let req = dump(NlMsgType::RTM_GETNEIGH, Family::Inet);

    let (status, records) = stack.send(&req);
    assert_eq!(status, req.len() as isize);
    assert_eq!(records.len(), 2);
    assert_terminated(&records);

    let snap = &records[0];
    assert_eq!(snap.msg_type(), NlMsgType::RTM_GETNEIGH);
    assert_eq!(snap.len(), SNAPSHOT_BASE + 3 * ArpEntry::SIZE);
    assert_eq!(snap.header().nlmsg_len as usize, snap.len());

    let (msg, _) = NdMsg::read_from_prefix(snap.body()).unwrap();
    assert_eq!(msg.ndm_family, Family::Inet.as_u8());

    let (kind, payload) = snap.attrs().next().unwrap();
    assert_eq!(kind, 0);
    assert_eq!(payload.len(), 3 * ArpEntry::SIZE);

    let entries = ArpEntry::slice_from_bytes(payload);
    let ips: Vec<_> = entries.iter().map(ArpEntry::ip).collect();
    assert_eq!(
        ips,
        vec![
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(192, 168, 1, 2),
            Ipv4Addr::new(192, 168, 1, 3),
        ]
    );
    assert_eq!(entries[2].hwaddr, [0x02, 0, 0, 0, 0, 3]);
    assert_eq!(entries[2].ifindex.get(), 2);
    Ok(())
}

#[test]
fn test_arp_snapshot_clamped_to_capacity() -> Result<()> {
    let stack = TestStack::with_config(fixture(), ResponderConfig::new().with_arp_table_size(2))?;
    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETNEIGH, Family::Inet));

    assert_eq!(records[0].len(), SNAPSHOT_BASE + 2 * ArpEntry::SIZE);
    Ok(())
}

#[test]
fn test_ipv6_neighbor_snapshot() -> Result<()> {
    let ip: Ipv6Addr = "fe80::2".parse().unwrap();
    let stack = TestStack::new(fixture().neighbor(ip, [0x02, 0, 0, 0, 0, 9], 2))?;

    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETNEIGH, Family::Inet6));
    assert_terminated(&records);
    assert_eq!(records[0].len(), SNAPSHOT_BASE + NeighborEntry::SIZE);

    let (_, payload) = records[0].attrs().next().unwrap();
    let entries = NeighborEntry::slice_from_bytes(payload);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ip(), ip);
    assert_eq!(entries[0].lladdr(), &[0x02, 0, 0, 0, 0, 9][..]);
    Ok(())
}

#[test]
fn test_empty_neighbor_table_is_enoent() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let (status, records) = stack.send(&dump(NlMsgType::RTM_GETNEIGH, Family::Inet6));

    assert_errno!(status, libc::ENOENT);
    assert!(records.is_empty(), "failed dump must queue nothing");
    Ok(())
}

#[test]
fn test_arp_disabled_rejects_inet() -> Result<()> {
    let stack = TestStack::with_config(fixture(), ResponderConfig::new().with_arp(false))?;

    let (status, _) = stack.send(&dump(NlMsgType::RTM_GETNEIGH, Family::Inet));
    assert_errno!(status, libc::EAFNOSUPPORT);

    let stack = TestStack::with_config(
        MemoryStack::new().neighbor("fe80::2".parse().unwrap(), [2, 0, 0, 0, 0, 1], 1),
        ResponderConfig::new().with_arp(false),
    )?;
    let (status, _) = stack.send(&dump(NlMsgType::RTM_GETNEIGH, Family::Inet6));
    assert!(status > 0);
    Ok(())
}

#[test]
fn test_neighbors_without_arp_or_ipv6() -> Result<()> {
    let config = ResponderConfig::new().with_arp(false).with_ipv6(false);
    let stack = TestStack::with_config(fixture(), config)?;

    for family in [Family::Inet, Family::Inet6] {
        let (status, records) = stack.send(&dump(NlMsgType::RTM_GETNEIGH, family));
        assert_errno!(status, libc::ENOSYS);
        assert!(records.is_empty());
    }
    Ok(())
}

#[test]
fn test_queue_overflow_leaves_nothing() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut queue = ResponseQueue::with_limit(SNAPSHOT_BASE);

    let status = stack
        .responder
        .sendto(&dump(NlMsgType::RTM_GETNEIGH, Family::Inet), &mut queue);
    assert_errno!(status, libc::ENOMEM);
    assert!(queue.is_empty());
    assert_eq!(queue.queued_bytes(), 0);
    Ok(())
}
