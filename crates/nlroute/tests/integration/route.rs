//! Routing table dump tests.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::common::*;
use nlroute::Result;
use nlroute::netlink::types::route::{RtMsg, rta};
use nlroute::netlink::{Family, MemoryStack, NlMsgType, ResponderConfig};
use zerocopy::FromBytes;

#[test]
fn test_get_ipv4_routes() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = dump(NlMsgType::RTM_GETROUTE, Family::Inet);

    let (status, records) = stack.send(&req);
    assert_eq!(status, req.len() as isize);
    assert_eq!(records.len(), 2);
    assert_terminated(&records);

    let route = &records[0];
    assert_eq!(route.msg_type(), NlMsgType::RTM_NEWROUTE);
    let (msg, _) = RtMsg::read_from_prefix(route.body()).unwrap();
    assert_eq!(msg.rtm_family, Family::Inet.as_u8());
    assert_eq!(msg.rtm_dst_len, 24);

    let attrs: Vec<_> = route.attrs().collect();
    assert_eq!(
        attrs,
        vec![
            (rta::RTA_DST, &Ipv4Addr::new(10, 0, 0, 0).octets()[..]),
            (rta::RTA_GENMASK, &Ipv4Addr::new(255, 255, 255, 0).octets()[..]),
            (rta::RTA_GATEWAY, &Ipv4Addr::new(10, 0, 0, 1).octets()[..]),
        ]
    );
    Ok(())
}

#[test]
fn test_get_ipv6_routes() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETROUTE, Family::Inet6));
    assert_eq!(records.len(), 2);
    assert_terminated(&records);

    let (msg, _) = RtMsg::read_from_prefix(records[0].body()).unwrap();
    assert_eq!(msg.rtm_family, Family::Inet6.as_u8());
    assert_eq!(msg.rtm_dst_len, 64);

    let gateway: Ipv6Addr = "fe80::1".parse().unwrap();
    let (kind, payload) = records[0].attrs().nth(2).unwrap();
    assert_eq!(kind, rta::RTA_GATEWAY);
    assert_eq!(payload, &gateway.octets()[..]);
    Ok(())
}

#[test]
fn test_empty_route_table() -> Result<()> {
    let stack = TestStack::new(MemoryStack::new())?;
    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETROUTE, Family::Inet));
    assert_eq!(records.len(), 1);
    assert_terminated(&records);
    Ok(())
}

#[test]
fn test_routes_disabled() -> Result<()> {
    let stack = TestStack::with_config(fixture(), ResponderConfig::new().with_routes(false))?;
    for family in [Family::Inet, Family::Inet6] {
        let (status, records) = stack.send(&dump(NlMsgType::RTM_GETROUTE, family));
        assert_errno!(status, libc::ENOSYS);
        assert!(records.is_empty());
    }
    Ok(())
}

#[test]
fn test_routes_without_ip_families() -> Result<()> {
    let config = ResponderConfig::new().with_ipv4(false).with_ipv6(false);
    let stack = TestStack::with_config(fixture(), config)?;
    let (status, records) = stack.send(&dump(NlMsgType::RTM_GETROUTE, Family::Inet));
    assert_errno!(status, libc::ENOSYS);
    assert!(records.is_empty());
    Ok(())
}

#[test]
fn test_route_family_unsupported() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let (status, records) = stack.send(&dump(NlMsgType::RTM_GETROUTE, Family::Packet));
    assert_errno!(status, libc::EAFNOSUPPORT);
    assert!(records.is_empty());
    Ok(())
}
