//! Address add, delete and dump tests.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::common::*;
use nlroute::Result;
use nlroute::netlink::DeviceTable;
use nlroute::netlink::types::addr::{IFA_F_PERMANENT, IfAddrMsg, ifa};
use nlroute::netlink::{Family, NlMsgType, Record, ResponderConfig};
use zerocopy::FromBytes;

const ETH0_V4: [u8; 4] = [192, 168, 1, 10];

fn eth0_ipv4(stack: &TestStack) -> (Ipv4Addr, u8) {
    stack.with_state(|s| {
        let dev = s.find_by_index(2).unwrap();
        (dev.ipv4_addr, dev.ipv4_prefix_len())
    })
}

fn eth0_ipv6(stack: &TestStack) -> Vec<Ipv6Addr> {
    stack.with_state(|s| s.find_by_index(2).unwrap().ipv6.iter().map(|a| a.addr).collect())
}

fn ifaddr(record: &Record) -> IfAddrMsg {
    IfAddrMsg::read_from_prefix(record.body()).unwrap().0
}

#[test]
fn test_new_ipv4_address() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = local_request(NlMsgType::RTM_NEWADDR, Family::Inet, 32, 2, &[10, 1, 1, 1]);

    let (status, records) = stack.send(&req);
    assert_eq!(status, req.len() as isize);
    assert!(records.is_empty(), "address changes are not acknowledged");
    assert_eq!(eth0_ipv4(&stack), (Ipv4Addr::new(10, 1, 1, 1), 32));
    Ok(())
}

#[test]
fn test_new_ipv4_prefix_too_long() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = local_request(NlMsgType::RTM_NEWADDR, Family::Inet, 33, 2, &[10, 1, 1, 1]);

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::EINVAL);
    assert_eq!(eth0_ipv4(&stack), (Ipv4Addr::from(ETH0_V4), 24));
    Ok(())
}

#[test]
fn test_new_address_requires_local() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = addr_request(
        NlMsgType::RTM_NEWADDR,
        Family::Inet,
        24,
        2,
        &[(ifa::IFA_ADDRESS, &[10, 1, 1, 1][..])],
    );

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::EINVAL);
    assert_eq!(eth0_ipv4(&stack).0, Ipv4Addr::from(ETH0_V4));
    Ok(())
}

#[test]
fn test_policy_checked_before_mutation() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    // Valid IFA_LOCAL followed by a label that is too long.
    let req = addr_request(
        NlMsgType::RTM_NEWADDR,
        Family::Inet,
        24,
        2,
        &[
            (ifa::IFA_LOCAL, &[10, 1, 1, 1][..]),
            (ifa::IFA_LABEL, b"a-label-longer-than-ifnamsiz\0"),
        ],
    );

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::EINVAL);
    assert_eq!(eth0_ipv4(&stack).0, Ipv4Addr::from(ETH0_V4));
    Ok(())
}

#[test]
fn test_new_address_unknown_device() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = local_request(NlMsgType::RTM_NEWADDR, Family::Inet, 24, 99, &[10, 1, 1, 1]);

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::ENODEV);
    Ok(())
}

#[test]
fn test_truncated_ifaddrmsg() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = request(
        NlMsgType::RTM_NEWADDR,
        nlroute::netlink::message::NLM_F_REQUEST,
        &[Family::Inet.as_u8(), 24, 0, 0],
    );

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::EINVAL);
    Ok(())
}

#[test]
fn test_delete_ipv4_twice() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = local_request(NlMsgType::RTM_DELADDR, Family::Inet, 24, 2, &ETH0_V4);

    let (status, records) = stack.send(&req);
    assert_eq!(status, req.len() as isize);
    assert!(records.is_empty());
    assert_eq!(eth0_ipv4(&stack).0, Ipv4Addr::UNSPECIFIED);

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::EADDRNOTAVAIL);
    Ok(())
}

#[test]
fn test_delete_ipv4_wrong_address() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = local_request(NlMsgType::RTM_DELADDR, Family::Inet, 24, 2, &[172, 16, 0, 1]);

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::EADDRNOTAVAIL);
    assert_eq!(eth0_ipv4(&stack).0, Ipv4Addr::from(ETH0_V4));
    Ok(())
}

#[test]
fn test_ipv6_address_lifecycle() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let addr: Ipv6Addr = "2001:db8::10".parse().unwrap();
    let add = local_request(NlMsgType::RTM_NEWADDR, Family::Inet6, 64, 2, &addr.octets());
    let del = local_request(NlMsgType::RTM_DELADDR, Family::Inet6, 64, 2, &addr.octets());

    let (status, _) = stack.send(&add);
    assert_eq!(status, add.len() as isize);
    assert_eq!(eth0_ipv6(&stack), vec![addr]);

    let (status, _) = stack.send(&add);
    assert_errno!(status, libc::EEXIST);
    assert_eq!(eth0_ipv6(&stack).len(), 1);

    let (status, _) = stack.send(&del);
    assert_eq!(status, del.len() as isize);
    assert!(eth0_ipv6(&stack).is_empty());

    let (status, _) = stack.send(&del);
    assert_errno!(status, libc::EADDRNOTAVAIL);
    Ok(())
}

#[test]
fn test_ipv6_prefix_too_long() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let addr: Ipv6Addr = "2001:db8::10".parse().unwrap();
    let req = local_request(NlMsgType::RTM_NEWADDR, Family::Inet6, 129, 2, &addr.octets());

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::EINVAL);
    assert!(eth0_ipv6(&stack).is_empty());
    Ok(())
}

#[test]
fn test_ipv6_local_wrong_width() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = local_request(NlMsgType::RTM_NEWADDR, Family::Inet6, 64, 2, &ETH0_V4);

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::EINVAL);
    Ok(())
}

#[test]
fn test_dump_ipv4_addresses() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = dump(NlMsgType::RTM_GETADDR, Family::Inet);

    let (status, records) = stack.send(&req);
    assert_eq!(status, req.len() as isize);
    assert_eq!(records.len(), 3);
    assert_terminated(&records);

    let eth0 = &records[1];
    assert_eq!(eth0.msg_type(), NlMsgType::RTM_NEWADDR);
    let msg = ifaddr(eth0);
    assert_eq!(msg.ifa_index, 2);
    assert_eq!(msg.ifa_prefixlen, 24);
    assert_eq!(msg.ifa_flags, IFA_F_PERMANENT);
    assert_eq!(eth0.attrs().next(), Some((ifa::IFA_LOCAL, &ETH0_V4[..])));
    Ok(())
}

#[test]
fn test_dump_ipv6_addresses() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETADDR, Family::Inet6));

    // Only lo carries an IPv6 address.
    assert_eq!(records.len(), 2);
    assert_terminated(&records);
    let msg = ifaddr(&records[0]);
    assert_eq!(msg.ifa_family, Family::Inet6.as_u8());
    assert_eq!(msg.ifa_index, 1);
    assert_eq!(msg.ifa_prefixlen, 128);
    Ok(())
}

#[test]
fn test_new_address_disabled() -> Result<()> {
    let stack = TestStack::with_config(fixture(), ResponderConfig::new().with_new_address(false))?;
    let req = local_request(NlMsgType::RTM_NEWADDR, Family::Inet, 24, 2, &[10, 1, 1, 1]);

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::ENOSYS);
    assert_eq!(eth0_ipv4(&stack).0, Ipv4Addr::from(ETH0_V4));
    Ok(())
}

#[test]
fn test_addresses_without_ip_families() -> Result<()> {
    let config = ResponderConfig::new().with_ipv4(false).with_ipv6(false);
    let stack = TestStack::with_config(fixture(), config)?;

    let (status, records) = stack.send(&dump(NlMsgType::RTM_GETADDR, Family::Inet));
    assert_errno!(status, libc::ENOSYS);
    assert!(records.is_empty());

    let req = local_request(NlMsgType::RTM_NEWADDR, Family::Inet, 24, 2, &[10, 1, 1, 1]);
    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::ENOSYS);
    assert_eq!(eth0_ipv4(&stack).0, Ipv4Addr::from(ETH0_V4));
    Ok(())
}
