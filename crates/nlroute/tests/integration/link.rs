//! Link dump tests.

use crate::common::*;
use nlroute::Result;
use nlroute::netlink::attr::get;
use nlroute::netlink::types::link::{IfInfoMsg, arphrd, ifla, iff};
use nlroute::netlink::{Family, LinkType, MemoryStack, NetDevice, NlMsgType, Record};
use zerocopy::FromBytes;

fn info(record: &Record) -> IfInfoMsg {
    IfInfoMsg::read_from_prefix(record.body()).unwrap().0
}

fn attr<'a>(record: &'a Record, kind: u16) -> &'a [u8] {
    record
        .attrs()
        .find(|(k, _)| *k == kind)
        .map(|(_, payload)| payload)
        .unwrap_or_else(|| panic!("attribute {} missing", kind))
}

#[test]
fn test_dump_links_round_trip() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = dump(NlMsgType::RTM_GETLINK, Family::Unspec);

    let (status, records) = stack.send(&req);
    assert_eq!(status, req.len() as isize);
    assert_eq!(records.len(), 3);
    assert_terminated(&records);

    let eth0 = &records[1];
    assert_eq!(eth0.msg_type(), NlMsgType::RTM_NEWLINK);
    assert_eq!(eth0.header().nlmsg_seq, SEQ);
    assert_eq!(eth0.header().nlmsg_pid, PID);
    assert_eq!(eth0.header().nlmsg_len as usize, eth0.len());

    let msg = info(eth0);
    assert_eq!(msg.ifi_index, 2);
    assert_eq!(msg.ifi_type, arphrd::ARPHRD_ETHER);
    assert_eq!(msg.ifi_change, 0xffff_ffff);
    assert_ne!(msg.ifi_flags & iff::UP, 0);

    assert_eq!(get::u32_ne(attr(eth0, ifla::IFLA_MTU))?, 1500);
    assert_eq!(attr(eth0, ifla::IFLA_ADDRESS), &ETH0_MAC[..]);
    assert_eq!(get::string(attr(eth0, ifla::IFLA_IFNAME))?, "eth0");
    Ok(())
}

#[test]
fn test_attribute_order() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETLINK, Family::Unspec));

    let kinds: Vec<u16> = records[0].attrs().map(|(k, _)| k).collect();
    assert_eq!(kinds, vec![ifla::IFLA_MTU, ifla::IFLA_ADDRESS, ifla::IFLA_IFNAME]);
    Ok(())
}

#[test]
fn test_down_device_reported_as_dellink() -> Result<()> {
    let stack = TestStack::new(
        MemoryStack::new().device(NetDevice::new(3, "eth1", LinkType::Ethernet)),
    )?;
    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETLINK, Family::Unspec));

    assert_eq!(records[0].msg_type(), NlMsgType::RTM_DELLINK);
    assert_eq!(info(&records[0]).ifi_flags & iff::UP, 0);
    Ok(())
}

#[test]
fn test_link_without_hwaddr_reports_zeroes() -> Result<()> {
    let stack = TestStack::new(
        MemoryStack::new().device(
            NetDevice::new(4, "sl0", LinkType::Slip)
                .up()
                .hwaddr([1, 2, 3, 4, 5, 6]),
        ),
    )?;
    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETLINK, Family::Unspec));

    assert_eq!(info(&records[0]).ifi_type, arphrd::ARPHRD_SLIP);
    assert_eq!(attr(&records[0], ifla::IFLA_ADDRESS), &[0u8; 6][..]);
    Ok(())
}

#[test]
fn test_unknown_link_type_is_void() -> Result<()> {
    let stack = TestStack::new(
        MemoryStack::new().device(NetDevice::new(5, "x0", LinkType::Unknown(42)).up()),
    )?;
    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETLINK, Family::Unspec));
    assert_eq!(info(&records[0]).ifi_type, arphrd::ARPHRD_VOID);
    Ok(())
}

#[test]
fn test_long_name_truncated() -> Result<()> {
    let stack = TestStack::new(
        MemoryStack::new()
            .device(NetDevice::new(6, "averyveryverylongname", LinkType::Ethernet).up()),
    )?;
    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETLINK, Family::Unspec));

    let name = attr(&records[0], ifla::IFLA_IFNAME);
    assert_eq!(name.len(), 16);
    assert_eq!(get::string(name)?, "averyveryverylo");
    Ok(())
}

#[test]
fn test_no_devices_yields_only_terminator() -> Result<()> {
    let stack = TestStack::new(MemoryStack::new())?;
    let req = dump(NlMsgType::RTM_GETLINK, Family::Unspec);

    let (status, records) = stack.send(&req);
    assert_eq!(status, req.len() as isize);
    assert_eq!(records.len(), 1);
    assert_terminated(&records);
    Ok(())
}
