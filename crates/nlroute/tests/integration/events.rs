//! Multicast notification tests.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::common::*;
use nlroute::Result;
use nlroute::netlink::types::addr::IfAddrMsg;
use nlroute::netlink::types::prefix::{PrefixMsg, prefix_attr};
use nlroute::netlink::{
    Family, IpRoute, Ipv4Route, LinkType, NetDevice, NlMsgType, PrefixInfo, ResponderConfig,
    RtnlGroup,
};
use tokio_stream::StreamExt;
use zerocopy::FromBytes;

#[test]
fn test_new_address_notifies_group() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut rx = stack.hub.subscribe(RtnlGroup::Ipv4Ifaddr);

    let req = local_request(NlMsgType::RTM_NEWADDR, Family::Inet, 16, 2, &[10, 9, 0, 1]);
    let (status, _) = stack.send(&req);
    assert_eq!(status, req.len() as isize);

    let record = rx.try_recv().unwrap();
    assert_eq!(record.msg_type(), NlMsgType::RTM_NEWADDR);
    assert_eq!(record.header().nlmsg_seq, 0);
    let (msg, _) = IfAddrMsg::read_from_prefix(record.body()).unwrap();
    assert_eq!(msg.ifa_index, 2);
    assert_eq!(msg.ifa_prefixlen, 16);

    assert!(rx.try_recv().unwrap().is_done());
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[test]
fn test_failed_request_does_not_notify() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut rx = stack.hub.subscribe(RtnlGroup::Ipv4Ifaddr);

    let req = local_request(NlMsgType::RTM_NEWADDR, Family::Inet, 33, 2, &[10, 9, 0, 1]);
    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::EINVAL);
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[test]
fn test_delete_notifies_old_address() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut rx = stack.hub.subscribe(RtnlGroup::Ipv4Ifaddr);

    let req = local_request(NlMsgType::RTM_DELADDR, Family::Inet, 24, 2, &[192, 168, 1, 10]);
    stack.send(&req);

    let record = rx.try_recv().unwrap();
    assert_eq!(record.msg_type(), NlMsgType::RTM_DELADDR);
    let (_, local) = record.attrs().next().unwrap();
    assert_eq!(local, &[192, 168, 1, 10][..]);
    Ok(())
}

#[test]
fn test_notifications_go_to_their_group() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut v4 = stack.hub.subscribe(RtnlGroup::Ipv4Ifaddr);
    let mut v6 = stack.hub.subscribe(RtnlGroup::Ipv6Ifaddr);

    let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
    stack.send(&local_request(
        NlMsgType::RTM_NEWADDR,
        Family::Inet6,
        64,
        2,
        &addr.octets(),
    ));

    assert!(v4.try_recv().is_err());
    assert_eq!(v6.try_recv().unwrap().msg_type(), NlMsgType::RTM_NEWADDR);
    Ok(())
}

#[test]
fn test_link_and_route_notifications() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut links = stack.hub.subscribe(RtnlGroup::Link);
    let mut routes = stack.hub.subscribe(RtnlGroup::Ipv4Route);
    let notifier = stack.responder.notifier();

    notifier.link_changed(&NetDevice::new(7, "wlan0", LinkType::Ieee80211));
    let link = links.try_recv().unwrap();
    assert_eq!(link.msg_type(), NlMsgType::RTM_DELLINK);
    assert_eq!(link.body()[0], Family::Packet.as_u8());

    let route = IpRoute::from(Ipv4Route {
        target: Ipv4Addr::new(172, 16, 0, 0),
        netmask: Ipv4Addr::new(255, 240, 0, 0),
        router: Ipv4Addr::new(172, 16, 0, 1),
    });
    notifier.route_changed(&route, NlMsgType::RTM_NEWROUTE);
    let record = routes.try_recv().unwrap();
    assert_eq!(record.msg_type(), NlMsgType::RTM_NEWROUTE);
    assert_eq!(record.attrs().count(), 3);
    assert!(routes.try_recv().unwrap().is_done());
    Ok(())
}

#[test]
fn test_route_notifications_disabled() -> Result<()> {
    let stack = TestStack::with_config(fixture(), ResponderConfig::new().with_routes(false))?;
    let mut routes = stack.hub.subscribe(RtnlGroup::Ipv4Route);

    let route = IpRoute::from(Ipv4Route {
        target: Ipv4Addr::new(172, 16, 0, 0),
        netmask: Ipv4Addr::new(255, 240, 0, 0),
        router: Ipv4Addr::new(172, 16, 0, 1),
    });
    stack
        .responder
        .notifier()
        .route_changed(&route, NlMsgType::RTM_NEWROUTE);
    assert!(routes.try_recv().is_err());
    Ok(())
}

#[test]
fn test_prefix_notification() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut rx = stack.hub.subscribe(RtnlGroup::Ipv6Prefix);

    let prefix: Ipv6Addr = "2001:db8:1::".parse().unwrap();
    let info = PrefixInfo::new(prefix, 64, 0xc0, 86400, 14400);
    stack.responder.notifier().prefix_advertised(2, &info);

    let record = rx.try_recv().unwrap();
    assert_eq!(record.msg_type(), NlMsgType::RTM_NEWPREFIX);
    let (msg, _) = PrefixMsg::read_from_prefix(record.body()).unwrap();
    assert_eq!(msg.prefix_ifindex, 2);
    assert_eq!(msg.prefix_len, 64);
    assert_eq!(msg.prefix_flags, 0xc0);

    let (kind, payload) = record.attrs().next().unwrap();
    assert_eq!(kind, prefix_attr::PREFIX_ADDRESS);
    assert_eq!(payload, &prefix.octets()[..]);
    Ok(())
}

#[tokio::test]
async fn test_address_stream() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut events = Box::pin(stack.hub.stream(RtnlGroup::Ipv4Ifaddr));

    stack
        .responder
        .notifier()
        .address_changed(2, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), 8, NlMsgType::RTM_NEWADDR);

    let record = events.next().await.unwrap();
    assert_eq!(record.msg_type(), NlMsgType::RTM_NEWADDR);
    let done = events.next().await.unwrap();
    assert!(done.is_done());
    Ok(())
}
