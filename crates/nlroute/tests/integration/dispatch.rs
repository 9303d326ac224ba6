//! Dispatch, error reporting and byte count tests.

use std::sync::{Arc, RwLock};

use crate::common::*;
use nlroute::Result;
use nlroute::netlink::message::NLM_F_REQUEST;
use nlroute::netlink::{
    Family, GroupHub, MemoryStack, NlMsgType, Responder, ResponderConfig, ResponseQueue,
};

#[test]
fn test_unknown_type_is_enosys() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = request(NlMsgType::RTM_NEWLINK, NLM_F_REQUEST, &[0; 16]);

    let (status, records) = stack.send(&req);
    assert_errno!(status, libc::ENOSYS);
    assert!(records.is_empty());
    Ok(())
}

#[test]
fn test_disabled_type_is_enosys() -> Result<()> {
    let stack = TestStack::with_config(fixture(), ResponderConfig::new().with_get_link(false))?;
    let (status, records) = stack.send(&dump(NlMsgType::RTM_GETLINK, Family::Unspec));
    assert_errno!(status, libc::ENOSYS);
    assert!(records.is_empty());
    Ok(())
}

#[test]
fn test_disabled_family_is_eafnosupport() -> Result<()> {
    let stack = TestStack::with_config(fixture(), ResponderConfig::new().with_ipv6(false))?;

    let (status, _) = stack.send(&dump(NlMsgType::RTM_GETADDR, Family::Inet6));
    assert_errno!(status, libc::EAFNOSUPPORT);

    let req = dump(NlMsgType::RTM_GETADDR, Family::Inet);
    let (status, _) = stack.send(&req);
    assert_eq!(status, req.len() as isize);
    Ok(())
}

#[test]
fn test_short_buffer_is_einval() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let req = dump(NlMsgType::RTM_GETLINK, Family::Unspec);

    let (status, records) = stack.send(&req[..10]);
    assert_errno!(status, libc::EINVAL);
    assert!(records.is_empty());
    Ok(())
}

#[test]
fn test_length_beyond_buffer_is_einval() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut req = dump(NlMsgType::RTM_GETLINK, Family::Unspec);
    let bogus = (req.len() as u32 + 64).to_ne_bytes();
    req[..4].copy_from_slice(&bogus);

    let (status, _) = stack.send(&req);
    assert_errno!(status, libc::EINVAL);
    Ok(())
}

#[test]
fn test_consumed_is_full_buffer() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut req = dump(NlMsgType::RTM_GETROUTE, Family::Inet);
    // Trailing bytes past nlmsg_len are handed over but not parsed.
    req.extend_from_slice(&[0; 8]);

    let (status, records) = stack.send(&req);
    assert_eq!(status, req.len() as isize);
    assert_terminated(&records);
    Ok(())
}

#[test]
fn test_successive_dumps_share_queue() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let mut queue = ResponseQueue::new();

    stack
        .responder
        .handle(&dump(NlMsgType::RTM_GETLINK, Family::Unspec), &mut queue)?;
    stack
        .responder
        .handle(&dump(NlMsgType::RTM_GETROUTE, Family::Inet), &mut queue)?;
    // A failed dump in between leaves the queue untouched.
    assert!(
        stack
            .responder
            .handle(&dump(NlMsgType::RTM_GETNEIGH, Family::Inet6), &mut queue)
            .is_err()
    );

    let records = queue.drain();
    assert_eq!(records.len(), 3 + 2);
    assert_terminated(&records[..3]);
    assert_terminated(&records[3..]);
    Ok(())
}

#[test]
fn test_terminator_echoes_request() -> Result<()> {
    let stack = TestStack::new(fixture())?;
    let (_, records) = stack.send(&dump(NlMsgType::RTM_GETROUTE, Family::Inet));

    let done = records.last().unwrap();
    assert_eq!(done.msg_type(), NlMsgType::DONE);
    assert_eq!(done.header().nlmsg_seq, SEQ);
    assert_eq!(done.header().nlmsg_pid, PID);
    assert!(done.header().is_multi());
    assert_eq!(done.body(), &[0u8; 4][..]);
    Ok(())
}

#[test]
fn test_oversized_table_config_rejected() {
    let hub = Arc::new(GroupHub::default());
    let err = Responder::new(
        Arc::new(RwLock::new(MemoryStack::new())),
        ResponderConfig::new().with_arp_table_size(1 << 16),
        hub,
    )
    .unwrap_err();
    assert!(err.is_invalid());
}

#[test]
fn test_config_from_json() -> Result<()> {
    let config = ResponderConfig::from_json(r#"{"arp": false, "arp_table_size": 4}"#)?;
    assert!(!config.arp);
    assert!(config.ipv4);
    assert_eq!(config.arp_table_size, 4);

    let stack = TestStack::with_config(fixture(), config)?;
    let (status, _) = stack.send(&dump(NlMsgType::RTM_GETNEIGH, Family::Inet));
    assert_errno!(status, libc::EAFNOSUPPORT);
    Ok(())
}
