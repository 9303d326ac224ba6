//! Netlink message header, request view and parsing.

use super::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Create a new message header.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Header for a response: flags, sequence and port are copied from the
    /// originating request, or zeroed when there is none.
    pub fn reply_to(msg_type: u16, request: Option<&NlMsgHdr>) -> Self {
        match request {
            Some(req) => Self {
                nlmsg_len: NLMSG_HDRLEN as u32,
                nlmsg_type: msg_type,
                nlmsg_flags: req.nlmsg_flags,
                nlmsg_seq: req.nlmsg_seq,
                nlmsg_pid: req.nlmsg_pid,
            },
            None => Self::new(msg_type, 0),
        }
    }

    /// Check if this is a done message.
    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NlMsgType::DONE
    }

    /// Check if this message has the multi flag.
    pub fn is_multi(&self) -> bool {
        self.nlmsg_flags & NLM_F_MULTI != 0
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse header from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Standard netlink and rtnetlink message types.
pub struct NlMsgType;

impl NlMsgType {
    /// No operation, message must be discarded.
    pub const NOOP: u16 = 1;
    /// Error message or ACK.
    pub const ERROR: u16 = 2;
    /// End of multipart message.
    pub const DONE: u16 = 3;

    // Link messages
    pub const RTM_NEWLINK: u16 = 16;
    pub const RTM_DELLINK: u16 = 17;
    pub const RTM_GETLINK: u16 = 18;

    // Address messages
    pub const RTM_NEWADDR: u16 = 20;
    pub const RTM_DELADDR: u16 = 21;
    pub const RTM_GETADDR: u16 = 22;

    // Route messages
    pub const RTM_NEWROUTE: u16 = 24;
    pub const RTM_DELROUTE: u16 = 25;
    pub const RTM_GETROUTE: u16 = 26;

    // Neighbor messages
    pub const RTM_NEWNEIGH: u16 = 28;
    pub const RTM_DELNEIGH: u16 = 29;
    pub const RTM_GETNEIGH: u16 = 30;

    // Prefix messages (outbound only)
    pub const RTM_NEWPREFIX: u16 = 52;

    /// Short name for logging.
    pub fn name(msg_type: u16) -> &'static str {
        match msg_type {
            Self::NOOP => "NOOP",
            Self::ERROR => "ERROR",
            Self::DONE => "DONE",
            Self::RTM_NEWLINK => "RTM_NEWLINK",
            Self::RTM_DELLINK => "RTM_DELLINK",
            Self::RTM_GETLINK => "RTM_GETLINK",
            Self::RTM_NEWADDR => "RTM_NEWADDR",
            Self::RTM_DELADDR => "RTM_DELADDR",
            Self::RTM_GETADDR => "RTM_GETADDR",
            Self::RTM_NEWROUTE => "RTM_NEWROUTE",
            Self::RTM_DELROUTE => "RTM_DELROUTE",
            Self::RTM_GETROUTE => "RTM_GETROUTE",
            Self::RTM_NEWNEIGH => "RTM_NEWNEIGH",
            Self::RTM_DELNEIGH => "RTM_DELNEIGH",
            Self::RTM_GETNEIGH => "RTM_GETNEIGH",
            Self::RTM_NEWPREFIX => "RTM_NEWPREFIX",
            _ => "UNKNOWN",
        }
    }
}

/// Netlink message flags.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;

// Modifiers to GET request
pub const NLM_F_ROOT: u16 = 0x100;
pub const NLM_F_MATCH: u16 = 0x200;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

// Modifiers to NEW request
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;

/// Address family carried in the first byte of every rtnetlink body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Unspec,
    Inet,
    Inet6,
    Packet,
    Other(u8),
}

impl Family {
    /// Raw AF_* value.
    pub fn as_u8(self) -> u8 {
        match self {
            Family::Unspec => libc::AF_UNSPEC as u8,
            Family::Inet => libc::AF_INET as u8,
            Family::Inet6 => libc::AF_INET6 as u8,
            Family::Packet => libc::AF_PACKET as u8,
            Family::Other(v) => v,
        }
    }

    /// Width of a network address in this family, if it has one.
    pub fn addr_len(self) -> Option<usize> {
        match self {
            Family::Inet => Some(4),
            Family::Inet6 => Some(16),
            _ => None,
        }
    }
}

impl From<u8> for Family {
    fn from(val: u8) -> Self {
        match val as i32 {
            libc::AF_UNSPEC => Family::Unspec,
            libc::AF_INET => Family::Inet,
            libc::AF_INET6 => Family::Inet6,
            libc::AF_PACKET => Family::Packet,
            _ => Family::Other(val),
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::Unspec => write!(f, "unspec"),
            Family::Inet => write!(f, "inet"),
            Family::Inet6 => write!(f, "inet6"),
            Family::Packet => write!(f, "packet"),
            Family::Other(v) => write!(f, "family({})", v),
        }
    }
}

/// A received rtnetlink request.
///
/// Borrowed from the transport's buffer for the duration of one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    header: NlMsgHdr,
    /// Everything after the netlink header, up to `nlmsg_len`.
    body: &'a [u8],
    /// Bytes handed over by the transport.
    consumed: usize,
}

impl<'a> Request<'a> {
    /// Parse and bounds-check a raw request.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let (header, _) = NlMsgHdr::read_from_prefix(data).map_err(|_| Error::Truncated {
            expected: NLMSG_HDRLEN,
            actual: data.len(),
        })?;

        let msg_len = header.nlmsg_len as usize;
        if msg_len < NLMSG_HDRLEN {
            return Err(Error::InvalidMessage(format!(
                "message length {} shorter than header",
                msg_len
            )));
        }
        if msg_len > data.len() {
            return Err(Error::Truncated {
                expected: msg_len,
                actual: data.len(),
            });
        }

        Ok(Self {
            header,
            body: &data[NLMSG_HDRLEN..msg_len],
            consumed: data.len(),
        })
    }

    /// The request header.
    pub fn header(&self) -> &NlMsgHdr {
        &self.header
    }

    /// Message type.
    pub fn msg_type(&self) -> u16 {
        self.header.nlmsg_type
    }

    /// Address family (first byte of the body; UNSPEC for an empty body).
    pub fn family(&self) -> Family {
        self.body.first().copied().map(Family::from).unwrap_or(Family::Unspec)
    }

    /// Message body after the netlink header.
    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    /// Length reported back to the transport on success.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}
