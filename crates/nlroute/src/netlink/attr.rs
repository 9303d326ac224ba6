//! Netlink attribute (rtattr/nlattr) handling and policy validation.
//!
//! Requests carry a fixed-size family header followed by a TLV stream.
//! [`validate_and_index`] walks that stream once, checks each attribute
//! against a dense [`AttrPolicy`] table and indexes the last occurrence of
//! every known attribute id. Ids above the table's maximum are skipped.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use winnow::binary::{Endianness, u16 as ne_u16};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::{Error, Result};
use super::message::{Family, nlmsg_align};

/// Result type for winnow parsers.
type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4; // nla_align(size_of::<NlAttr>())

/// Netlink attribute header (mirrors struct nlattr / struct rtattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    /// Create a new attribute header.
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Iterator over netlink attributes in a buffer.
///
/// Stops silently at the first malformed header; use
/// [`validate_and_index`] when malformed input must be rejected.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    /// Returns (attribute type, payload data).
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLA_HDRLEN {
            return None;
        }

        let attr = NlAttr::from_bytes(self.data).ok()?;

        let len = attr.nla_len as usize;
        if len < NLA_HDRLEN || len > self.data.len() {
            return None;
        }

        let payload = &self.data[NLA_HDRLEN..len];
        let aligned_len = nla_align(len);

        // Move to next attribute
        if aligned_len >= self.data.len() {
            self.data = &[];
        } else {
            self.data = &self.data[aligned_len..];
        }

        Some((attr.kind(), payload))
    }
}

/// Helper functions for extracting typed values from attribute payloads.
pub mod get {
    use super::*;

    /// Extract a u32 value (native endian).
    pub fn u32_ne(data: &[u8]) -> Result<u32> {
        if data.len() < 4 {
            return Err(Error::InvalidAttribute("truncated u32 attribute".into()));
        }
        Ok(u32::from_ne_bytes([data[0], data[1], data[2], data[3]]))
    }

    /// Extract a null-terminated string.
    pub fn string(data: &[u8]) -> Result<&str> {
        // Find null terminator or use whole buffer
        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..len])
            .map_err(|e| Error::InvalidAttribute(format!("invalid UTF-8: {}", e)))
    }
}

/// Expected payload kind of a policed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Opaque payload; `len` is a minimum (0 = unconstrained).
    Unspec,
    /// Payload of exactly `len` bytes.
    Fixed,
    /// String of at most `len` bytes, trailing NUL not counted.
    String,
    /// Native-endian u32.
    U32,
}

/// Validation rule for one attribute id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrPolicy {
    pub kind: PolicyKind,
    pub len: usize,
}

impl AttrPolicy {
    /// No constraint.
    pub const ANY: Self = Self::min(0);

    /// Opaque payload of at least `len` bytes.
    pub const fn min(len: usize) -> Self {
        Self {
            kind: PolicyKind::Unspec,
            len,
        }
    }

    /// Payload of exactly `len` bytes.
    pub const fn fixed(len: usize) -> Self {
        Self {
            kind: PolicyKind::Fixed,
            len,
        }
    }

    /// String of at most `max` bytes.
    pub const fn string(max: usize) -> Self {
        Self {
            kind: PolicyKind::String,
            len: max,
        }
    }

    /// 32-bit integer.
    pub const fn u32() -> Self {
        Self {
            kind: PolicyKind::U32,
            len: 4,
        }
    }

    /// Check one payload against this rule.
    pub fn check(&self, attr: u16, payload: &[u8]) -> Result<()> {
        let violation = |reason: String| Error::Policy { attr, reason };

        match self.kind {
            PolicyKind::Unspec => {
                if payload.len() < self.len {
                    return Err(violation(format!(
                        "length {} below minimum {}",
                        payload.len(),
                        self.len
                    )));
                }
            }
            PolicyKind::Fixed | PolicyKind::U32 => {
                if payload.len() != self.len {
                    return Err(violation(format!(
                        "length {} but exactly {} required",
                        payload.len(),
                        self.len
                    )));
                }
            }
            PolicyKind::String => {
                let text = match payload.split_last() {
                    Some((0, rest)) => rest,
                    _ => payload,
                };
                if self.len > 0 && text.len() > self.len {
                    return Err(violation(format!(
                        "string length {} exceeds {}",
                        text.len(),
                        self.len
                    )));
                }
            }
        }

        Ok(())
    }
}

/// One indexed attribute: type id and raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr<'a> {
    pub kind: u16,
    pub payload: &'a [u8],
}

/// Attributes of a request, indexed by type id.
#[derive(Debug, Clone)]
pub struct AttrTable<'a> {
    slots: Vec<Option<&'a [u8]>>,
}

impl<'a> AttrTable<'a> {
    fn with_max(max_attr: u16) -> Self {
        Self {
            slots: vec![None; max_attr as usize + 1],
        }
    }

    /// Get the last occurrence of an attribute.
    pub fn get(&self, kind: u16) -> Option<Attr<'a>> {
        self.slots
            .get(kind as usize)
            .copied()
            .flatten()
            .map(|payload| Attr { kind, payload })
    }

    /// Check whether an attribute was present.
    pub fn contains(&self, kind: u16) -> bool {
        self.get(kind).is_some()
    }

    /// Number of distinct attributes present.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True when no known attribute was present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_attr_header(input: &mut &[u8]) -> PResult<(u16, u16)> {
    let len = ne_u16(Endianness::Native).parse_next(input)?;
    let kind = ne_u16(Endianness::Native).parse_next(input)?;
    Ok((len, kind))
}

/// Walk the TLV stream after a fixed `header_size`-byte family header.
///
/// With a policy, its length must be `max_attr + 1`; every attribute with
/// an id up to `max_attr` is checked against it. Without one, attributes
/// are only indexed. Later duplicates overwrite earlier ones.
pub fn validate_and_index<'a>(
    body: &'a [u8],
    header_size: usize,
    max_attr: u16,
    policy: Option<&[AttrPolicy]>,
) -> Result<AttrTable<'a>> {
    if let Some(policy) = policy {
        debug_assert_eq!(policy.len(), max_attr as usize + 1);
    }

    if body.len() < header_size {
        return Err(Error::Truncated {
            expected: header_size,
            actual: body.len(),
        });
    }

    let mut table = AttrTable::with_max(max_attr);
    let mut input = body.get(nlmsg_align(header_size)..).unwrap_or(&[]);

    while input.len() >= NLA_HDRLEN {
        let remaining = input.len();
        let (len, raw_kind) = parse_attr_header(&mut input)
            .map_err(|_| Error::InvalidAttribute("unreadable attribute header".into()))?;

        let len = len as usize;
        if len < NLA_HDRLEN {
            return Err(Error::InvalidAttribute(format!(
                "attribute length {} shorter than header",
                len
            )));
        }
        if len > remaining {
            return Err(Error::Truncated {
                expected: len,
                actual: remaining,
            });
        }

        let payload: &[u8] = take(len - NLA_HDRLEN)
            .parse_next(&mut input)
            .map_err(|_: ErrMode<ContextError>| Error::Truncated {
                expected: len,
                actual: remaining,
            })?;
        let padding = (nla_align(len) - len).min(input.len());
        input = &input[padding..];

        let kind = raw_kind & NLA_TYPE_MASK;
        if kind > max_attr {
            tracing::trace!(attr = kind, "skipping unknown attribute");
            continue;
        }

        if let Some(rule) = policy.and_then(|p| p.get(kind as usize)) {
            rule.check(kind, payload)?;
        }
        table.slots[kind as usize] = Some(payload);
    }

    if !input.is_empty() {
        tracing::warn!(bytes = input.len(), "bytes leftover after parsing attributes");
    }

    Ok(table)
}

/// Read a u32 attribute; the payload must be exactly 4 bytes.
pub fn extract_u32(attr: Attr<'_>) -> Result<u32> {
    let bytes: [u8; 4] = attr.payload.try_into().map_err(|_| Error::TypeMismatch {
        attr: attr.kind,
        expected: 4,
        actual: attr.payload.len(),
    })?;
    Ok(u32::from_ne_bytes(bytes))
}

/// Read a network-order address attribute whose width matches `family`.
pub fn extract_address(attr: Attr<'_>, family: Family) -> Result<IpAddr> {
    let mismatch = |expected| Error::TypeMismatch {
        attr: attr.kind,
        expected,
        actual: attr.payload.len(),
    };

    match family {
        Family::Inet => {
            let octets: [u8; 4] = attr.payload.try_into().map_err(|_| mismatch(4))?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        Family::Inet6 => {
            let octets: [u8; 16] = attr.payload.try_into().map_err(|_| mismatch(16))?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        other => Err(Error::FamilyNotSupported {
            family: other.as_u8(),
        }),
    }
}
