//! Table snapshots: bulk copies of a cache into one response record.
//!
//! A snapshot record is a fixed prefix (netlink header plus family
//! header), one attribute header and a packed run of raw table entries.
//! The buffer is sized for the table's capacity before the state lock is
//! taken, filled while the lock is held, then trimmed to the entries that
//! were actually copied. Both length fields are rewritten afterwards so
//! that they always describe the buffer as delivered.

use bytes::Bytes;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::attr::{NLA_HDRLEN, NlAttr};
use super::error::{Error, Result};
use super::message::nlmsg_align;

/// A trimmed table snapshot, ready to be queued.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    buf: Vec<u8>,
    attr_offset: usize,
    entries: usize,
}

impl TableSnapshot {
    /// Number of entries copied.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Logical length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Always false; empty tables do not produce a snapshot.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Length declared in the netlink header.
    pub fn declared_len(&self) -> u32 {
        read_u32(&self.buf, 0)
    }

    /// Length declared in the attribute header, including that header.
    pub fn declared_attr_len(&self) -> u16 {
        u16::from_ne_bytes([self.buf[self.attr_offset], self.buf[self.attr_offset + 1]])
    }

    /// Raw entry bytes.
    pub fn entry_bytes(&self) -> &[u8] {
        &self.buf[self.attr_offset + NLA_HDRLEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Copy up to `max_entries` table entries behind `prefix`.
///
/// `prefix` must already hold the netlink header and the family header.
/// `fill` receives a zeroed slice of `max_entries` entries and returns how
/// many it wrote; it is the only place the caller may hold its state lock.
/// Returns `Ok(None)` when nothing was copied.
pub fn snapshot<T, F>(
    prefix: &[u8],
    attr_type: u16,
    max_entries: usize,
    fill: F,
) -> Result<Option<TableSnapshot>>
where
    T: FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned,
    F: FnOnce(&mut [T]) -> Result<usize>,
{
    let entry_size = std::mem::size_of::<T>();
    let attr_offset = nlmsg_align(prefix.len());
    let base = attr_offset + NLA_HDRLEN;
    let capacity = max_entries
        .checked_mul(entry_size)
        .and_then(|n| n.checked_add(base))
        .ok_or_else(|| Error::OutOfMemory(format!("{} snapshot entries", max_entries)))?;
    if NLA_HDRLEN + max_entries * entry_size > u16::MAX as usize {
        return Err(Error::InvalidMessage(format!(
            "{} entries of {} bytes exceed one attribute",
            max_entries, entry_size
        )));
    }

    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity).map_err(|e| {
        tracing::error!(capacity, "failed to allocate snapshot buffer");
        Error::from(e)
    })?;
    buf.resize(capacity, 0);
    buf[..prefix.len()].copy_from_slice(prefix);

    let slots = <[T]>::mut_from_bytes(&mut buf[base..])
        .map_err(|_| Error::InvalidMessage("snapshot entry area misaligned".into()))?;
    let copied = fill(slots)?.min(max_entries);

    if copied == 0 {
        return Ok(None);
    }

    let used = base + copied * entry_size;
    let mut buf = shrink_exact(buf, used);

    buf[0..4].copy_from_slice(&(used as u32).to_ne_bytes());
    let attr = NlAttr::new(attr_type, copied * entry_size);
    buf[attr_offset..base].copy_from_slice(attr.as_bytes());

    Ok(Some(TableSnapshot {
        buf,
        attr_offset,
        entries: copied,
    }))
}

/// Trim `buf` to `len` bytes, moving it into an exactly sized allocation.
///
/// If the smaller allocation cannot be made the original buffer is kept,
/// truncated to `len`.
pub fn shrink_exact(buf: Vec<u8>, len: usize) -> Vec<u8> {
    shrink_with(buf, len, |n| {
        let mut exact = Vec::new();
        exact.try_reserve_exact(n)?;
        Ok(exact)
    })
}

fn shrink_with(
    mut buf: Vec<u8>,
    len: usize,
    alloc: impl FnOnce(usize) -> Result<Vec<u8>>,
) -> Vec<u8> {
    buf.truncate(len);
    match alloc(len) {
        Ok(mut exact) => {
            exact.extend_from_slice(&buf);
            exact
        }
        Err(e) => {
            tracing::warn!(len, capacity = buf.capacity(), error = %e, "keeping oversized snapshot buffer");
            buf
        }
    }
}
