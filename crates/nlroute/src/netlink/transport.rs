//! Delivery of response records.
//!
//! Replies to a request go to a [`ResponseSink`], the requester's queue.
//! Unsolicited notifications go to a [`GroupSink`] under one of the
//! rtnetlink multicast groups. [`GroupHub`] is an in-process group sink
//! backed by tokio broadcast channels.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use super::error::{Error, Result};
use super::records::Record;

/// Requester-side response queue.
pub trait ResponseSink {
    /// Queue a batch of records. Either every record is queued or, on
    /// error, none is.
    fn commit(&mut self, batch: Vec<Record>) -> Result<()>;
}

impl ResponseSink for Vec<Record> {
    fn commit(&mut self, batch: Vec<Record>) -> Result<()> {
        self.try_reserve(batch.len())?;
        self.extend(batch);
        Ok(())
    }
}

/// In-memory response queue with an optional byte limit.
#[derive(Debug, Clone)]
pub struct ResponseQueue {
    records: VecDeque<Record>,
    queued_bytes: usize,
    limit: usize,
}

impl ResponseQueue {
    /// Unbounded queue.
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// Queue that refuses batches once `limit` bytes are pending.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            queued_bytes: 0,
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bytes currently queued.
    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes
    }

    /// Take the oldest record.
    pub fn pop(&mut self) -> Option<Record> {
        let record = self.records.pop_front()?;
        self.queued_bytes -= record.len();
        Some(record)
    }

    /// Take everything queued.
    pub fn drain(&mut self) -> Vec<Record> {
        self.queued_bytes = 0;
        self.records.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}

impl Default for ResponseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for ResponseQueue {
    fn commit(&mut self, batch: Vec<Record>) -> Result<()> {
        let bytes: usize = batch.iter().map(Record::len).sum();
        if bytes > self.limit.saturating_sub(self.queued_bytes) {
            tracing::error!(
                bytes,
                queued = self.queued_bytes,
                limit = self.limit,
                "response queue full"
            );
            return Err(Error::OutOfMemory(format!(
                "{} bytes do not fit the response queue",
                bytes
            )));
        }
        self.records.try_reserve(batch.len())?;
        self.queued_bytes += bytes;
        self.records.extend(batch);
        Ok(())
    }
}

/// rtnetlink multicast groups the responder broadcasts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtnlGroup {
    Link,
    Neighbor,
    Ipv4Ifaddr,
    Ipv4Route,
    Ipv6Ifaddr,
    Ipv6Route,
    Ipv6Prefix,
}

impl RtnlGroup {
    pub const ALL: [RtnlGroup; 7] = [
        RtnlGroup::Link,
        RtnlGroup::Neighbor,
        RtnlGroup::Ipv4Ifaddr,
        RtnlGroup::Ipv4Route,
        RtnlGroup::Ipv6Ifaddr,
        RtnlGroup::Ipv6Route,
        RtnlGroup::Ipv6Prefix,
    ];

    /// RTNLGRP_* number.
    pub fn id(self) -> u32 {
        match self {
            RtnlGroup::Link => 1,
            RtnlGroup::Neighbor => 3,
            RtnlGroup::Ipv4Ifaddr => 5,
            RtnlGroup::Ipv4Route => 7,
            RtnlGroup::Ipv6Ifaddr => 9,
            RtnlGroup::Ipv6Route => 11,
            RtnlGroup::Ipv6Prefix => 18,
        }
    }

    /// Legacy bind mask (RTMGRP_*).
    pub fn mask(self) -> u32 {
        1 << (self.id() - 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            RtnlGroup::Link => "link",
            RtnlGroup::Neighbor => "neigh",
            RtnlGroup::Ipv4Ifaddr => "ipv4-ifaddr",
            RtnlGroup::Ipv4Route => "ipv4-route",
            RtnlGroup::Ipv6Ifaddr => "ipv6-ifaddr",
            RtnlGroup::Ipv6Route => "ipv6-route",
            RtnlGroup::Ipv6Prefix => "ipv6-prefix",
        }
    }
}

impl fmt::Display for RtnlGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RtnlGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RtnlGroup::ALL
            .into_iter()
            .find(|g| g.name() == s)
            .ok_or_else(|| Error::Config(format!("unknown group: {}", s)))
    }
}

/// Receiver of broadcast notifications. Delivery is best effort.
pub trait GroupSink {
    fn deliver(&self, group: RtnlGroup, batch: Vec<Record>);
}

/// Broadcast channels, one per group.
///
/// Slow subscribers lose the oldest records once `capacity` records are
/// pending for them.
#[derive(Debug, Clone)]
pub struct GroupHub {
    senders: HashMap<RtnlGroup, broadcast::Sender<Record>>,
}

impl GroupHub {
    pub fn new(capacity: usize) -> Self {
        let senders = RtnlGroup::ALL
            .into_iter()
            .map(|g| (g, broadcast::channel(capacity.max(1)).0))
            .collect();
        Self { senders }
    }

    /// Subscribe to a group.
    pub fn subscribe(&self, group: RtnlGroup) -> broadcast::Receiver<Record> {
        self.sender(group).subscribe()
    }

    /// Subscribe to a group as a stream. Lagged gaps are skipped.
    pub fn stream(&self, group: RtnlGroup) -> impl Stream<Item = Record> + use<> {
        BroadcastStream::new(self.subscribe(group)).filter_map(move |item| match item {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(%group, error = %e, "notification subscriber lagged");
                None
            }
        })
    }

    /// Current subscribers of a group.
    pub fn subscribers(&self, group: RtnlGroup) -> usize {
        self.sender(group).receiver_count()
    }

    fn sender(&self, group: RtnlGroup) -> &broadcast::Sender<Record> {
        // Every group gets a channel in `new`.
        &self.senders[&group]
    }
}

impl Default for GroupHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl GroupSink for GroupHub {
    fn deliver(&self, group: RtnlGroup, batch: Vec<Record>) {
        let sender = self.sender(group);
        for record in batch {
            if sender.send(record).is_err() {
                tracing::trace!(%group, "no subscribers");
                return;
            }
        }
    }
}
