//! rtnl command implementations.
//!
//! Every command talks to the responder the way a socket client would:
//! it frames a raw request, hands it over and decodes the queued records.

pub mod address;
pub mod link;
pub mod neighbor;
pub mod route;

use std::cell::Cell;
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use anyhow::Context;
use nlroute::netlink::message::{NLM_F_DUMP, NLM_F_REQUEST, NLMSG_HDRLEN};
use nlroute::netlink::{
    DeviceTable, Family, GroupHub, MemoryStack, MessageBuilder, NlMsgHdr, Record, Responder,
    ResponderConfig, ResponseQueue,
};
use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json { pretty: bool },
}

/// A responder over the loaded stack.
pub struct Session {
    responder: Responder<MemoryStack>,
    path: PathBuf,
    seq: Cell<u32>,
}

impl Session {
    pub fn new(stack: MemoryStack, config: ResponderConfig, path: PathBuf) -> anyhow::Result<Self> {
        let responder = Responder::new(
            Arc::new(RwLock::new(stack)),
            config,
            Arc::new(GroupHub::default()),
        )
        .context("starting responder")?;
        Ok(Self {
            responder,
            path,
            seq: Cell::new(1),
        })
    }

    /// Send one framed request and collect the records it queued.
    pub fn request(&self, mut builder: MessageBuilder) -> nlroute::Result<Vec<Record>> {
        let seq = self.seq.get();
        self.seq.set(seq.wrapping_add(1));
        builder.set_seq(seq);
        let data = builder.finish();

        let mut queue = ResponseQueue::new();
        let consumed = self.responder.handle(&data, &mut queue)?;
        tracing::debug!(seq, consumed, records = queue.len(), "request handled");
        Ok(queue.drain())
    }

    /// Dump request for `family`, returned without its terminator.
    pub fn dump(&self, msg_type: u16, family: Family) -> nlroute::Result<Vec<Record>> {
        let mut builder = MessageBuilder::try_new(
            NlMsgHdr::new(msg_type, NLM_F_REQUEST | NLM_F_DUMP),
            NLMSG_HDRLEN + 4,
        )?;
        builder.append_bytes(&[family.as_u8()])?;
        let mut records = self.request(builder)?;
        records.retain(|r| !r.is_done());
        Ok(records)
    }

    fn state(&self) -> nlroute::Result<RwLockReadGuard<'_, MemoryStack>> {
        self.responder
            .state()
            .read()
            .map_err(|_| nlroute::Error::StatePoisoned)
    }

    /// Resolve an interface name.
    pub fn ifindex(&self, name: &str) -> anyhow::Result<u32> {
        let state = self.state()?;
        state
            .devices()
            .find(|dev| dev.name == name)
            .map(|dev| dev.index)
            .with_context(|| format!("device \"{}\" does not exist", name))
    }

    /// Interface name for display.
    pub fn ifname(&self, index: u32) -> String {
        self.state()
            .ok()
            .and_then(|state| state.find_by_index(index).map(|dev| dev.name.clone()))
            .unwrap_or_else(|| format!("if{}", index))
    }

    /// Write the stack back to the file it was loaded from.
    pub fn save(&self) -> anyhow::Result<()> {
        let mut json = serde_json::to_string_pretty(&*self.state()?)?;
        json.push('\n');
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), "stack saved");
        Ok(())
    }
}

/// Print items as JSON, or as text with `text` per item.
pub fn print_items<T: Serialize>(
    items: &[T],
    format: OutputFormat,
    text: impl Fn(&mut dyn Write, &T) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Json { pretty: true } => {
            serde_json::to_writer_pretty(&mut out, items)?;
            writeln!(out)?;
        }
        OutputFormat::Json { pretty: false } => {
            serde_json::to_writer(&mut out, items)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            for item in items {
                text(&mut out, item)?;
            }
        }
    }
    Ok(())
}

/// Colon-separated hex, as ip prints link-layer addresses.
pub fn format_mac(addr: &[u8]) -> String {
    addr.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Network address from a 4- or 16-byte attribute payload.
pub fn ip_from_bytes(data: &[u8]) -> Option<IpAddr> {
    match data.len() {
        4 => <[u8; 4]>::try_from(data).ok().map(|b| Ipv4Addr::from(b).into()),
        16 => <[u8; 16]>::try_from(data).ok().map(|b| Ipv6Addr::from(b).into()),
        _ => None,
    }
}

/// Families a show command covers when none was asked for.
pub fn families(family: Option<Family>) -> Vec<Family> {
    match family {
        Some(family) => vec![family],
        None => vec![Family::Inet, Family::Inet6],
    }
}
