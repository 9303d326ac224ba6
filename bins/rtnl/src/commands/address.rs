//! rtnl address command implementation.

use std::io::Write;
use std::net::IpAddr;

use anyhow::{Context, anyhow, bail};
use clap::{Args, Subcommand};
use nlroute::netlink::message::{NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NLMSG_HDRLEN};
use nlroute::netlink::types::addr::{IfAddrMsg, ifa};
use nlroute::netlink::{Family, MessageBuilder, NlMsgHdr, NlMsgType, Record};
use serde::Serialize;
use zerocopy::FromBytes;

use super::{OutputFormat, Session, families, ip_from_bytes, print_items};

#[derive(Args)]
pub struct AddressCmd {
    #[command(subcommand)]
    action: Option<AddressAction>,
}

#[derive(Subcommand)]
enum AddressAction {
    /// Show addresses.
    Show {
        /// Interface name.
        dev: Option<String>,
    },

    /// Add an address.
    Add {
        /// Address with prefix length (e.g. 192.168.1.1/24).
        address: String,

        /// Device name.
        #[arg(long, short)]
        dev: String,

        /// Write the modified stack back to its file.
        #[arg(long)]
        save: bool,
    },

    /// Delete an address.
    Del {
        /// Address with prefix length.
        address: String,

        /// Device name.
        #[arg(long, short)]
        dev: String,

        /// Write the modified stack back to its file.
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug, Serialize)]
struct AddressInfo {
    ifindex: u32,
    ifname: String,
    family: &'static str,
    local: IpAddr,
    prefixlen: u8,
}

impl AddressCmd {
    pub fn run(
        self,
        session: &Session,
        format: OutputFormat,
        family: Option<Family>,
    ) -> anyhow::Result<()> {
        match self.action.unwrap_or(AddressAction::Show { dev: None }) {
            AddressAction::Show { dev } => Self::show(session, dev.as_deref(), family, format),
            AddressAction::Add { address, dev, save } => {
                Self::change(session, NlMsgType::RTM_NEWADDR, &address, &dev, save)
            }
            AddressAction::Del { address, dev, save } => {
                Self::change(session, NlMsgType::RTM_DELADDR, &address, &dev, save)
            }
        }
    }

    fn show(
        session: &Session,
        dev: Option<&str>,
        family: Option<Family>,
        format: OutputFormat,
    ) -> anyhow::Result<()> {
        let filter = dev.map(|name| session.ifindex(name)).transpose()?;

        let mut addresses = Vec::new();
        for family in families(family) {
            for record in session.dump(NlMsgType::RTM_GETADDR, family)? {
                let info = AddressInfo::from_record(session, &record)?;
                if filter.is_none_or(|want| want == info.ifindex) && !info.local.is_unspecified() {
                    addresses.push(info);
                }
            }
        }
        addresses.sort_by_key(|a| a.ifindex);

        print_items(&addresses, format, |out, a| {
            writeln!(
                out,
                "{}: {}    {} {}/{}",
                a.ifindex, a.ifname, a.family, a.local, a.prefixlen
            )
        })
    }

    fn change(
        session: &Session,
        msg_type: u16,
        address: &str,
        dev: &str,
        save: bool,
    ) -> anyhow::Result<()> {
        let (addr, prefix_len) = parse_prefix(address)?;
        let ifindex = session.ifindex(dev)?;

        let (family, octets) = match addr {
            IpAddr::V4(v4) => (Family::Inet, v4.octets().to_vec()),
            IpAddr::V6(v6) => (Family::Inet6, v6.octets().to_vec()),
        };
        let msg = IfAddrMsg {
            ifa_family: family.as_u8(),
            ifa_prefixlen: prefix_len,
            ifa_flags: 0,
            ifa_scope: 0,
            ifa_index: ifindex,
        };

        let flags = if msg_type == NlMsgType::RTM_NEWADDR {
            NLM_F_REQUEST | NLM_F_CREATE | NLM_F_EXCL
        } else {
            NLM_F_REQUEST
        };
        let mut builder = MessageBuilder::try_new(
            NlMsgHdr::new(msg_type, flags),
            NLMSG_HDRLEN + IfAddrMsg::SIZE + 4 + octets.len(),
        )?;
        builder.append(&msg)?;
        builder.append_attr(ifa::IFA_LOCAL, &octets)?;

        session
            .request(builder)
            .with_context(|| format!("{} {} dev {}", NlMsgType::name(msg_type), address, dev))?;

        if save {
            session.save()?;
        }
        Ok(())
    }
}

impl AddressInfo {
    fn from_record(session: &Session, record: &Record) -> anyhow::Result<Self> {
        let (msg, _) = IfAddrMsg::read_from_prefix(record.body())
            .map_err(|_| anyhow!("truncated address record"))?;

        let local = record
            .attrs()
            .find(|(kind, _)| *kind == ifa::IFA_LOCAL)
            .and_then(|(_, payload)| ip_from_bytes(payload))
            .context("address record without IFA_LOCAL")?;

        Ok(Self {
            ifindex: msg.ifa_index,
            ifname: session.ifname(msg.ifa_index),
            family: if local.is_ipv4() { "inet" } else { "inet6" },
            local,
            prefixlen: msg.ifa_prefixlen,
        })
    }
}

/// Parse `ADDR/LEN`; a bare address gets the full host prefix.
fn parse_prefix(s: &str) -> anyhow::Result<(IpAddr, u8)> {
    let (addr, len) = match s.split_once('/') {
        Some((addr, len)) => (addr, Some(len)),
        None => (s, None),
    };
    let addr: IpAddr = addr
        .parse()
        .with_context(|| format!("invalid address \"{}\"", addr))?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    let len = match len {
        Some(len) => len
            .parse::<u8>()
            .with_context(|| format!("invalid prefix length \"{}\"", len))?,
        None => max,
    };
    if len > max {
        bail!("prefix length {} exceeds {}", len, max);
    }
    Ok((addr, len))
}
