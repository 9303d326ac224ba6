//! rtnl link command implementation.

use std::io::Write;

use anyhow::{anyhow, bail};
use clap::{Args, Subcommand};
use nlroute::netlink::attr::get;
use nlroute::netlink::types::link::{IfInfoMsg, arphrd, iff, ifla};
use nlroute::netlink::{Family, NlMsgType, Record};
use serde::Serialize;
use zerocopy::FromBytes;

use super::{OutputFormat, Session, format_mac, print_items};

#[derive(Args)]
pub struct LinkCmd {
    #[command(subcommand)]
    action: Option<LinkAction>,
}

#[derive(Subcommand)]
enum LinkAction {
    /// Show interfaces.
    Show {
        /// Interface name.
        dev: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct LinkInfo {
    ifindex: u32,
    ifname: String,
    flags: Vec<&'static str>,
    mtu: u32,
    operstate: &'static str,
    link_type: &'static str,
    address: String,
}

impl LinkCmd {
    pub fn run(self, session: &Session, format: OutputFormat) -> anyhow::Result<()> {
        match self.action.unwrap_or(LinkAction::Show { dev: None }) {
            LinkAction::Show { dev } => Self::show(session, dev.as_deref(), format),
        }
    }

    fn show(session: &Session, dev: Option<&str>, format: OutputFormat) -> anyhow::Result<()> {
        let records = session.dump(NlMsgType::RTM_GETLINK, Family::Unspec)?;
        let mut links = records
            .iter()
            .map(LinkInfo::from_record)
            .collect::<anyhow::Result<Vec<_>>>()?;

        if let Some(dev) = dev {
            links.retain(|link| link.ifname == dev);
            if links.is_empty() {
                bail!("device \"{}\" does not exist", dev);
            }
        }

        print_items(&links, format, |out, link| {
            writeln!(
                out,
                "{}: {}: <{}> mtu {} state {}",
                link.ifindex,
                link.ifname,
                link.flags.join(","),
                link.mtu,
                link.operstate
            )?;
            writeln!(out, "    link/{} {}", link.link_type, link.address)
        })
    }
}

impl LinkInfo {
    fn from_record(record: &Record) -> anyhow::Result<Self> {
        let (msg, _) = IfInfoMsg::read_from_prefix(record.body())
            .map_err(|_| anyhow!("truncated link record"))?;

        let mut info = LinkInfo {
            ifindex: msg.ifi_index as u32,
            ifname: String::new(),
            flags: flag_names(msg.ifi_flags),
            mtu: 0,
            operstate: if record.msg_type() == NlMsgType::RTM_NEWLINK {
                "UP"
            } else {
                "DOWN"
            },
            link_type: link_type_name(msg.ifi_type),
            address: String::new(),
        };

        for (kind, payload) in record.attrs() {
            match kind {
                ifla::IFLA_IFNAME => info.ifname = get::string(payload)?.to_string(),
                ifla::IFLA_MTU => info.mtu = get::u32_ne(payload)?,
                ifla::IFLA_ADDRESS => info.address = format_mac(payload),
                _ => {}
            }
        }
        Ok(info)
    }
}

fn flag_names(flags: u32) -> Vec<&'static str> {
    const NAMES: [(u32, &str); 7] = [
        (iff::LOOPBACK, "LOOPBACK"),
        (iff::BROADCAST, "BROADCAST"),
        (iff::POINTOPOINT, "POINTOPOINT"),
        (iff::MULTICAST, "MULTICAST"),
        (iff::NOARP, "NOARP"),
        (iff::UP, "UP"),
        (iff::RUNNING, "LOWER_UP"),
    ];
    NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect()
}

fn link_type_name(ifi_type: u16) -> &'static str {
    match ifi_type {
        arphrd::ARPHRD_ETHER => "ether",
        arphrd::ARPHRD_LOOPBACK => "loopback",
        arphrd::ARPHRD_IEEE80211 => "ieee802.11",
        arphrd::ARPHRD_SLIP => "slip",
        arphrd::ARPHRD_CAN => "can",
        arphrd::ARPHRD_IEEE802154 => "ieee802.15.4",
        arphrd::ARPHRD_PHONET_PIPE => "phonet_pipe",
        arphrd::ARPHRD_NONE => "none",
        _ => "void",
    }
}
