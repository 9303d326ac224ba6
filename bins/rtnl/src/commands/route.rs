//! rtnl route command implementation.

use std::io::Write;
use std::net::IpAddr;

use anyhow::anyhow;
use clap::{Args, Subcommand};
use nlroute::netlink::types::route::{RtMsg, rta};
use nlroute::netlink::{Family, NlMsgType, Record};
use serde::Serialize;
use zerocopy::FromBytes;

use super::{OutputFormat, Session, ip_from_bytes, print_items};

#[derive(Args)]
pub struct RouteCmd {
    #[command(subcommand)]
    action: Option<RouteAction>,
}

#[derive(Subcommand)]
enum RouteAction {
    /// Show routing table entries.
    Show,
}

#[derive(Debug, Serialize)]
struct RouteInfo {
    dst: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway: Option<IpAddr>,
    protocol: &'static str,
}

impl RouteCmd {
    pub fn run(
        self,
        session: &Session,
        format: OutputFormat,
        family: Option<Family>,
    ) -> anyhow::Result<()> {
        match self.action.unwrap_or(RouteAction::Show) {
            RouteAction::Show => Self::show(session, family.unwrap_or(Family::Inet), format),
        }
    }

    fn show(session: &Session, family: Family, format: OutputFormat) -> anyhow::Result<()> {
        let records = session.dump(NlMsgType::RTM_GETROUTE, family)?;
        let routes = records
            .iter()
            .map(RouteInfo::from_record)
            .collect::<anyhow::Result<Vec<_>>>()?;

        print_items(&routes, format, |out, route| {
            write!(out, "{}", route.dst)?;
            if let Some(gw) = route.gateway {
                write!(out, " via {}", gw)?;
            }
            writeln!(out, " proto {}", route.protocol)
        })
    }
}

impl RouteInfo {
    fn from_record(record: &Record) -> anyhow::Result<Self> {
        let (msg, _) =
            RtMsg::read_from_prefix(record.body()).map_err(|_| anyhow!("truncated route record"))?;

        let mut dst = None;
        let mut gateway = None;
        for (kind, payload) in record.attrs() {
            match kind {
                rta::RTA_DST => dst = ip_from_bytes(payload),
                rta::RTA_GATEWAY => gateway = ip_from_bytes(payload).filter(|gw| !gw.is_unspecified()),
                _ => {}
            }
        }

        let dst = match dst {
            Some(_) if msg.rtm_dst_len == 0 => "default".to_string(),
            Some(addr) => format!("{}/{}", addr, msg.rtm_dst_len),
            None => "default".to_string(),
        };

        Ok(Self {
            dst,
            gateway,
            protocol: "static",
        })
    }
}
