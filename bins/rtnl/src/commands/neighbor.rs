//! rtnl neighbor command implementation.
//!
//! Neighbor dumps arrive as one snapshot record per family: a single
//! attribute holding the packed ARP or NDP table.

use std::io::Write;
use std::net::IpAddr;

use clap::{Args, Subcommand};
use nlroute::netlink::types::neigh::{atf, nud};
use nlroute::netlink::{ArpEntry, Family, NeighborEntry, NlMsgType};
use serde::Serialize;

use super::{OutputFormat, Session, format_mac, print_items};

#[derive(Args)]
pub struct NeighborCmd {
    #[command(subcommand)]
    action: Option<NeighborAction>,
}

#[derive(Subcommand)]
enum NeighborAction {
    /// Show neighbor entries.
    Show {
        /// Interface name.
        dev: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct NeighborInfo {
    dst: IpAddr,
    dev: String,
    lladdr: String,
    state: &'static str,
}

impl NeighborCmd {
    pub fn run(
        self,
        session: &Session,
        format: OutputFormat,
        family: Option<Family>,
    ) -> anyhow::Result<()> {
        match self.action.unwrap_or(NeighborAction::Show { dev: None }) {
            NeighborAction::Show { dev } => Self::show(
                session,
                dev.as_deref(),
                family.unwrap_or(Family::Inet),
                format,
            ),
        }
    }

    fn show(
        session: &Session,
        dev: Option<&str>,
        family: Family,
        format: OutputFormat,
    ) -> anyhow::Result<()> {
        let filter = dev.map(|name| session.ifindex(name)).transpose()?;

        let records = match session.dump(NlMsgType::RTM_GETNEIGH, family) {
            Ok(records) => records,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut neighbors = Vec::new();
        for record in &records {
            for (_, payload) in record.attrs() {
                match family {
                    Family::Inet => {
                        for entry in ArpEntry::slice_from_bytes(payload) {
                            neighbors.push((
                                entry.ifindex.get(),
                                IpAddr::V4(entry.ip()),
                                format_mac(&entry.hwaddr),
                                arp_state(entry.flags.get()),
                            ));
                        }
                    }
                    _ => {
                        for entry in NeighborEntry::slice_from_bytes(payload) {
                            neighbors.push((
                                entry.ifindex.get(),
                                IpAddr::V6(entry.ip()),
                                format_mac(entry.lladdr()),
                                nud_state(entry.state),
                            ));
                        }
                    }
                }
            }
        }

        let neighbors: Vec<NeighborInfo> = neighbors
            .into_iter()
            .filter(|(ifindex, ..)| filter.is_none_or(|want| want == *ifindex))
            .map(|(ifindex, dst, lladdr, state)| NeighborInfo {
                dst,
                dev: session.ifname(ifindex),
                lladdr,
                state,
            })
            .collect();

        print_items(&neighbors, format, |out, n| {
            writeln!(out, "{} dev {} lladdr {} {}", n.dst, n.dev, n.lladdr, n.state)
        })
    }
}

fn arp_state(flags: u16) -> &'static str {
    if flags & atf::ATF_PERM != 0 {
        "PERMANENT"
    } else if flags & atf::ATF_COM != 0 {
        "REACHABLE"
    } else {
        "INCOMPLETE"
    }
}

fn nud_state(state: u8) -> &'static str {
    match state {
        nud::NUD_INCOMPLETE => "INCOMPLETE",
        nud::NUD_REACHABLE => "REACHABLE",
        nud::NUD_STALE => "STALE",
        nud::NUD_DELAY => "DELAY",
        nud::NUD_PROBE => "PROBE",
        _ => "NONE",
    }
}
