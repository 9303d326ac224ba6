//! rtnl command - query and modify an in-memory network stack through the
//! NETLINK_ROUTE responder.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nlroute::netlink::{Family, MemoryStack, ResponderConfig};

use commands::{OutputFormat, Session};

#[derive(Parser)]
#[command(name = "rtnl", version, about = "In-stack route responder tool")]
struct Cli {
    /// Stack description (JSON).
    #[arg(short = 'f', long, value_name = "FILE")]
    stack: PathBuf,

    /// Responder configuration (JSON).
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use IPv4 only.
    #[arg(short = '4')]
    ipv4: bool,

    /// Use IPv6 only.
    #[arg(short = '6', conflicts_with = "ipv4")]
    ipv6: bool,

    /// Output JSON.
    #[arg(short = 'j', long)]
    json: bool,

    /// Pretty print JSON.
    #[arg(short = 'p', long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show network interfaces.
    #[command(visible_alias = "l")]
    Link(commands::link::LinkCmd),

    /// Manage IP addresses.
    #[command(visible_alias = "a", visible_alias = "addr")]
    Address(commands::address::AddressCmd),

    /// Show routing tables.
    #[command(visible_alias = "r")]
    Route(commands::route::RouteCmd),

    /// Show ARP/NDP cache.
    #[command(visible_alias = "n", visible_alias = "neigh")]
    Neighbor(commands::neighbor::NeighborCmd),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json { pretty: cli.pretty }
    } else {
        OutputFormat::Text
    };

    let family = match (cli.ipv4, cli.ipv6) {
        (true, _) => Some(Family::Inet),
        (_, true) => Some(Family::Inet6),
        _ => None,
    };

    let text = std::fs::read_to_string(&cli.stack)
        .with_context(|| format!("reading {}", cli.stack.display()))?;
    let stack = MemoryStack::from_json(&text)
        .with_context(|| format!("loading {}", cli.stack.display()))?;

    let config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ResponderConfig::from_json(&text)
                .with_context(|| format!("loading {}", path.display()))?
        }
        None => ResponderConfig::default(),
    };

    let session = Session::new(stack, config, cli.stack)?;

    let result = match cli.command {
        Command::Link(cmd) => cmd.run(&session, format),
        Command::Address(cmd) => cmd.run(&session, format, family),
        Command::Route(cmd) => cmd.run(&session, format, family),
        Command::Neighbor(cmd) => cmd.run(&session, format, family),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
