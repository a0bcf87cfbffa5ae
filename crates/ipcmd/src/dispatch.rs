//! Top-level dispatch and batch replay.
//!
//! A command line is resolved in two steps: [`parse_command`] turns the
//! tokens into a typed [`Command`] without touching the system, then
//! [`execute`] runs it against a [`Gateway`]. Batch files go through the
//! same path one line at a time.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};

use tracing::{debug, warn};

use crate::commands::address::{self, AddressCommand};
use crate::commands::link::{self, LinkCommand};
use crate::commands::monitor::{self, MonitorCommand};
use crate::commands::neigh::{self, NeighCommand};
use crate::commands::route::{self, RouteCommand};
use crate::commands::tunnel::{self, TunnelCommand};
use crate::commands::tuntap::{self, TuntapCommand};
use crate::commands::vrf::{self, VrfCommand};
use crate::commands::xfrm::{self, PolicyCommand, StateCommand, XfrmCommand};
use crate::commands::{expect_end, write_help};
use crate::cursor::{Cursor, find_prefix};
use crate::error::{Error, Result};
use crate::filter::LinkFilter;
use crate::gateway::Gateway;
use crate::help;
use crate::options::Options;

/// Top-level object keywords.
pub const OBJECTS: &[&str] = &[
    "address",
    "route",
    "link",
    "monitor",
    "neigh",
    "tunnel",
    "tuntap",
    "tap",
    "tcp_metrics",
    "tcpmetrics",
    "vrf",
    "xfrm",
    "help",
];

/// One fully parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Address(AddressCommand),
    Link(LinkCommand),
    Route(RouteCommand),
    Neigh(NeighCommand),
    Monitor(MonitorCommand),
    Tunnel(TunnelCommand),
    Tuntap(TuntapCommand),
    Vrf(VrfCommand),
    Xfrm(XfrmCommand),
    TcpMetricsHelp,
    Help,
}

impl Command {
    /// The usage text this command prints, if that is all it does.
    pub fn help_text(&self) -> Option<&'static str> {
        Some(match self {
            Self::Help => help::IP,
            Self::TcpMetricsHelp => help::TCP_METRICS,
            Self::Address(AddressCommand::Help) => help::ADDRESS,
            Self::Link(LinkCommand::Help) => help::LINK,
            Self::Route(RouteCommand::Help) => help::ROUTE,
            Self::Neigh(NeighCommand::Help) => help::NEIGH,
            Self::Monitor(MonitorCommand::Help) => help::MONITOR,
            Self::Tunnel(TunnelCommand::Help) => help::TUNNEL,
            Self::Tuntap(TuntapCommand::Help) => help::TUNTAP,
            Self::Vrf(VrfCommand::Help) => help::VRF,
            Self::Xfrm(XfrmCommand::Help) => help::XFRM,
            Self::Xfrm(XfrmCommand::MonitorHelp) => help::XFRM_MONITOR,
            Self::Xfrm(XfrmCommand::State(StateCommand::Help)) => help::XFRM_STATE,
            Self::Xfrm(XfrmCommand::Policy(PolicyCommand::Help)) => help::XFRM_POLICY,
            _ => return None,
        })
    }
}

/// Resolve the object keyword and hand the rest to its grammar.
///
/// An empty command line shows all links.
pub fn parse_command(c: &mut Cursor) -> Result<Command> {
    if !c.tokens_remain() {
        return Ok(Command::Link(LinkCommand::Show(LinkFilter::default())));
    }
    let tok = c.next_token(OBJECTS)?;
    let object = find_prefix(&tok, OBJECTS).ok_or_else(|| c.usage())?;
    debug!(object, "dispatching");
    Ok(match object {
        "address" => Command::Address(address::parse(c)?),
        "route" => Command::Route(route::parse(c)?),
        "link" => Command::Link(link::parse(c)?),
        "monitor" => Command::Monitor(monitor::parse(c)?),
        "neigh" => Command::Neigh(neigh::parse(c)?),
        "tunnel" => Command::Tunnel(tunnel::parse(c)?),
        "tuntap" | "tap" => Command::Tuntap(tuntap::parse(c)?),
        "tcp_metrics" | "tcpmetrics" => {
            if c.next_token(&["help"])? != "help" {
                return Err(c.usage());
            }
            expect_end(c)?;
            Command::TcpMetricsHelp
        }
        "vrf" => Command::Vrf(vrf::parse(c)?),
        "xfrm" => Command::Xfrm(xfrm::parse(c)?),
        _ => Command::Help,
    })
}

pub async fn execute<G: Gateway, W: Write>(
    cmd: Command,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        Command::Address(cmd) => address::execute(cmd, opts, gw, out).await,
        Command::Link(cmd) => link::execute(cmd, opts, gw, out).await,
        Command::Route(cmd) => route::execute(cmd, opts, gw, out).await,
        Command::Neigh(cmd) => neigh::execute(cmd, opts, gw, out).await,
        Command::Monitor(cmd) => monitor::execute(cmd, opts, gw, out).await,
        Command::Tunnel(cmd) => tunnel::execute(cmd, opts, gw, out).await,
        Command::Tuntap(cmd) => tuntap::execute(cmd, opts, gw, out).await,
        Command::Vrf(cmd) => vrf::execute(cmd, opts, gw, out).await,
        Command::Xfrm(cmd) => xfrm::execute(cmd, opts, gw, out).await,
        Command::TcpMetricsHelp => write_help(out, help::TCP_METRICS),
        Command::Help => write_help(out, help::IP),
    }
}

/// Parse and run one command line with a fresh cursor.
pub async fn run<G: Gateway, W: Write, S: AsRef<str>>(
    args: &[S],
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    let mut c = Cursor::new(args.iter().map(|s| AsRef::<str>::as_ref(s)));
    let cmd = parse_command(&mut c)?;
    execute(cmd, opts, gw, out).await
}

/// Replay commands line by line.
///
/// Without `-force` the first failing line aborts the batch. With it,
/// failures are logged and the batch carries on.
pub async fn run_batch<G: Gateway, W: Write, R: BufRead>(
    input: R,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        let args: Vec<&str> = line.split_whitespace().collect();
        if args.is_empty() {
            continue;
        }
        debug!(%line, "batch line");
        if let Err(err) = run(args.as_slice(), opts, gw, out).await {
            if !opts.force {
                return Err(Error::BatchLine {
                    line,
                    source: Box::new(err),
                });
            }
            warn!("Error (force mode on, continuing): Failed to run command '{line}': {err}");
        }
    }
    Ok(())
}

/// Run an invocation: the batch file when `-b` was given, else `args`.
pub async fn run_invocation<G: Gateway, W: Write, S: AsRef<str>>(
    args: &[S],
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match &opts.batch {
        Some(path) => {
            let file = File::open(path)?;
            run_batch(BufReader::new(file), opts, gw, out).await
        }
        None => run(args, opts, gw, out).await,
    }
}
