//! `ip neigh`: the ARP/NDP cache.

use std::io::Write;

use tracing::debug;

use super::{GatewayContext, expect_end, subcommand, write_help};
use crate::cursor::Cursor;
use crate::error::{Error, GatewayError, Result};
use crate::filter::NeighFilter;
use crate::gateway::{Gateway, WriteMode};
use crate::help;
use crate::names;
use crate::options::Options;
use crate::output::{print_all, print_one};
use crate::parse::{ip_from_str, parse_address, parse_device_name, parse_hardware_address, set_once};
use crate::types::neigh::{nud, ntf};
use crate::types::Neighbor;

const SUBCOMMANDS: &[&str] = &[
    "add", "del", "delete", "change", "replace", "show", "list", "flush", "get", "help",
];

const WRITE_OPTIONS: &[&str] = &["lladdr", "dev", "nud", "router", "extern_learn", "proxy"];

const NUD_WORDS: &[&str] = &[
    "delay",
    "failed",
    "incomplete",
    "noarp",
    "none",
    "permanent",
    "probe",
    "reachable",
    "stale",
    "all",
    "NUMBER",
];

#[derive(Debug, Clone, PartialEq)]
pub enum NeighCommand {
    Add { mode: WriteMode, neigh: Neighbor },
    Delete(Neighbor),
    Show(NeighFilter),
    Flush(NeighFilter),
    Get(Neighbor),
    Help,
}

pub fn parse(c: &mut Cursor) -> Result<NeighCommand> {
    let Some(sub) = subcommand(c, SUBCOMMANDS)? else {
        return Ok(NeighCommand::Show(NeighFilter::default()));
    };
    Ok(match sub {
        "add" => NeighCommand::Add {
            mode: WriteMode::Create,
            neigh: parse_entry(c)?,
        },
        "change" => NeighCommand::Add {
            mode: WriteMode::Change,
            neigh: parse_entry(c)?,
        },
        "replace" => NeighCommand::Add {
            mode: WriteMode::Replace,
            neigh: parse_entry(c)?,
        },
        "del" | "delete" => NeighCommand::Delete(parse_entry(c)?),
        "show" | "list" => NeighCommand::Show(parse_filter(c)?),
        "flush" => NeighCommand::Flush(parse_filter(c)?),
        "get" => {
            let dst = parse_address(c)?;
            let dev = parse_device_name(c)?;
            expect_end(c)?;
            NeighCommand::Get(Neighbor::new(dst, dev))
        }
        _ => NeighCommand::Help,
    })
}

/// A NUD state by name or number; `all` is `None`.
fn parse_nud(c: &mut Cursor) -> Result<Option<u16>> {
    let tok = c.next_token(NUD_WORDS)?;
    if tok == "all" {
        return Ok(None);
    }
    names::nud_from_str(&tok)
        .map(Some)
        .ok_or_else(|| Error::invalid(format!("invalid nud state: {tok}")))
}

/// `[address] IP | proxy IP`, then the entry options. `dev` is required.
fn parse_entry(c: &mut Cursor) -> Result<Neighbor> {
    let mut flags = 0;
    let first = c.next_token(&["proxy", "address", "IP"])?;
    if first == "proxy" {
        flags |= ntf::PROXY;
    } else {
        c.last_token(&[]);
    }
    let dst = parse_address(c)?;
    let mut neigh = Neighbor::new(dst, String::new());
    neigh.flags = flags;
    let (mut dev, mut state) = (None, None);
    while c.tokens_remain() {
        match c.next_token(WRITE_OPTIONS)?.as_str() {
            "lladdr" => set_once(&mut neigh.lladdr, parse_hardware_address(c)?, "lladdr")?,
            "dev" => set_once(&mut dev, c.next_token(&["device name"])?, "dev")?,
            "nud" => set_once(&mut state, parse_nud(c)?.unwrap_or(nud::NONE), "nud")?,
            "router" => neigh.flags |= ntf::ROUTER,
            "extern_learn" => neigh.flags |= ntf::EXT_LEARNED,
            "proxy" => neigh.flags |= ntf::PROXY,
            _ => return Err(c.usage()),
        }
    }
    neigh.state = state.unwrap_or(nud::PERMANENT);
    neigh.dev = dev.ok_or_else(|| Error::invalid("neighbour entry needs a device"))?;
    Ok(neigh)
}

fn parse_filter(c: &mut Cursor) -> Result<NeighFilter> {
    let mut f = NeighFilter::default();
    while c.tokens_remain() {
        let tok = c.next_token(&["to", "dev", "nud", "proxy", "IP"])?;
        let target = match tok.as_str() {
            "dev" => {
                f.dev = Some(c.next_token(&["device name"])?);
                continue;
            }
            "nud" => {
                f.state = parse_nud(c)?;
                continue;
            }
            "proxy" => {
                f.proxy = true;
                continue;
            }
            "to" => c.next_token(&["IP", "PREFIX"])?,
            _ => tok,
        };
        if target.contains('/') {
            f.subnet = Some(target.parse().map_err(Error::Invalid)?);
        } else {
            f.addr = Some(ip_from_str(&target)?);
        }
    }
    Ok(f)
}

pub async fn execute<G: Gateway, W: Write>(
    cmd: NeighCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        NeighCommand::Add { mode, neigh } => gw
            .add_neighbor(&neigh, mode)
            .await
            .context(format!("adding neighbour {} on {}", neigh.dst, neigh.dev)),
        NeighCommand::Delete(neigh) => gw
            .delete_neighbor(&neigh)
            .await
            .context(format!("deleting neighbour {} on {}", neigh.dst, neigh.dev)),
        NeighCommand::Show(filter) => {
            let neighs = gw
                .neighbors(opts.family)
                .await
                .context("listing neighbours")?;
            print_all(out, &filter.apply(neighs), &opts.output)
        }
        NeighCommand::Flush(filter) => {
            if filter == NeighFilter::default() {
                return Err(Error::invalid("Flush requires arguments."));
            }
            let neighs = gw
                .neighbors(opts.family)
                .await
                .context("listing neighbours")?;
            let targets: Vec<Neighbor> = neighs
                .into_iter()
                .filter(|n| n.state != nud::PERMANENT && n.state != nud::NOARP && filter.matches(n))
                .collect();
            debug!(count = targets.len(), "flushing neighbours");
            for n in &targets {
                gw.delete_neighbor(n)
                    .await
                    .context(format!("deleting neighbour {} on {}", n.dst, n.dev))?;
            }
            Ok(())
        }
        NeighCommand::Get(want) => {
            let neighs = gw
                .neighbors(opts.family)
                .await
                .context("listing neighbours")?;
            let found = neighs
                .into_iter()
                .find(|n| n.dst == want.dst && n.dev == want.dev)
                .ok_or_else(|| {
                    Error::gateway(
                        format!("getting neighbour {} on {}", want.dst, want.dev),
                        GatewayError::NotFound {
                            kind: "neighbour",
                            name: want.dst.to_string(),
                        },
                    )
                })?;
            print_one(out, &found, &opts.output)
        }
        NeighCommand::Help => write_help(out, help::NEIGH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::{cursor, opts, text};
    use crate::gateway::MemoryGateway;
    use crate::types::{HardwareAddr, Link};

    fn parse_str(args: &str) -> Result<NeighCommand> {
        let mut c = cursor(args);
        c.next_token(&[]).unwrap();
        parse(&mut c)
    }

    #[test]
    fn test_parse_add() {
        let NeighCommand::Add { mode, neigh } =
            parse_str("neigh replace 192.168.1.5 lladdr 00:11:22:33:44:55 dev eth0 nud ReAcHaBlE router").unwrap()
        else {
            panic!("expected add");
        };
        assert_eq!(mode, WriteMode::Replace);
        assert_eq!(neigh.dst.to_string(), "192.168.1.5");
        assert_eq!(neigh.dev, "eth0");
        assert_eq!(neigh.state, nud::REACHABLE);
        assert!(neigh.is_router());
        assert_eq!(neigh.lladdr, Some(HardwareAddr(vec![0, 0x11, 0x22, 0x33, 0x44, 0x55])));
    }

    #[test]
    fn test_parse_proxy_and_defaults() {
        let NeighCommand::Add { neigh, .. } = parse_str("neigh add proxy 10.0.0.9 dev eth1").unwrap() else {
            panic!("expected add");
        };
        assert!(neigh.is_proxy());
        assert_eq!(neigh.state, nud::PERMANENT);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_str("neigh add 10.0.0.1 nud bogus dev eth0").is_err());
        assert!(parse_str("neigh add 10.0.0.1 nud 3 dev eth0").is_err());
        assert!(parse_str("neigh add 10.0.0.1 lladdr 00:11").is_err());
        assert!(parse_str("neigh add 10.0.0.1 weird").unwrap_err().is_usage());
        let err = parse_str("neigh add 10.0.0.1").unwrap_err();
        assert_eq!(err.to_string(), "neighbour entry needs a device");
    }

    #[test]
    fn test_parse_duplicates() {
        let err = parse_str("neigh add 10.0.0.1 dev eth0 dev eth1").unwrap_err();
        assert_eq!(err.to_string(), "duplicate dev");
        let err = parse_str("neigh add 10.0.0.1 lladdr 00:11:22:33:44:55 lladdr 00:11:22:33:44:66 dev eth0")
            .unwrap_err();
        assert_eq!(err.to_string(), "duplicate lladdr");
        let err = parse_str("neigh add 10.0.0.1 nud stale nud reachable dev eth0").unwrap_err();
        assert_eq!(err.to_string(), "duplicate nud");
    }

    #[test]
    fn test_parse_filter() {
        let NeighCommand::Show(f) = parse_str("neigh show to 10.0.0.0/8 dev eth0 nud all proxy").unwrap() else {
            panic!("expected show");
        };
        assert_eq!(f.subnet, Some("10.0.0.0/8".parse().unwrap()));
        assert_eq!(f.dev.as_deref(), Some("eth0"));
        assert_eq!(f.state, None);
        assert!(f.proxy);
        let NeighCommand::Show(f) = parse_str("neigh show 10.0.0.1 nud stale").unwrap() else {
            panic!("expected show");
        };
        assert_eq!(f.addr, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(f.state, Some(nud::STALE));

        let err = parse_str("neigh show nud abc").unwrap_err();
        assert_eq!(err.to_string(), "invalid nud state: abc");
        let err = parse_str("neigh show nud 3").unwrap_err();
        assert_eq!(err.to_string(), "invalid nud state: 3");
        let NeighCommand::Show(f) = parse_str("neigh show nud 4").unwrap() else {
            panic!("expected show");
        };
        assert_eq!(f.state, Some(nud::STALE));
    }

    fn entry(ip: &str, dev: &str, index: u32, state: u16) -> Neighbor {
        let mut n = Neighbor::new(ip.parse().unwrap(), dev);
        n.index = index;
        n.state = state;
        n.lladdr = Some(HardwareAddr(vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee, index as u8]));
        n
    }

    fn gateway() -> MemoryGateway {
        MemoryGateway::new()
            .with_link(Link::named("eth0"))
            .with_link(Link::named("eth1"))
            .with_neighbor(entry("192.168.1.2", "eth1", 2, nud::STALE))
            .with_neighbor(entry("192.168.1.1", "eth0", 1, nud::REACHABLE))
            .with_neighbor(entry("192.168.1.9", "eth0", 1, nud::NOARP))
            .with_neighbor(entry("192.168.1.3", "eth0", 1, nud::PERMANENT))
    }

    #[tokio::test]
    async fn test_show_sorted_without_noarp() {
        let gw = gateway();
        let mut out = Vec::new();
        execute(parse_str("neigh").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap();
        assert_eq!(
            text(out),
            "192.168.1.1 dev eth0 lladdr aa:bb:cc:dd:ee:01 REACHABLE\n\
             192.168.1.3 dev eth0 lladdr aa:bb:cc:dd:ee:01 PERMANENT\n\
             192.168.1.2 dev eth1 lladdr aa:bb:cc:dd:ee:02 STALE\n"
        );
    }

    #[tokio::test]
    async fn test_get_and_flush() {
        let gw = gateway();
        let mut out = Vec::new();
        execute(parse_str("neigh get 192.168.1.2 dev eth1").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap();
        assert_eq!(text(out), "192.168.1.2 dev eth1 lladdr aa:bb:cc:dd:ee:02 STALE\n");
        let err = execute(parse_str("neigh get 192.168.1.99 dev eth1").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));

        let err = execute(parse_str("neigh flush").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Flush requires arguments.");
        execute(parse_str("neigh flush dev eth0").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap();
        assert_eq!(gw.snapshot_neighbors().len(), 3);
    }

    #[tokio::test]
    async fn test_add_needs_link() {
        let gw = gateway();
        execute(parse_str("neigh add 10.0.0.1 lladdr 00:11:22:33:44:55 dev eth0").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap();
        let err = execute(parse_str("neigh add 10.0.0.1 dev eth7").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("adding neighbour 10.0.0.1 on eth7: "));
    }
}
