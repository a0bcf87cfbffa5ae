//! `ip address`: assign, remove, list and flush interface addresses.

use std::io::Write;

use tracing::{debug, warn};

use super::{GatewayContext, master_name, subcommand, write_help};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::filter::AddressFilter;
use crate::gateway::{Gateway, WriteMode};
use crate::help;
use crate::names;
use crate::options::Options;
use crate::output::{LinkAddresses, LinkView, print_all};
use crate::parse::{
    ip_from_str, parse_device_name, parse_lifetime, parse_prefix, prefix_from_str, set_once,
};
use crate::types::address::ifa;
use crate::types::{Address, Link};

const SUBCOMMANDS: &[&str] = &[
    "add", "change", "replace", "del", "delete", "show", "list", "flush", "help",
];

const ADD_OPTIONS: &[&str] = &[
    "label",
    "broadcast",
    "brd",
    "anycast",
    "scope",
    "valid_lft",
    "preferred_lft",
    "noprefixroute",
    "nodad",
    "home",
    "mngtmpaddr",
    "autojoin",
];

const SHOW_OPTIONS: &[&str] = &[
    "dev", "scope", "to", "label", "up", "permanent", "dynamic", "type", "IFNAME",
];

#[derive(Debug, Clone, PartialEq)]
pub enum AddressCommand {
    Add { mode: WriteMode, addr: Address },
    Delete(Address),
    Show(AddressFilter),
    Flush(AddressFilter),
    Help,
}

pub fn parse(c: &mut Cursor) -> Result<AddressCommand> {
    let Some(sub) = subcommand(c, SUBCOMMANDS)? else {
        return Ok(AddressCommand::Show(AddressFilter::default()));
    };
    Ok(match sub {
        "add" => AddressCommand::Add {
            mode: WriteMode::Create,
            addr: parse_spec(c)?,
        },
        "replace" => AddressCommand::Add {
            mode: WriteMode::Replace,
            addr: parse_spec(c)?,
        },
        "change" => AddressCommand::Add {
            mode: WriteMode::Change,
            addr: parse_spec(c)?,
        },
        "del" | "delete" => {
            let local = parse_prefix(c)?;
            let dev = parse_device_name(c)?;
            super::expect_end(c)?;
            AddressCommand::Delete(Address::new(local, dev))
        }
        "show" | "list" => AddressCommand::Show(parse_filter(c)?),
        "flush" => AddressCommand::Flush(parse_filter(c)?),
        _ => AddressCommand::Help,
    })
}

fn parse_scope(c: &mut Cursor) -> Result<u8> {
    let tok = c.next_token(&["host", "link", "global", "NUMBER"])?;
    names::scope_from_str(&tok).ok_or_else(|| Error::invalid(format!("invalid scope {tok}")))
}

/// `PREFIX [dev] IFNAME [options]` for add/replace/change.
fn parse_spec(c: &mut Cursor) -> Result<Address> {
    let local = parse_prefix(c)?;
    let dev = parse_device_name(c)?;
    let mut addr = Address::new(local, dev);
    let (mut scope, mut valid, mut preferred) = (None, None, None);
    while c.tokens_remain() {
        let tok = c.next_token(ADD_OPTIONS)?;
        match tok.as_str() {
            "label" => set_once(&mut addr.label, c.next_token(&["LABEL"])?, "label")?,
            "broadcast" | "brd" => {
                let brd = c.next_token(&["ADDR", "+"])?;
                let brd = if brd == "+" {
                    local
                        .broadcast()
                        .ok_or_else(|| Error::invalid("broadcast + needs an IPv4 prefix"))?
                } else {
                    ip_from_str(&brd)?
                };
                set_once(&mut addr.broadcast, brd, "broadcast")?;
            }
            "anycast" => set_once(&mut addr.anycast, ip_from_str(&c.next_token(&["ADDR"])?)?, "anycast")?,
            "scope" => set_once(&mut scope, parse_scope(c)?, "scope")?,
            "valid_lft" => set_once(&mut valid, parse_lifetime(c, "valid_lft")?, "valid_lft")?,
            "preferred_lft" => {
                set_once(&mut preferred, parse_lifetime(c, "preferred_lft")?, "preferred_lft")?
            }
            "noprefixroute" => addr.flags |= ifa::NOPREFIXROUTE,
            "nodad" => addr.flags |= ifa::NODAD,
            "home" => addr.flags |= ifa::HOMEADDRESS,
            "mngtmpaddr" => addr.flags |= ifa::MANAGETEMPADDR,
            "autojoin" => addr.flags |= ifa::MCAUTOJOIN,
            _ => return Err(c.usage()),
        }
    }
    addr.scope = scope.unwrap_or(addr.scope);
    addr.valid_lft = valid.unwrap_or(0);
    addr.preferred_lft = preferred.unwrap_or(0);
    Ok(addr)
}

fn parse_filter(c: &mut Cursor) -> Result<AddressFilter> {
    let mut f = AddressFilter::default();
    while c.tokens_remain() {
        let tok = c.next_token(SHOW_OPTIONS)?;
        match tok.as_str() {
            "dev" => f.dev = Some(c.next_token(&["device name"])?),
            "scope" => f.scope = Some(parse_scope(c)?),
            "to" => f.to = Some(prefix_from_str(&c.next_token(&["PREFIX"])?)?),
            "label" => f.label = Some(c.next_token(&["PATTERN"])?),
            "up" => f.up = true,
            "permanent" => f.permanent = Some(true),
            "dynamic" => f.permanent = Some(false),
            "type" => f.kinds.push(c.next_token(&["TYPE"])?),
            _ if f.dev.is_none() => f.dev = Some(tok),
            _ => return Err(c.usage()),
        }
    }
    Ok(f)
}

/// Links passing `filter`, each with its matching addresses.
fn select<'a>(
    links: &'a [Link],
    addrs: &'a [Address],
    filter: &AddressFilter,
) -> Result<Vec<LinkAddresses<'a>>> {
    if let Some(dev) = &filter.dev
        && !links.iter().any(|l| l.name == *dev)
    {
        return Err(Error::invalid(format!("Device \"{dev}\" does not exist.")));
    }
    Ok(links
        .iter()
        .filter(|l| filter.matches_link(l))
        .map(|l| LinkAddresses {
            link: LinkView::new(l).with_master(master_name(links, l)),
            addrs: addrs
                .iter()
                .filter(|a| a.dev == l.name && filter.matches(a))
                .collect(),
        })
        .filter(|la| !filter.selects_addresses() || !la.addrs.is_empty())
        .collect())
}

async fn matching<G: Gateway>(gw: &G, opts: &Options, filter: &AddressFilter) -> Result<Vec<Address>> {
    let links = gw.links().await.context("listing links")?;
    let addrs = gw
        .addresses(opts.family)
        .await
        .context("listing addresses")?;
    Ok(select(&links, &addrs, filter)?
        .into_iter()
        .flat_map(|la| la.addrs.into_iter().cloned())
        .collect())
}

async fn flush<G: Gateway>(gw: &G, opts: &Options, filter: &AddressFilter) -> Result<()> {
    if filter.is_empty() {
        return Err(Error::invalid("Flush requires arguments."));
    }
    let rounds = opts.loops.max(1);
    for round in 1..=rounds {
        let targets = matching(gw, opts, filter).await?;
        if targets.is_empty() {
            return Ok(());
        }
        debug!(round, count = targets.len(), "flushing addresses");
        for addr in &targets {
            gw.delete_address(addr)
                .await
                .context(format!("deleting address {} from {}", addr.local, addr.dev))?;
        }
    }
    if !matching(gw, opts, filter).await?.is_empty() {
        warn!("*** Flush remains incomplete after {rounds} rounds. ***");
    }
    Ok(())
}

pub async fn execute<G: Gateway, W: Write>(
    cmd: AddressCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        AddressCommand::Add { mode, addr } => gw
            .add_address(&addr, mode)
            .await
            .context(format!("adding address {} to {}", addr.local, addr.dev)),
        AddressCommand::Delete(addr) => gw
            .delete_address(&addr)
            .await
            .context(format!("deleting address {} from {}", addr.local, addr.dev)),
        AddressCommand::Show(filter) => {
            let links = gw.links().await.context("listing links")?;
            let addrs = gw
                .addresses(opts.family)
                .await
                .context("listing addresses")?;
            let views = select(&links, &addrs, &filter)?;
            print_all(out, &views, &opts.output)
        }
        AddressCommand::Flush(filter) => flush(gw, opts, &filter).await,
        AddressCommand::Help => write_help(out, help::ADDRESS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::{cursor, opts, text};
    use crate::gateway::MemoryGateway;
    use crate::types::link::iff;

    fn parse_str(args: &str) -> Result<AddressCommand> {
        let mut c = cursor(args);
        c.next_token(&[]).unwrap();
        parse(&mut c)
    }

    #[test]
    fn test_parse_add_lifetimes() {
        let cmd = parse_str("addr add 127.0.0.1/24 dev lo valid_lft 10 preferred_lft forever").unwrap();
        let AddressCommand::Add { mode, addr } = cmd else {
            panic!("expected add");
        };
        assert_eq!(mode, WriteMode::Create);
        assert_eq!(addr.local.to_string(), "127.0.0.1/24");
        assert_eq!(addr.dev, "lo");
        assert_eq!((addr.valid_lft, addr.preferred_lft), (10, 0));
    }

    #[test]
    fn test_parse_add_options() {
        let cmd = parse_str("a replace 10.0.0.1/24 eth0 brd + label eth0:1 scope link nodad").unwrap();
        let AddressCommand::Add { mode, addr } = cmd else {
            panic!("expected add");
        };
        assert_eq!(mode, WriteMode::Replace);
        assert_eq!(addr.broadcast.unwrap().to_string(), "10.0.0.255");
        assert_eq!(addr.label.as_deref(), Some("eth0:1"));
        assert_eq!(addr.scope, names::scope::LINK);
        assert_eq!(addr.flags, ifa::NODAD);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_str("addr add 127.0.0.1/24 dev lo valid_lft soon").is_err());
        assert!(parse_str("addr add 127.0.0.1/24").unwrap_err().is_usage());
        assert!(parse_str("addr add 127.0.0.1/24 lo bogus").unwrap_err().is_usage());
        assert!(parse_str("addr invalid").unwrap_err().is_usage());
        assert_eq!(parse_str("addr").unwrap(), AddressCommand::Show(AddressFilter::default()));
        assert_eq!(parse_str("addr help").unwrap(), AddressCommand::Help);
    }

    #[test]
    fn test_parse_duplicates() {
        let err = parse_str("addr add 10.0.0.1/24 dev lo valid_lft 10 valid_lft 20").unwrap_err();
        assert_eq!(err.to_string(), "duplicate valid_lft");
        let err = parse_str("addr add 10.0.0.1/24 dev lo label a label b").unwrap_err();
        assert_eq!(err.to_string(), "duplicate label");
        let err = parse_str("addr add 10.0.0.1/24 dev lo scope host scope link").unwrap_err();
        assert_eq!(err.to_string(), "duplicate scope");
        let err = parse_str("addr add 10.0.0.1/24 dev lo brd + broadcast 10.0.0.255").unwrap_err();
        assert_eq!(err.to_string(), "duplicate broadcast");
    }

    #[test]
    fn test_parse_show_filter() {
        let AddressCommand::Show(f) = parse_str("addr show eth0 scope host up permanent").unwrap() else {
            panic!("expected show");
        };
        assert_eq!(f.dev.as_deref(), Some("eth0"));
        assert_eq!(f.scope, Some(names::scope::HOST));
        assert!(f.up);
        assert_eq!(f.permanent, Some(true));
    }

    fn gateway() -> MemoryGateway {
        let mut a = Address::new("192.168.1.1/24".parse().unwrap(), "eth0");
        a.broadcast = Some("192.168.1.255".parse().unwrap());
        a.valid_lft = u32::MAX;
        a.preferred_lft = u32::MAX;
        let mut b = Address::new("10.0.0.1/8".parse().unwrap(), "eth1");
        b.scope = names::scope::LINK;
        MemoryGateway::new()
            .with_link(Link {
                name: "eth0".into(),
                flags: iff::UP,
                mtu: 1500,
                encap: "ether".into(),
                ..Default::default()
            })
            .with_link(Link {
                name: "eth1".into(),
                mtu: 1500,
                encap: "ether".into(),
                ..Default::default()
            })
            .with_address(a)
            .with_address(b)
    }

    #[tokio::test]
    async fn test_show_one_device() {
        let gw = gateway();
        let mut out = Vec::new();
        execute(parse_str("addr show dev eth0").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap();
        assert_eq!(
            text(out),
            "1: eth0: <UP> mtu 1500 state UNKNOWN group default\n    link/ether \n    \
             inet 192.168.1.1/24 brd 192.168.1.255 scope global\n       \
             valid_lft forever preferred_lft forever\n"
        );
    }

    #[tokio::test]
    async fn test_show_missing_device() {
        let gw = gateway();
        let err = execute(parse_str("addr show dev eth9").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Device \"eth9\" does not exist.");
    }

    #[tokio::test]
    async fn test_show_json_scope_filter() {
        let gw = gateway();
        let mut o = opts();
        o.output.json = true;
        let mut out = Vec::new();
        execute(parse_str("addr show scope link").unwrap(), &o, &gw, &mut out)
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v.as_array().unwrap().len(), 1);
        assert_eq!(v[0]["ifname"], "eth1");
        assert_eq!(v[0]["addr_info"][0]["local"], "10.0.0.1");
    }

    #[tokio::test]
    async fn test_add_and_delete() {
        let gw = gateway();
        let mut out = Vec::new();
        execute(parse_str("addr add 10.9.9.9/24 dev eth1").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap();
        assert_eq!(gw.snapshot_addresses().len(), 3);
        let err = execute(parse_str("addr add 10.9.9.9/24 dev eth1").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("adding address 10.9.9.9/24 to eth1: "));
        execute(parse_str("addr del 10.9.9.9/24 dev eth1").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap();
        assert_eq!(gw.snapshot_addresses().len(), 2);
    }

    #[tokio::test]
    async fn test_flush() {
        let gw = gateway();
        let err = execute(parse_str("addr flush").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Flush requires arguments.");
        execute(parse_str("addr flush dev eth0").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap();
        let left = gw.snapshot_addresses();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].dev, "eth1");
    }
}
