//! `ip link`: create, modify, delete and list network interfaces.

use std::io::Write;

use tracing::debug;

use super::{GatewayContext, expect_end, master_name, parse_on_off, subcommand, write_help};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::filter::LinkFilter;
use crate::gateway::{Gateway, LinkChange, NetnsTarget, VfChange, VfLinkState};
use crate::help;
use crate::options::Options;
use crate::output::{LinkView, print_all};
use crate::parse::{
    ip_from_str, parse_address, parse_device_name, parse_hardware_address, parse_name, parse_u8,
    parse_u16, parse_u32, set_once, u16_from_str, u32_from_str,
};
use crate::types::link::{
    BareudpInfo, BondMode, GeneveInfo, IpoibInfo, IpoibMode, IpvlanInfo, IpvlanMode, MacvlanInfo,
    MacvlanMode, TunnelInfo, VethInfo, VlanInfo, VlanProtocol, VxlanInfo, XfrmiInfo,
};
use crate::types::{Link, LinkKind};

const SUBCOMMANDS: &[&str] = &["add", "set", "delete", "del", "show", "list", "help"];

const ADD_OPTIONS: &[&str] = &[
    "txqueuelen",
    "txqlen",
    "address",
    "mtu",
    "index",
    "numtxqueues",
    "numrxqueues",
    "type",
];

const SET_OPTIONS: &[&str] = &[
    "up",
    "down",
    "arp",
    "multicast",
    "allmulticast",
    "promisc",
    "txqueuelen",
    "txqlen",
    "name",
    "address",
    "mtu",
    "group",
    "netns",
    "alias",
    "master",
    "nomaster",
    "vf",
];

const VF_OPTIONS: &[&str] = &[
    "mac",
    "vlan",
    "rate",
    "max_tx_rate",
    "min_tx_rate",
    "spoofchk",
    "state",
    "trust",
    "node_guid",
    "port_guid",
];

/// Kinds `link add ... type` accepts.
pub const KINDS: &[&str] = &[
    "bareudp", "bond", "bridge", "dummy", "geneve", "gre", "gretap", "ifb", "ip6gre", "ip6tnl",
    "ipip", "ipoib", "ipvlan", "ipvtap", "macvlan", "sit", "veth", "vlan", "vrf", "vti", "vti6",
    "vxlan", "xfrm",
];

#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    Add(Link),
    Delete(String),
    Set { name: String, changes: Vec<LinkChange> },
    Show(LinkFilter),
    Help,
}

pub fn parse(c: &mut Cursor) -> Result<LinkCommand> {
    let Some(sub) = subcommand(c, SUBCOMMANDS)? else {
        return Ok(LinkCommand::Show(LinkFilter::default()));
    };
    Ok(match sub {
        "add" => LinkCommand::Add(parse_add(c)?),
        "set" => {
            let name = parse_device_name(c)?;
            let changes = parse_changes(c)?;
            LinkCommand::Set { name, changes }
        }
        "delete" | "del" => {
            let name = parse_device_name(c)?;
            expect_end(c)?;
            LinkCommand::Delete(name)
        }
        "show" | "list" => LinkCommand::Show(parse_filter(c)?),
        _ => LinkCommand::Help,
    })
}

fn parse_add(c: &mut Cursor) -> Result<Link> {
    let mut link = Link::named(parse_name(c)?);
    let (mut txqlen, mut mtu, mut index) = (None, None, None);
    loop {
        let tok = c.next_token(ADD_OPTIONS)?;
        match tok.as_str() {
            "txqueuelen" | "txqlen" => set_once(&mut txqlen, parse_u32(c, "txqueuelen")?, "txqueuelen")?,
            "address" => set_once(&mut link.address, parse_hardware_address(c)?, "address")?,
            "mtu" => set_once(&mut mtu, parse_u32(c, "mtu")?, "mtu")?,
            "index" => set_once(&mut index, parse_u32(c, "index")?, "index")?,
            "numtxqueues" => {
                set_once(&mut link.num_tx_queues, parse_u32(c, "numtxqueues")?, "numtxqueues")?
            }
            "numrxqueues" => {
                set_once(&mut link.num_rx_queues, parse_u32(c, "numrxqueues")?, "numrxqueues")?
            }
            "type" => break,
            _ => return Err(c.usage()),
        }
    }
    link.txqlen = txqlen.unwrap_or(link.txqlen);
    link.mtu = mtu.unwrap_or(link.mtu);
    link.index = index.unwrap_or(link.index);
    let kind = c.next_token(KINDS)?;
    link.kind = parse_kind(c, &kind)?;
    Ok(link)
}

/// The kind-specific arguments after `type KIND`.
fn parse_kind(c: &mut Cursor, kind: &str) -> Result<LinkKind> {
    let kind = match kind {
        "dummy" => LinkKind::Dummy,
        "ifb" => LinkKind::Ifb,
        "bridge" => LinkKind::Bridge,
        "bond" => {
            let mut mode = BondMode::default();
            while c.tokens_remain() {
                match c.next_token(&["mode"])?.as_str() {
                    "mode" => {
                        let m = c.next_token(BondMode::NAMES)?;
                        mode = BondMode::from_name(&m)
                            .ok_or_else(|| Error::invalid(format!("invalid bond mode {m}")))?;
                    }
                    _ => return Err(c.usage()),
                }
            }
            LinkKind::Bond { mode }
        }
        "vlan" => parse_vlan(c)?,
        "veth" => {
            let mut info = VethInfo::default();
            while c.tokens_remain() {
                match c.next_token(&["peer"])?.as_str() {
                    "peer" => info.peer = Some(parse_name(c)?),
                    _ => return Err(c.usage()),
                }
            }
            LinkKind::Veth(info)
        }
        "macvlan" => {
            let (parent, mode) = parse_parent_mode(c, &["private", "vepa", "bridge", "passthru", "source"])?;
            let mode = match mode {
                Some(m) => MacvlanMode::from_name(&m)
                    .ok_or_else(|| Error::invalid(format!("invalid macvlan mode {m}")))?,
                None => MacvlanMode::default(),
            };
            LinkKind::Macvlan(MacvlanInfo { parent, mode })
        }
        "ipvlan" | "ipvtap" => {
            let (parent, mode) = parse_parent_mode(c, &["l2", "l3", "l3s"])?;
            let mode = match mode {
                Some(m) => IpvlanMode::from_name(&m)
                    .ok_or_else(|| Error::invalid(format!("invalid ipvlan mode {m}")))?,
                None => IpvlanMode::default(),
            };
            let info = IpvlanInfo { parent, mode };
            if kind == "ipvlan" {
                LinkKind::Ipvlan(info)
            } else {
                LinkKind::Ipvtap(info)
            }
        }
        "vxlan" => parse_vxlan(c)?,
        "geneve" => parse_geneve(c)?,
        "gre" => LinkKind::Gre(parse_tunnel(c)?),
        "gretap" => LinkKind::Gretap(parse_tunnel(c)?),
        "ip6gre" => LinkKind::Ip6Gre(parse_tunnel(c)?),
        "ipip" => LinkKind::Ipip(parse_tunnel(c)?),
        "ip6tnl" => LinkKind::Ip6tnl(parse_tunnel(c)?),
        "sit" => LinkKind::Sit(parse_tunnel(c)?),
        "vti" => LinkKind::Vti(parse_tunnel(c)?),
        "vti6" => LinkKind::Vti6(parse_tunnel(c)?),
        "vrf" => {
            let tok = c.next_token(&["table"])?;
            if tok != "table" {
                return Err(c.usage());
            }
            let table = parse_u32(c, "table")?;
            expect_end(c)?;
            LinkKind::Vrf { table }
        }
        "xfrm" => {
            let mut info = XfrmiInfo::default();
            let mut if_id = None;
            while c.tokens_remain() {
                match c.next_token(&["if_id", "dev"])?.as_str() {
                    "if_id" => if_id = Some(parse_u32(c, "if_id")?),
                    "dev" => info.dev = Some(c.next_token(&["device name"])?),
                    _ => return Err(c.usage()),
                }
            }
            info.if_id = if_id.ok_or_else(|| Error::invalid("xfrm interface needs if_id"))?;
            LinkKind::Xfrm(info)
        }
        "ipoib" => {
            let mut info = IpoibInfo::default();
            while c.tokens_remain() {
                match c.next_token(&["pkey", "mode"])?.as_str() {
                    "pkey" => info.pkey = parse_u16(c, "pkey")?,
                    "mode" => {
                        info.mode = match c.next_token(&["datagram", "connected"])?.as_str() {
                            "datagram" => IpoibMode::Datagram,
                            "connected" => IpoibMode::Connected,
                            _ => return Err(c.usage()),
                        }
                    }
                    _ => return Err(c.usage()),
                }
            }
            LinkKind::Ipoib(info)
        }
        "bareudp" => parse_bareudp(c)?,
        other => return Err(Error::invalid(format!("unsupported link type {other}"))),
    };
    Ok(kind)
}

fn parse_vlan(c: &mut Cursor) -> Result<LinkKind> {
    let mut info = VlanInfo::default();
    let mut id = None;
    while c.tokens_remain() {
        match c.next_token(&["link", "id", "protocol"])?.as_str() {
            "link" => info.parent = Some(c.next_token(&["device name"])?),
            "id" => id = Some(parse_u16(c, "vlan id")?),
            "protocol" => {
                info.protocol = match c.next_token(&["802.1q", "802.1ad"])?.to_ascii_lowercase().as_str() {
                    "802.1q" => VlanProtocol::Dot1Q,
                    "802.1ad" => VlanProtocol::Dot1Ad,
                    _ => return Err(c.usage()),
                }
            }
            _ => return Err(c.usage()),
        }
    }
    if info.parent.is_none() {
        return Err(Error::invalid("vlan needs a parent link"));
    }
    info.id = id.ok_or_else(|| Error::invalid("vlan needs an id"))?;
    Ok(LinkKind::Vlan(info))
}

/// `link DEV [mode M]`, shared by macvlan and ipvlan.
fn parse_parent_mode(c: &mut Cursor, modes: &[&str]) -> Result<(Option<String>, Option<String>)> {
    let mut parent = None;
    let mut mode = None;
    while c.tokens_remain() {
        match c.next_token(&["link", "mode"])?.as_str() {
            "link" => parent = Some(c.next_token(&["device name"])?),
            "mode" => mode = Some(c.next_token(modes)?),
            _ => return Err(c.usage()),
        }
    }
    if parent.is_none() {
        return Err(Error::invalid("a parent link is required"));
    }
    Ok((parent, mode))
}

fn parse_vxlan(c: &mut Cursor) -> Result<LinkKind> {
    let mut info = VxlanInfo::default();
    let mut vni = None;
    while c.tokens_remain() {
        let tok = c.next_token(&["id", "remote", "local", "group", "dstport", "dev", "ttl"])?;
        match tok.as_str() {
            "id" => vni = Some(parse_u32(c, "vxlan id")?),
            "remote" => info.remote = Some(parse_address(c)?),
            "local" => info.local = Some(parse_address(c)?),
            "group" => info.group = Some(parse_address(c)?),
            "dstport" => info.port = Some(parse_u16(c, "dstport")?),
            "dev" => info.dev = Some(c.next_token(&["device name"])?),
            "ttl" => info.ttl = Some(parse_u8(c, "ttl")?),
            _ => return Err(c.usage()),
        }
    }
    info.vni = vni.ok_or_else(|| Error::invalid("vxlan needs an id"))?;
    Ok(LinkKind::Vxlan(info))
}

fn parse_geneve(c: &mut Cursor) -> Result<LinkKind> {
    let mut info = GeneveInfo::default();
    let mut vni = None;
    while c.tokens_remain() {
        match c.next_token(&["id", "remote", "dstport", "ttl"])?.as_str() {
            "id" => vni = Some(parse_u32(c, "geneve id")?),
            "remote" => info.remote = Some(parse_address(c)?),
            "dstport" => info.port = Some(parse_u16(c, "dstport")?),
            "ttl" => info.ttl = Some(parse_u8(c, "ttl")?),
            _ => return Err(c.usage()),
        }
    }
    info.vni = vni.ok_or_else(|| Error::invalid("geneve needs an id"))?;
    if info.remote.is_none() {
        return Err(Error::invalid("geneve needs a remote address"));
    }
    Ok(LinkKind::Geneve(info))
}

fn parse_tunnel(c: &mut Cursor) -> Result<TunnelInfo> {
    let mut info = TunnelInfo::default();
    let (mut ttl, mut tos, mut ikey, mut okey) = (None, None, None, None);
    while c.tokens_remain() {
        let tok = c.next_token(&["remote", "local", "ttl", "tos", "ikey", "okey", "key", "dev"])?;
        match tok.as_str() {
            "remote" => set_once(&mut info.remote, ip_from_str(&c.next_token(&["IP"])?)?, "remote")?,
            "local" => set_once(&mut info.local, ip_from_str(&c.next_token(&["IP"])?)?, "local")?,
            "ttl" => set_once(&mut ttl, parse_u8(c, "ttl")?, "ttl")?,
            "tos" => set_once(&mut tos, parse_u8(c, "tos")?, "tos")?,
            "ikey" => set_once(&mut ikey, parse_u32(c, "ikey")?, "ikey")?,
            "okey" => set_once(&mut okey, parse_u32(c, "okey")?, "okey")?,
            "key" => {
                let key = parse_u32(c, "key")?;
                set_once(&mut ikey, key, "ikey")?;
                set_once(&mut okey, key, "okey")?;
            }
            "dev" => set_once(&mut info.dev, c.next_token(&["device name"])?, "dev")?,
            _ => return Err(c.usage()),
        }
    }
    info.ttl = ttl.unwrap_or(info.ttl);
    info.tos = tos.unwrap_or(info.tos);
    info.ikey = ikey.unwrap_or(info.ikey);
    info.okey = okey.unwrap_or(info.okey);
    Ok(info)
}

fn parse_bareudp(c: &mut Cursor) -> Result<LinkKind> {
    let mut port = None;
    let mut ethertype = None;
    while c.tokens_remain() {
        match c.next_token(&["dstport", "ethertype"])?.as_str() {
            "dstport" => port = Some(parse_u16(c, "dstport")?),
            "ethertype" => {
                let tok = c.next_token(&["ipv4", "ipv6", "mpls_uc", "mpls_mc", "NUMBER"])?;
                ethertype = Some(match tok.as_str() {
                    "ipv4" => 0x0800,
                    "ipv6" => 0x86dd,
                    "mpls_uc" => 0x8847,
                    "mpls_mc" => 0x8848,
                    _ => u16_from_str(&tok, "ethertype")?,
                });
            }
            _ => return Err(c.usage()),
        }
    }
    match (port, ethertype) {
        (Some(port), Some(ethertype)) => Ok(LinkKind::Bareudp(BareudpInfo { port, ethertype })),
        _ => Err(Error::invalid("bareudp needs dstport and ethertype")),
    }
}

/// An EUI-64 GUID written as eight colon-separated octets.
fn parse_guid(c: &mut Cursor) -> Result<u64> {
    let mac = parse_hardware_address(c)?;
    let bytes: [u8; 8] = mac
        .0
        .as_slice()
        .try_into()
        .map_err(|_| Error::invalid(format!("invalid GUID: {mac}")))?;
    Ok(u64::from_be_bytes(bytes))
}

fn parse_vf(c: &mut Cursor, changes: &mut Vec<LinkChange>) -> Result<()> {
    let index = parse_u32(c, "vf")?;
    let before = changes.len();
    while let Some(tok) = c.peek_token(VF_OPTIONS)
        && VF_OPTIONS.contains(&tok)
    {
        let tok = c.next_token(VF_OPTIONS)?;
        let change = match tok.as_str() {
            "mac" => VfChange::Mac(parse_hardware_address(c)?),
            "vlan" => {
                let vlan = parse_u16(c, "vlan")?;
                let qos = if c.peek_token(&["qos"]) == Some("qos") {
                    c.next_token(&["qos"])?;
                    parse_u8(c, "qos")?
                } else {
                    0
                };
                VfChange::Vlan { vlan, qos }
            }
            "rate" => VfChange::Rate(parse_u32(c, "rate")?),
            "max_tx_rate" => VfChange::MaxTxRate(parse_u32(c, "max_tx_rate")?),
            "min_tx_rate" => VfChange::MinTxRate(parse_u32(c, "min_tx_rate")?),
            "spoofchk" => VfChange::SpoofCheck(parse_on_off(c)?),
            "trust" => VfChange::Trust(parse_on_off(c)?),
            "state" => {
                let s = c.next_token(&["auto", "enable", "disable"])?;
                VfChange::State(VfLinkState::from_name(&s).ok_or_else(|| c.usage())?)
            }
            "node_guid" => VfChange::NodeGuid(parse_guid(c)?),
            _ => VfChange::PortGuid(parse_guid(c)?),
        };
        changes.push(LinkChange::Vf { index, change });
    }
    if changes.len() == before {
        c.next_token(VF_OPTIONS)?;
        return Err(c.usage());
    }
    Ok(())
}

fn parse_changes(c: &mut Cursor) -> Result<Vec<LinkChange>> {
    let mut changes = Vec::new();
    while c.tokens_remain() {
        let tok = c.next_token(SET_OPTIONS)?;
        let change = match tok.as_str() {
            "up" => LinkChange::Up,
            "down" => LinkChange::Down,
            "arp" => LinkChange::Arp(parse_on_off(c)?),
            "multicast" => LinkChange::Multicast(parse_on_off(c)?),
            "allmulticast" => LinkChange::AllMulticast(parse_on_off(c)?),
            "promisc" => LinkChange::Promisc(parse_on_off(c)?),
            "txqueuelen" | "txqlen" => LinkChange::TxQueueLen(parse_u32(c, "txqueuelen")?),
            "name" => LinkChange::Name(c.next_token(&["NEWNAME"])?),
            "address" => LinkChange::Address(parse_hardware_address(c)?),
            "mtu" => LinkChange::Mtu(parse_u32(c, "mtu")?),
            "group" => LinkChange::Group(parse_u32(c, "group")?),
            "alias" => LinkChange::Alias(c.next_token(&["NAME"])?),
            "master" => LinkChange::Master(c.next_token(&["DEVICE"])?),
            "nomaster" => LinkChange::NoMaster,
            "netns" => {
                let ns = c.next_token(&["PID", "NAME"])?;
                LinkChange::Netns(match u32_from_str(&ns, "netns") {
                    Ok(pid) => NetnsTarget::Pid(pid),
                    Err(_) => NetnsTarget::Name(ns),
                })
            }
            "vf" => {
                parse_vf(c, &mut changes)?;
                continue;
            }
            _ => return Err(c.usage()),
        };
        changes.push(change);
    }
    Ok(changes)
}

/// Names `link show type` accepts after the first.
fn is_kind_name(tok: &str) -> bool {
    KINDS.contains(&tok) || matches!(tok, "device" | "tun")
}

/// `[[dev] NAME] [type TYPE...]`.
fn parse_filter(c: &mut Cursor) -> Result<LinkFilter> {
    let mut f = LinkFilter::default();
    while c.tokens_remain() {
        let tok = c.next_token(&["dev", "type", "DEVICE"])?;
        match tok.as_str() {
            "dev" => f.name = Some(c.next_token(&["device name"])?),
            "type" => {
                f.kinds.push(c.next_token(KINDS)?);
                while let Some(next) = c.peek_token(KINDS)
                    && is_kind_name(next)
                {
                    let kind = c.next_token(KINDS)?;
                    f.kinds.push(kind);
                }
            }
            _ if f.name.is_none() => f.name = Some(tok),
            _ => return Err(c.usage()),
        }
    }
    Ok(f)
}

pub async fn execute<G: Gateway, W: Write>(
    cmd: LinkCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        LinkCommand::Add(link) => gw
            .add_link(&link)
            .await
            .context(format!("adding {} link {}", link.kind.name(), link.name)),
        LinkCommand::Delete(name) => gw
            .delete_link(&name)
            .await
            .context(format!("deleting link {name}")),
        LinkCommand::Set { name, changes } => {
            // Applied in order; later changes see the renamed device.
            let mut current = name;
            for change in &changes {
                debug!(link = %current, ?change, "applying link change");
                gw.apply_link_change(&current, change)
                    .await
                    .context(format!("setting link {current}"))?;
                if let LinkChange::Name(new) = change {
                    current = new.clone();
                }
            }
            Ok(())
        }
        LinkCommand::Show(filter) => {
            let links = gw.links().await.context("listing links")?;
            if let Some(name) = &filter.name
                && !links.iter().any(|l| l.name == *name)
            {
                return Err(Error::invalid(format!("Device \"{name}\" does not exist.")));
            }
            let views: Vec<LinkView<'_>> = links
                .iter()
                .filter(|l| filter.matches(l))
                .map(|l| LinkView::new(l).with_master(master_name(&links, l)))
                .collect();
            print_all(out, &views, &opts.output)
        }
        LinkCommand::Help => write_help(out, help::LINK),
    }
}
