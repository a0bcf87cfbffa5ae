//! `RTM_*LINK` encoding and decoding.

use std::net::IpAddr;
use std::os::unix::io::RawFd;

use super::attr::{attrs, get};
use super::builder::MessageBuilder;
use super::message::{IfInfoMsg, LinkStats64, read_header};
use crate::gateway::{GatewayResult, LinkChange, NetnsTarget, VfChange};
use crate::types::link::{
    BareudpInfo, BondMode, GeneveInfo, IpoibInfo, IpoibMode, IpvlanInfo, IpvlanMode, MacvlanInfo,
    MacvlanMode, TunnelInfo, VethInfo, VlanInfo, VlanProtocol, VxlanInfo, XfrmiInfo, iff,
};
use crate::types::{HardwareAddr, Link, LinkKind, LinkStats, OperState};

/// `IFLA_*` attribute types.
pub mod ifla {
    pub const ADDRESS: u16 = 1;
    pub const IFNAME: u16 = 3;
    pub const MTU: u16 = 4;
    pub const LINK: u16 = 5;
    pub const MASTER: u16 = 10;
    pub const TXQLEN: u16 = 13;
    pub const OPERSTATE: u16 = 16;
    pub const LINKINFO: u16 = 18;
    pub const NET_NS_PID: u16 = 19;
    pub const IFALIAS: u16 = 20;
    pub const VFINFO_LIST: u16 = 22;
    pub const STATS64: u16 = 23;
    pub const GROUP: u16 = 27;
    pub const NET_NS_FD: u16 = 28;
    pub const NUM_TX_QUEUES: u16 = 31;
    pub const NUM_RX_QUEUES: u16 = 32;

    pub const INFO_KIND: u16 = 1;
    pub const INFO_DATA: u16 = 2;

    pub const VF_INFO: u16 = 1;
    pub const VF_MAC: u16 = 1;
    pub const VF_VLAN: u16 = 2;
    pub const VF_TX_RATE: u16 = 3;
    pub const VF_SPOOFCHK: u16 = 4;
    pub const VF_LINK_STATE: u16 = 5;
    pub const VF_RATE: u16 = 6;
    pub const VF_TRUST: u16 = 9;
    pub const VF_IB_NODE_GUID: u16 = 10;
    pub const VF_IB_PORT_GUID: u16 = 11;
}

/// Per-kind `IFLA_INFO_DATA` attribute types.
mod info {
    pub const VLAN_ID: u16 = 1;
    pub const VLAN_PROTOCOL: u16 = 5;
    pub const BOND_MODE: u16 = 1;
    pub const MACVLAN_MODE: u16 = 1;
    pub const IPVLAN_MODE: u16 = 1;
    pub const VRF_TABLE: u16 = 1;
    pub const VETH_PEER: u16 = 1;

    pub const VXLAN_ID: u16 = 1;
    pub const VXLAN_GROUP: u16 = 2;
    pub const VXLAN_LINK: u16 = 3;
    pub const VXLAN_LOCAL: u16 = 4;
    pub const VXLAN_TTL: u16 = 5;
    pub const VXLAN_PORT: u16 = 15;
    pub const VXLAN_GROUP6: u16 = 16;
    pub const VXLAN_LOCAL6: u16 = 17;

    pub const GENEVE_ID: u16 = 1;
    pub const GENEVE_REMOTE: u16 = 2;
    pub const GENEVE_TTL: u16 = 3;
    pub const GENEVE_PORT: u16 = 5;
    pub const GENEVE_REMOTE6: u16 = 7;

    pub const GRE_LINK: u16 = 1;
    pub const GRE_IFLAGS: u16 = 2;
    pub const GRE_OFLAGS: u16 = 3;
    pub const GRE_IKEY: u16 = 4;
    pub const GRE_OKEY: u16 = 5;
    pub const GRE_LOCAL: u16 = 6;
    pub const GRE_REMOTE: u16 = 7;
    pub const GRE_TTL: u16 = 8;
    pub const GRE_TOS: u16 = 9;
    /// `GRE_KEY` in the i/oflags words.
    pub const GRE_KEY: u16 = 0x2000;

    pub const IPTUN_LINK: u16 = 1;
    pub const IPTUN_LOCAL: u16 = 2;
    pub const IPTUN_REMOTE: u16 = 3;
    pub const IPTUN_TTL: u16 = 4;
    pub const IPTUN_TOS: u16 = 5;
    pub const IPTUN_PROTO: u16 = 9;

    pub const VTI_LINK: u16 = 1;
    pub const VTI_IKEY: u16 = 2;
    pub const VTI_OKEY: u16 = 3;
    pub const VTI_LOCAL: u16 = 4;
    pub const VTI_REMOTE: u16 = 5;

    pub const XFRM_LINK: u16 = 1;
    pub const XFRM_IF_ID: u16 = 2;

    pub const IPOIB_PKEY: u16 = 1;
    pub const IPOIB_MODE: u16 = 2;

    pub const BAREUDP_PORT: u16 = 1;
    pub const BAREUDP_ETHERTYPE: u16 = 2;
}

const IPPROTO_IPV6: u8 = 41;

/// Link-layer type names for `ifi_type`.
fn encap_name(arphrd: u16) -> String {
    match arphrd {
        1 => "ether".into(),
        32 => "infiniband".into(),
        768 => "ipip".into(),
        769 => "tunnel6".into(),
        772 => "loopback".into(),
        776 => "sit".into(),
        778 => "gre".into(),
        823 => "gre6".into(),
        0xfffe => "none".into(),
        0xffff => "void".into(),
        other => format!("[{other}]"),
    }
}

/// A decoded link plus the parent index still to be named.
#[derive(Debug, Clone)]
pub struct DecodedLink {
    pub link: Link,
    pub parent: Option<u32>,
}

pub fn decode(payload: &[u8]) -> GatewayResult<DecodedLink> {
    let hdr: IfInfoMsg = read_header(payload)?;
    let mut link = Link {
        index: hdr.ifi_index as u32,
        flags: hdr.ifi_flags,
        encap: encap_name(hdr.ifi_type),
        ..Default::default()
    };
    let mut parent = None;
    let mut kind_name = None;
    let mut kind_data: &[u8] = &[];
    let mut veth_peer: Option<u32> = None;

    for (kind, data) in attrs(&payload[IfInfoMsg::SIZE..]) {
        match kind {
            ifla::IFNAME => link.name = get::string(data)?,
            ifla::ADDRESS if !data.is_empty() => link.address = Some(HardwareAddr(data.to_vec())),
            ifla::MTU => link.mtu = get::u32(data)?,
            ifla::LINK => {
                let index = get::u32(data)?;
                if index != 0 && index != link.index {
                    parent = Some(index);
                    veth_peer = Some(index);
                }
            }
            ifla::MASTER => {
                let index = get::u32(data)?;
                link.master = (index != 0).then_some(index);
            }
            ifla::TXQLEN => link.txqlen = get::u32(data)?,
            ifla::OPERSTATE => link.oper_state = OperState::from_u8(get::u8(data)?),
            ifla::IFALIAS => {
                let alias = get::string(data)?;
                link.alias = (!alias.is_empty()).then_some(alias);
            }
            ifla::GROUP => link.group = get::u32(data)?,
            ifla::NUM_TX_QUEUES => link.num_tx_queues = Some(get::u32(data)?),
            ifla::NUM_RX_QUEUES => link.num_rx_queues = Some(get::u32(data)?),
            ifla::STATS64 => {
                let s: LinkStats64 = read_header(data)?;
                link.stats = Some(LinkStats {
                    rx_bytes: s.rx_bytes,
                    rx_packets: s.rx_packets,
                    rx_errors: s.rx_errors,
                    rx_dropped: s.rx_dropped,
                    rx_missed: s.rx_missed_errors,
                    multicast: s.multicast,
                    tx_bytes: s.tx_bytes,
                    tx_packets: s.tx_packets,
                    tx_errors: s.tx_errors,
                    tx_dropped: s.tx_dropped,
                    tx_carrier: s.tx_carrier_errors,
                    collisions: s.collisions,
                });
            }
            ifla::LINKINFO => {
                for (k, d) in attrs(data) {
                    match k {
                        ifla::INFO_KIND => kind_name = Some(get::string(d)?),
                        ifla::INFO_DATA => kind_data = d,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    if let Some(name) = kind_name {
        let (kind, kind_parent) = decode_kind(&name, kind_data)?;
        link.kind = kind;
        if kind_parent.is_some() {
            parent = kind_parent;
        }
        if matches!(link.kind, LinkKind::Veth(_)) {
            parent = veth_peer;
        }
    }
    Ok(DecodedLink { link, parent })
}

fn ip_attr(data: &[u8]) -> GatewayResult<Option<IpAddr>> {
    let addr = get::ip(data)?;
    Ok((!addr.is_unspecified()).then_some(addr))
}

fn nonzero(index: u32) -> Option<u32> {
    (index != 0).then_some(index)
}

/// Decode `IFLA_INFO_DATA`, returning the kind and any lower-device index.
fn decode_kind(name: &str, data: &[u8]) -> GatewayResult<(LinkKind, Option<u32>)> {
    let mut parent = None;
    let found = attrs(data);
    let kind = match name {
        "dummy" => LinkKind::Dummy,
        "ifb" => LinkKind::Ifb,
        "bridge" => LinkKind::Bridge,
        "tun" => LinkKind::Tun,
        "bond" => {
            let mut mode = BondMode::default();
            for (k, d) in found {
                if k == info::BOND_MODE {
                    mode = BondMode::from_name(&get::u8(d)?.to_string()).unwrap_or_default();
                }
            }
            LinkKind::Bond { mode }
        }
        "vrf" => {
            let mut table = 0;
            for (k, d) in found {
                if k == info::VRF_TABLE {
                    table = get::u32(d)?;
                }
            }
            LinkKind::Vrf { table }
        }
        "vlan" => {
            let mut v = VlanInfo::default();
            for (k, d) in found {
                match k {
                    info::VLAN_ID => v.id = get::u16(d)?,
                    info::VLAN_PROTOCOL if get::u16_be(d)? == VlanProtocol::Dot1Ad.ethertype() => {
                        v.protocol = VlanProtocol::Dot1Ad;
                    }
                    _ => {}
                }
            }
            LinkKind::Vlan(v)
        }
        "macvlan" | "macvtap" => {
            let mut v = MacvlanInfo::default();
            for (k, d) in found {
                if k == info::MACVLAN_MODE {
                    v.mode = MacvlanMode::from_bits(get::u32(d)?);
                }
            }
            LinkKind::Macvlan(v)
        }
        "ipvlan" | "ipvtap" => {
            let mut v = IpvlanInfo::default();
            for (k, d) in found {
                if k == info::IPVLAN_MODE {
                    v.mode = match get::u16(d)? {
                        1 => IpvlanMode::L3,
                        2 => IpvlanMode::L3s,
                        _ => IpvlanMode::L2,
                    };
                }
            }
            if name == "ipvtap" {
                LinkKind::Ipvtap(v)
            } else {
                LinkKind::Ipvlan(v)
            }
        }
        "veth" => LinkKind::Veth(VethInfo::default()),
        "vxlan" => {
            let mut v = VxlanInfo::default();
            for (k, d) in found {
                match k {
                    info::VXLAN_ID => v.vni = get::u32(d)?,
                    info::VXLAN_GROUP | info::VXLAN_GROUP6 => {
                        if let Some(addr) = ip_attr(d)? {
                            if addr.is_multicast() {
                                v.group = Some(addr);
                            } else {
                                v.remote = Some(addr);
                            }
                        }
                    }
                    info::VXLAN_LOCAL | info::VXLAN_LOCAL6 => v.local = ip_attr(d)?,
                    info::VXLAN_LINK => parent = nonzero(get::u32(d)?),
                    info::VXLAN_TTL => v.ttl = Some(get::u8(d)?),
                    info::VXLAN_PORT => v.port = Some(get::u16_be(d)?),
                    _ => {}
                }
            }
            LinkKind::Vxlan(v)
        }
        "geneve" => {
            let mut v = GeneveInfo::default();
            for (k, d) in found {
                match k {
                    info::GENEVE_ID => v.vni = get::u32(d)?,
                    info::GENEVE_REMOTE | info::GENEVE_REMOTE6 => v.remote = ip_attr(d)?,
                    info::GENEVE_TTL => v.ttl = Some(get::u8(d)?),
                    info::GENEVE_PORT => v.port = Some(get::u16_be(d)?),
                    _ => {}
                }
            }
            LinkKind::Geneve(v)
        }
        "gre" | "gretap" | "ip6gre" => {
            let mut t = TunnelInfo::default();
            for (k, d) in found {
                match k {
                    info::GRE_LINK => parent = nonzero(get::u32(d)?),
                    info::GRE_IKEY => t.ikey = get::u32_be(d)?,
                    info::GRE_OKEY => t.okey = get::u32_be(d)?,
                    info::GRE_LOCAL => t.local = ip_attr(d)?,
                    info::GRE_REMOTE => t.remote = ip_attr(d)?,
                    info::GRE_TTL => t.ttl = get::u8(d)?,
                    info::GRE_TOS => t.tos = get::u8(d)?,
                    _ => {}
                }
            }
            match name {
                "gre" => LinkKind::Gre(t),
                "gretap" => LinkKind::Gretap(t),
                _ => LinkKind::Ip6Gre(t),
            }
        }
        "ipip" | "sit" | "ip6tnl" => {
            let mut t = TunnelInfo::default();
            for (k, d) in found {
                match k {
                    info::IPTUN_LINK => parent = nonzero(get::u32(d)?),
                    info::IPTUN_LOCAL => t.local = ip_attr(d)?,
                    info::IPTUN_REMOTE => t.remote = ip_attr(d)?,
                    info::IPTUN_TTL => t.ttl = get::u8(d)?,
                    info::IPTUN_TOS if name != "ip6tnl" => t.tos = get::u8(d)?,
                    _ => {}
                }
            }
            match name {
                "ipip" => LinkKind::Ipip(t),
                "sit" => LinkKind::Sit(t),
                _ => LinkKind::Ip6tnl(t),
            }
        }
        "vti" | "vti6" => {
            let mut t = TunnelInfo::default();
            for (k, d) in found {
                match k {
                    info::VTI_LINK => parent = nonzero(get::u32(d)?),
                    info::VTI_IKEY => t.ikey = get::u32_be(d)?,
                    info::VTI_OKEY => t.okey = get::u32_be(d)?,
                    info::VTI_LOCAL => t.local = ip_attr(d)?,
                    info::VTI_REMOTE => t.remote = ip_attr(d)?,
                    _ => {}
                }
            }
            if name == "vti" {
                LinkKind::Vti(t)
            } else {
                LinkKind::Vti6(t)
            }
        }
        "xfrm" => {
            let mut x = XfrmiInfo::default();
            for (k, d) in found {
                match k {
                    info::XFRM_LINK => parent = nonzero(get::u32(d)?),
                    info::XFRM_IF_ID => x.if_id = get::u32(d)?,
                    _ => {}
                }
            }
            LinkKind::Xfrm(x)
        }
        "ipoib" => {
            let mut i = IpoibInfo::default();
            for (k, d) in found {
                match k {
                    info::IPOIB_PKEY => i.pkey = get::u16(d)?,
                    info::IPOIB_MODE if get::u16(d)? == 1 => i.mode = IpoibMode::Connected,
                    _ => {}
                }
            }
            LinkKind::Ipoib(i)
        }
        "bareudp" => {
            let mut b = BareudpInfo::default();
            for (k, d) in found {
                match k {
                    info::BAREUDP_PORT => b.port = get::u16_be(d)?,
                    info::BAREUDP_ETHERTYPE => b.ethertype = get::u16_be(d)?,
                    _ => {}
                }
            }
            LinkKind::Bareudp(b)
        }
        other => LinkKind::Other(other.to_string()),
    };
    Ok((kind, parent))
}

/// Fill in the lower-device name found through the parent index.
pub fn set_parent_name(kind: &mut LinkKind, name: String) {
    match kind {
        LinkKind::Vlan(v) => v.parent = Some(name),
        LinkKind::Macvlan(v) => v.parent = Some(name),
        LinkKind::Ipvlan(v) | LinkKind::Ipvtap(v) => v.parent = Some(name),
        LinkKind::Veth(v) => v.peer = Some(name),
        LinkKind::Vxlan(v) => v.dev = Some(name),
        LinkKind::Xfrm(x) => x.dev = Some(name),
        LinkKind::Gretap(t)
        | LinkKind::Gre(t)
        | LinkKind::Ip6Gre(t)
        | LinkKind::Ipip(t)
        | LinkKind::Ip6tnl(t)
        | LinkKind::Sit(t)
        | LinkKind::Vti(t)
        | LinkKind::Vti6(t) => t.dev = Some(name),
        _ => {}
    }
}

/// The lower device a new link of this kind hangs off, by name.
pub fn parent_name(kind: &LinkKind) -> Option<&str> {
    match kind {
        LinkKind::Vlan(v) => v.parent.as_deref(),
        LinkKind::Macvlan(v) => v.parent.as_deref(),
        LinkKind::Ipvlan(v) | LinkKind::Ipvtap(v) => v.parent.as_deref(),
        LinkKind::Vxlan(v) => v.dev.as_deref(),
        LinkKind::Xfrm(x) => x.dev.as_deref(),
        other => other.tunnel().and_then(|t| t.dev.as_deref()),
    }
}

/// Encode `RTM_NEWLINK` attributes creating `link`.
///
/// `parent` is the resolved index of [`parent_name`].
pub fn encode_add(b: &mut MessageBuilder, link: &Link, parent: Option<u32>) {
    b.header(&IfInfoMsg::default());
    b.attr_str(ifla::IFNAME, &link.name);
    if link.mtu != 0 {
        b.attr_u32(ifla::MTU, link.mtu);
    }
    if let Some(mac) = &link.address {
        b.attr(ifla::ADDRESS, mac.as_bytes());
    }
    if link.txqlen != 0 {
        b.attr_u32(ifla::TXQLEN, link.txqlen);
    }
    if link.group != 0 {
        b.attr_u32(ifla::GROUP, link.group);
    }
    if let Some(n) = link.num_tx_queues {
        b.attr_u32(ifla::NUM_TX_QUEUES, n);
    }
    if let Some(n) = link.num_rx_queues {
        b.attr_u32(ifla::NUM_RX_QUEUES, n);
    }
    let top_level_parent = matches!(
        link.kind,
        LinkKind::Vlan(_) | LinkKind::Macvlan(_) | LinkKind::Ipvlan(_) | LinkKind::Ipvtap(_)
    );
    if top_level_parent && let Some(index) = parent {
        b.attr_u32(ifla::LINK, index);
    }

    let nest = b.nest_start(ifla::LINKINFO);
    b.attr_str(ifla::INFO_KIND, link.kind.name());
    let data = b.nest_start(ifla::INFO_DATA);
    encode_kind(b, &link.kind, parent);
    b.nest_end(data);
    b.nest_end(nest);
}

fn encode_tunnel_addrs(b: &mut MessageBuilder, t: &TunnelInfo, local: u16, remote: u16) {
    if let Some(addr) = &t.local {
        b.attr_ip(local, addr);
    }
    if let Some(addr) = &t.remote {
        b.attr_ip(remote, addr);
    }
}

fn encode_kind(b: &mut MessageBuilder, kind: &LinkKind, parent: Option<u32>) {
    match kind {
        LinkKind::Bond { mode } => b.attr_u8(info::BOND_MODE, *mode as u8),
        LinkKind::Vrf { table } => b.attr_u32(info::VRF_TABLE, *table),
        LinkKind::Vlan(v) => {
            b.attr_u16(info::VLAN_ID, v.id);
            b.attr_u16_be(info::VLAN_PROTOCOL, v.protocol.ethertype());
        }
        LinkKind::Macvlan(v) => b.attr_u32(info::MACVLAN_MODE, v.mode.bits()),
        LinkKind::Ipvlan(v) | LinkKind::Ipvtap(v) => {
            let mode = match v.mode {
                IpvlanMode::L2 => 0,
                IpvlanMode::L3 => 1,
                IpvlanMode::L3s => 2,
            };
            b.attr_u16(info::IPVLAN_MODE, mode);
        }
        LinkKind::Veth(v) => {
            if let Some(peer) = &v.peer {
                let nest = b.nest_start(info::VETH_PEER);
                b.raw(zerocopy::IntoBytes::as_bytes(&IfInfoMsg::default()));
                b.attr_str(ifla::IFNAME, peer);
                b.nest_end(nest);
            }
        }
        LinkKind::Vxlan(v) => {
            b.attr_u32(info::VXLAN_ID, v.vni);
            for addr in v.remote.iter().chain(v.group.iter()) {
                let kind = if addr.is_ipv4() { info::VXLAN_GROUP } else { info::VXLAN_GROUP6 };
                b.attr_ip(kind, addr);
            }
            if let Some(addr) = &v.local {
                let kind = if addr.is_ipv4() { info::VXLAN_LOCAL } else { info::VXLAN_LOCAL6 };
                b.attr_ip(kind, addr);
            }
            if let Some(index) = parent {
                b.attr_u32(info::VXLAN_LINK, index);
            }
            if let Some(ttl) = v.ttl {
                b.attr_u8(info::VXLAN_TTL, ttl);
            }
            if let Some(port) = v.port {
                b.attr_u16_be(info::VXLAN_PORT, port);
            }
        }
        LinkKind::Geneve(g) => {
            b.attr_u32(info::GENEVE_ID, g.vni);
            if let Some(addr) = &g.remote {
                let kind = if addr.is_ipv4() { info::GENEVE_REMOTE } else { info::GENEVE_REMOTE6 };
                b.attr_ip(kind, addr);
            }
            if let Some(ttl) = g.ttl {
                b.attr_u8(info::GENEVE_TTL, ttl);
            }
            if let Some(port) = g.port {
                b.attr_u16_be(info::GENEVE_PORT, port);
            }
        }
        LinkKind::Gre(t) | LinkKind::Gretap(t) | LinkKind::Ip6Gre(t) => {
            if let Some(index) = parent {
                b.attr_u32(info::GRE_LINK, index);
            }
            if t.ikey != 0 {
                b.attr_u16_be(info::GRE_IFLAGS, info::GRE_KEY);
                b.attr_u32_be(info::GRE_IKEY, t.ikey);
            }
            if t.okey != 0 {
                b.attr_u16_be(info::GRE_OFLAGS, info::GRE_KEY);
                b.attr_u32_be(info::GRE_OKEY, t.okey);
            }
            encode_tunnel_addrs(b, t, info::GRE_LOCAL, info::GRE_REMOTE);
            b.attr_u8(info::GRE_TTL, t.ttl);
            b.attr_u8(info::GRE_TOS, t.tos);
        }
        LinkKind::Ipip(t) | LinkKind::Sit(t) | LinkKind::Ip6tnl(t) => {
            if let Some(index) = parent {
                b.attr_u32(info::IPTUN_LINK, index);
            }
            encode_tunnel_addrs(b, t, info::IPTUN_LOCAL, info::IPTUN_REMOTE);
            b.attr_u8(info::IPTUN_TTL, t.ttl);
            if matches!(kind, LinkKind::Ip6tnl(_)) {
                b.attr_u8(info::IPTUN_PROTO, IPPROTO_IPV6);
            } else {
                b.attr_u8(info::IPTUN_TOS, t.tos);
            }
        }
        LinkKind::Vti(t) | LinkKind::Vti6(t) => {
            if let Some(index) = parent {
                b.attr_u32(info::VTI_LINK, index);
            }
            b.attr_u32_be(info::VTI_IKEY, t.ikey);
            b.attr_u32_be(info::VTI_OKEY, t.okey);
            encode_tunnel_addrs(b, t, info::VTI_LOCAL, info::VTI_REMOTE);
        }
        LinkKind::Xfrm(x) => {
            if let Some(index) = parent {
                b.attr_u32(info::XFRM_LINK, index);
            }
            b.attr_u32(info::XFRM_IF_ID, x.if_id);
        }
        LinkKind::Ipoib(i) => {
            b.attr_u16(info::IPOIB_PKEY, i.pkey);
            let mode = match i.mode {
                IpoibMode::Datagram => 0,
                IpoibMode::Connected => 1,
            };
            b.attr_u16(info::IPOIB_MODE, mode);
        }
        LinkKind::Bareudp(u) => {
            b.attr_u16_be(info::BAREUDP_PORT, u.port);
            b.attr_u16_be(info::BAREUDP_ETHERTYPE, u.ethertype);
        }
        _ => {}
    }
}

/// Names resolved before a [`LinkChange`] is encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeRefs {
    /// Index of the new master.
    pub master: Option<u32>,
    /// Open descriptor of the target namespace.
    pub netns_fd: Option<RawFd>,
}

/// Encode an `RTM_NEWLINK` applying one change to link `index`.
pub fn encode_change(b: &mut MessageBuilder, index: u32, change: &LinkChange, refs: ChangeRefs) {
    let mut hdr = IfInfoMsg::with_index(index);
    let mut flag = |bit: u32, on: bool| {
        hdr.ifi_change |= bit;
        if on {
            hdr.ifi_flags |= bit;
        }
    };
    match change {
        LinkChange::Up => flag(iff::UP, true),
        LinkChange::Down => flag(iff::UP, false),
        LinkChange::Arp(on) => flag(iff::NOARP, !on),
        LinkChange::Promisc(on) => flag(iff::PROMISC, *on),
        LinkChange::Multicast(on) => flag(iff::MULTICAST, *on),
        LinkChange::AllMulticast(on) => flag(iff::ALLMULTI, *on),
        _ => {}
    }
    b.header(&hdr);
    match change {
        LinkChange::Address(mac) => b.attr(ifla::ADDRESS, mac.as_bytes()),
        LinkChange::Mtu(mtu) => b.attr_u32(ifla::MTU, *mtu),
        LinkChange::Name(name) => b.attr_str(ifla::IFNAME, name),
        LinkChange::Alias(alias) => b.attr_str(ifla::IFALIAS, alias),
        LinkChange::TxQueueLen(len) => b.attr_u32(ifla::TXQLEN, *len),
        LinkChange::Group(group) => b.attr_u32(ifla::GROUP, *group),
        LinkChange::Master(_) => b.attr_u32(ifla::MASTER, refs.master.unwrap_or(0)),
        LinkChange::NoMaster => b.attr_u32(ifla::MASTER, 0),
        LinkChange::Netns(NetnsTarget::Pid(pid)) => b.attr_u32(ifla::NET_NS_PID, *pid),
        LinkChange::Netns(NetnsTarget::Name(_)) => {
            if let Some(fd) = refs.netns_fd {
                b.attr_u32(ifla::NET_NS_FD, fd as u32);
            }
        }
        LinkChange::Vf { index, change } => encode_vf(b, *index, change),
        _ => {}
    }
}

fn encode_vf(b: &mut MessageBuilder, vf: u32, change: &VfChange) {
    let list = b.nest_start(ifla::VFINFO_LIST);
    let entry = b.nest_start(ifla::VF_INFO);
    let mut body = vf.to_ne_bytes().to_vec();
    let kind = match change {
        VfChange::Mac(mac) => {
            let mut raw = [0u8; 32];
            let n = mac.as_bytes().len().min(raw.len());
            raw[..n].copy_from_slice(&mac.as_bytes()[..n]);
            body.extend_from_slice(&raw);
            ifla::VF_MAC
        }
        VfChange::Vlan { vlan, qos } => {
            body.extend_from_slice(&u32::from(*vlan).to_ne_bytes());
            body.extend_from_slice(&u32::from(*qos).to_ne_bytes());
            ifla::VF_VLAN
        }
        VfChange::Rate(rate) => {
            body.extend_from_slice(&rate.to_ne_bytes());
            ifla::VF_TX_RATE
        }
        VfChange::MaxTxRate(rate) => {
            body.extend_from_slice(&0u32.to_ne_bytes());
            body.extend_from_slice(&rate.to_ne_bytes());
            ifla::VF_RATE
        }
        VfChange::MinTxRate(rate) => {
            body.extend_from_slice(&rate.to_ne_bytes());
            body.extend_from_slice(&0u32.to_ne_bytes());
            ifla::VF_RATE
        }
        VfChange::State(state) => {
            body.extend_from_slice(&state.value().to_ne_bytes());
            ifla::VF_LINK_STATE
        }
        VfChange::SpoofCheck(on) => {
            body.extend_from_slice(&u32::from(*on).to_ne_bytes());
            ifla::VF_SPOOFCHK
        }
        VfChange::Trust(on) => {
            body.extend_from_slice(&u32::from(*on).to_ne_bytes());
            ifla::VF_TRUST
        }
        VfChange::NodeGuid(guid) | VfChange::PortGuid(guid) => {
            // struct ifla_vf_guid pads the u32 up to the u64.
            body.extend_from_slice(&[0; 4]);
            body.extend_from_slice(&guid.to_ne_bytes());
            if matches!(change, VfChange::NodeGuid(_)) {
                ifla::VF_IB_NODE_GUID
            } else {
                ifla::VF_IB_PORT_GUID
            }
        }
    };
    b.attr(kind, &body);
    b.nest_end(entry);
    b.nest_end(list);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::connection::ack_request;
    use crate::netlink::message::{NLMSG_HDRLEN, msg_type};

    fn payload(b: MessageBuilder) -> Vec<u8> {
        b.finish()[NLMSG_HDRLEN..].to_vec()
    }

    #[test]
    fn test_add_then_decode_vlan() {
        let link = Link {
            mtu: 1400,
            kind: LinkKind::Vlan(VlanInfo {
                parent: Some("eth0".into()),
                id: 100,
                protocol: VlanProtocol::Dot1Ad,
            }),
            ..Link::named("eth0.100")
        };
        let mut b = ack_request(msg_type::RTM_NEWLINK, 0);
        encode_add(&mut b, &link, Some(2));
        let decoded = decode(&payload(b)).unwrap();
        assert_eq!(decoded.link.name, "eth0.100");
        assert_eq!(decoded.link.mtu, 1400);
        assert_eq!(decoded.parent, Some(2));
        let LinkKind::Vlan(v) = decoded.link.kind else {
            panic!("not a vlan");
        };
        assert_eq!((v.id, v.protocol), (100, VlanProtocol::Dot1Ad));
    }

    #[test]
    fn test_gre_keys_and_parent() {
        let t = TunnelInfo {
            remote: Some("192.0.2.1".parse().unwrap()),
            ikey: 5,
            ttl: 64,
            ..Default::default()
        };
        let link = Link {
            kind: LinkKind::Gre(t),
            ..Link::named("gre1")
        };
        let mut b = ack_request(msg_type::RTM_NEWLINK, 0);
        encode_add(&mut b, &link, Some(7));
        let decoded = decode(&payload(b)).unwrap();
        assert_eq!(decoded.parent, Some(7));
        let tunnel = decoded.link.kind.tunnel().unwrap();
        assert_eq!(tunnel.remote, Some("192.0.2.1".parse().unwrap()));
        assert_eq!((tunnel.ikey, tunnel.okey, tunnel.ttl), (5, 0, 64));
        let mut kind = decoded.link.kind.clone();
        set_parent_name(&mut kind, "eth0".into());
        assert_eq!(parent_name(&kind), Some("eth0"));
    }

    #[test]
    fn test_change_sets_flag_mask() {
        let mut b = ack_request(msg_type::RTM_NEWLINK, 0);
        encode_change(&mut b, 4, &LinkChange::Arp(false), ChangeRefs::default());
        let p = payload(b);
        let hdr: IfInfoMsg = read_header(&p).unwrap();
        assert_eq!(hdr.ifi_index, 4);
        assert_eq!((hdr.ifi_flags, hdr.ifi_change), (iff::NOARP, iff::NOARP));

        let mut b = ack_request(msg_type::RTM_NEWLINK, 0);
        encode_change(&mut b, 4, &LinkChange::Down, ChangeRefs::default());
        let hdr: IfInfoMsg = read_header(&payload(b)).unwrap();
        assert_eq!((hdr.ifi_flags, hdr.ifi_change), (0, iff::UP));
    }

    #[test]
    fn test_master_change() {
        let mut b = ack_request(msg_type::RTM_NEWLINK, 0);
        let refs = ChangeRefs {
            master: Some(9),
            ..Default::default()
        };
        encode_change(&mut b, 4, &LinkChange::Master("br0".into()), refs);
        let p = payload(b);
        let found = attrs(&p[IfInfoMsg::SIZE..]);
        assert_eq!(found[0].0, ifla::MASTER);
        assert_eq!(get::u32(found[0].1).unwrap(), 9);
    }
}
