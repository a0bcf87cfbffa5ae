//! `RTM_*ROUTE` encoding and decoding.

use std::collections::HashMap;

use super::attr::{attrs, get};
use super::builder::MessageBuilder;
use super::message::{RtMsg, RtNextHop, read_header};
use crate::error::GatewayError;
use crate::gateway::{GatewayResult, RouteGet};
use crate::names::scope;
use crate::types::route::{RT_TABLE_UNSPEC, rtn};
use crate::types::{IpNet, NextHop, Route, RouteMetrics, family_of};

mod rta {
    pub const DST: u16 = 1;
    pub const SRC: u16 = 2;
    pub const IIF: u16 = 3;
    pub const OIF: u16 = 4;
    pub const GATEWAY: u16 = 5;
    pub const PRIORITY: u16 = 6;
    pub const PREFSRC: u16 = 7;
    pub const METRICS: u16 = 8;
    pub const MULTIPATH: u16 = 9;
    pub const FLOW: u16 = 11;
    pub const TABLE: u16 = 15;
}

mod rtax {
    pub const MTU: u16 = 2;
    pub const WINDOW: u16 = 3;
    pub const RTT: u16 = 4;
    pub const RTTVAR: u16 = 5;
    pub const SSTHRESH: u16 = 6;
    pub const CWND: u16 = 7;
    pub const ADVMSS: u16 = 8;
    pub const REORDERING: u16 = 9;
    pub const HOPLIMIT: u16 = 10;
    pub const INITCWND: u16 = 11;
    pub const FEATURES: u16 = 12;
    pub const RTO_MIN: u16 = 13;
    pub const INITRWND: u16 = 14;
    pub const QUICKACK: u16 = 15;
    pub const CC_ALGO: u16 = 16;
    pub const FASTOPEN_NO_COOKIE: u16 = 17;
}

/// Route was cloned from another by the kernel (`RTM_F_CLONED`).
pub const RTM_F_CLONED: u32 = 0x200;

const RTPROT_BOOT: u8 = 3;

/// Decode one route message, naming devices through `names`.
pub fn decode(payload: &[u8], names: &HashMap<u32, String>) -> GatewayResult<Route> {
    let hdr: RtMsg = read_header(payload)?;
    let name = |index: u32| names.get(&index).cloned().or_else(|| (index != 0).then(|| index.to_string()));
    let mut route = Route {
        family: hdr.rtm_family,
        kind: hdr.rtm_type,
        tos: hdr.rtm_tos,
        table: u32::from(hdr.rtm_table),
        protocol: hdr.rtm_protocol,
        scope: hdr.rtm_scope,
        flags: hdr.rtm_flags,
        ..Default::default()
    };
    let prefix = |addr, len: u8| {
        IpNet::new(addr, len).ok_or_else(|| GatewayError::Malformed(format!("prefix length {len} out of range")))
    };

    for (kind, data) in attrs(&payload[RtMsg::SIZE..]) {
        match kind {
            rta::DST => route.dst = Some(prefix(get::ip(data)?, hdr.rtm_dst_len)?),
            rta::SRC => route.src = Some(prefix(get::ip(data)?, hdr.rtm_src_len)?),
            rta::OIF => route.dev = name(get::u32(data)?),
            rta::GATEWAY => route.gateway = Some(get::ip(data)?),
            rta::PRIORITY => route.metric = Some(get::u32(data)?),
            rta::PREFSRC => route.prefsrc = Some(get::ip(data)?),
            rta::FLOW => route.realms = Some(get::u32(data)?),
            rta::TABLE => route.table = get::u32(data)?,
            rta::METRICS => route.metrics = decode_metrics(data)?,
            rta::MULTIPATH => route.next_hops = decode_multipath(data, &name)?,
            _ => {}
        }
    }

    if route.next_hops.is_empty() {
        route.next_hops.push(NextHop {
            gateway: route.gateway,
            dev: route.dev.clone(),
            weight: 1,
            flags: route.flags & 0xff,
        });
    }
    Ok(route)
}

fn decode_metrics(data: &[u8]) -> GatewayResult<RouteMetrics> {
    let mut m = RouteMetrics::default();
    for (kind, value) in attrs(data) {
        if kind == rtax::CC_ALGO {
            m.congctl = Some(get::string(value)?);
            continue;
        }
        let v = Some(get::u32(value)?);
        match kind {
            rtax::MTU => m.mtu = v,
            rtax::WINDOW => m.window = v,
            rtax::RTT => m.rtt = v,
            rtax::RTTVAR => m.rttvar = v,
            rtax::SSTHRESH => m.ssthresh = v,
            rtax::CWND => m.cwnd = v,
            rtax::ADVMSS => m.advmss = v,
            rtax::REORDERING => m.reordering = v,
            rtax::HOPLIMIT => m.hoplimit = v,
            rtax::INITCWND => m.initcwnd = v,
            rtax::FEATURES => m.features = v,
            rtax::RTO_MIN => m.rto_min = v,
            rtax::INITRWND => m.initrwnd = v,
            rtax::QUICKACK => m.quickack = v,
            rtax::FASTOPEN_NO_COOKIE => m.fastopen_no_cookie = v,
            _ => {}
        }
    }
    Ok(m)
}

fn decode_multipath(
    mut data: &[u8],
    name: &impl Fn(u32) -> Option<String>,
) -> GatewayResult<Vec<NextHop>> {
    let mut hops = Vec::new();
    while data.len() >= RtNextHop::SIZE {
        let nh: RtNextHop = read_header(data)?;
        let len = usize::from(nh.rtnh_len);
        if len < RtNextHop::SIZE || len > data.len() {
            return Err(GatewayError::Malformed(format!("bad rtnexthop length {len}")));
        }
        let mut hop = NextHop {
            dev: name(nh.rtnh_ifindex as u32),
            weight: u16::from(nh.rtnh_hops) + 1,
            flags: u32::from(nh.rtnh_flags),
            gateway: None,
        };
        for (kind, value) in attrs(&data[RtNextHop::SIZE..len]) {
            if kind == rta::GATEWAY {
                hop.gateway = Some(get::ip(value)?);
            }
        }
        hops.push(hop);
        data = &data[super::attr::nla_align(len).min(data.len())..];
    }
    Ok(hops)
}

/// Device indexes resolved before a route is encoded.
#[derive(Debug, Clone, Default)]
pub struct RouteRefs {
    /// Index of `route.dev`.
    pub oif: Option<u32>,
    /// Index of each `next_hops[i].dev`.
    pub hops: Vec<Option<u32>>,
}

fn route_scope(route: &Route) -> u8 {
    if route.scope != scope::UNIVERSE {
        return route.scope;
    }
    match route.kind {
        rtn::LOCAL => scope::HOST,
        rtn::BROADCAST | rtn::MULTICAST | rtn::ANYCAST => scope::LINK,
        rtn::UNICAST if route.gateway.is_none() && !route.is_multipath() => scope::LINK,
        _ => scope::UNIVERSE,
    }
}

fn header(route: &Route, scope: u8) -> RtMsg {
    let table = route.table;
    RtMsg {
        rtm_family: route.family(),
        rtm_dst_len: route.dst.map_or(0, |d| d.prefix_len()),
        rtm_src_len: route.src.map_or(0, |s| s.prefix_len()),
        rtm_tos: route.tos,
        rtm_table: if table > 255 { RT_TABLE_UNSPEC as u8 } else { table as u8 },
        rtm_protocol: if route.protocol == 0 { RTPROT_BOOT } else { route.protocol },
        rtm_scope: scope,
        rtm_type: route.kind,
        rtm_flags: route.flags & !0xff,
    }
}

fn encode_common(b: &mut MessageBuilder, route: &Route) {
    if let Some(dst) = &route.dst {
        b.attr_ip(rta::DST, &dst.addr());
    }
    if let Some(src) = &route.src {
        b.attr_ip(rta::SRC, &src.addr());
    }
    b.attr_u32(rta::TABLE, route.table);
    if let Some(metric) = route.metric {
        b.attr_u32(rta::PRIORITY, metric);
    }
}

fn encode_metrics(b: &mut MessageBuilder, m: &RouteMetrics) {
    if m.is_empty() {
        return;
    }
    let nest = b.nest_start(rta::METRICS);
    let values = [
        (rtax::MTU, m.mtu),
        (rtax::WINDOW, m.window),
        (rtax::RTT, m.rtt),
        (rtax::RTTVAR, m.rttvar),
        (rtax::SSTHRESH, m.ssthresh),
        (rtax::CWND, m.cwnd),
        (rtax::ADVMSS, m.advmss),
        (rtax::REORDERING, m.reordering),
        (rtax::HOPLIMIT, m.hoplimit),
        (rtax::INITCWND, m.initcwnd),
        (rtax::FEATURES, m.features),
        (rtax::RTO_MIN, m.rto_min),
        (rtax::INITRWND, m.initrwnd),
        (rtax::QUICKACK, m.quickack),
        (rtax::FASTOPEN_NO_COOKIE, m.fastopen_no_cookie),
    ];
    for (kind, value) in values {
        if let Some(v) = value {
            b.attr_u32(kind, v);
        }
    }
    if let Some(cc) = &m.congctl {
        b.attr_str(rtax::CC_ALGO, cc);
    }
    b.nest_end(nest);
}

fn encode_multipath(b: &mut MessageBuilder, route: &Route, refs: &RouteRefs) {
    let nest = b.nest_start(rta::MULTIPATH);
    for (i, hop) in route.next_hops.iter().enumerate() {
        if hop.is_empty() {
            continue;
        }
        let start = b.len();
        let nh = RtNextHop {
            rtnh_len: 0,
            rtnh_flags: hop.flags as u8,
            rtnh_hops: hop.weight.clamp(1, 256).saturating_sub(1) as u8,
            rtnh_ifindex: refs.hops.get(i).copied().flatten().unwrap_or(0) as i32,
        };
        b.raw(zerocopy::IntoBytes::as_bytes(&nh));
        if let Some(gw) = &hop.gateway {
            b.attr_ip(rta::GATEWAY, gw);
        }
        let len = (b.len() - start) as u16;
        b.patch_u16(start, len);
    }
    b.nest_end(nest);
}

/// Encode an `RTM_NEWROUTE` body.
pub fn encode_add(b: &mut MessageBuilder, route: &Route, refs: &RouteRefs) {
    let mut hdr = header(route, route_scope(route));
    if !route.is_multipath() {
        hdr.rtm_flags |= route.flags & 0xff;
    }
    b.header(&hdr);
    encode_common(b, route);
    if let Some(src) = &route.prefsrc {
        b.attr_ip(rta::PREFSRC, src);
    }
    if let Some(realms) = route.realms {
        b.attr_u32(rta::FLOW, realms);
    }
    encode_metrics(b, &route.metrics);
    if route.is_multipath() {
        encode_multipath(b, route, refs);
    } else {
        if let Some(gw) = &route.gateway {
            b.attr_ip(rta::GATEWAY, gw);
        }
        if let Some(oif) = refs.oif {
            b.attr_u32(rta::OIF, oif);
        }
    }
}

/// Encode an `RTM_DELROUTE` body.
pub fn encode_delete(b: &mut MessageBuilder, route: &Route, refs: &RouteRefs) {
    let scope = if route.scope == scope::UNIVERSE { scope::NOWHERE } else { route.scope };
    let mut hdr = header(route, scope);
    if route.protocol == 0 {
        hdr.rtm_protocol = 0;
    }
    b.header(&hdr);
    encode_common(b, route);
    if let Some(gw) = &route.gateway {
        b.attr_ip(rta::GATEWAY, gw);
    }
    if let Some(oif) = refs.oif {
        b.attr_u32(rta::OIF, oif);
    }
}

/// Indexes resolved for an `ip route get`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetRefs {
    pub iif: Option<u32>,
    pub oif: Option<u32>,
    /// Table of the VRF named by `vrf`.
    pub table: Option<u32>,
}

/// Encode an `RTM_GETROUTE` request for one destination.
pub fn encode_get(b: &mut MessageBuilder, req: &RouteGet, refs: GetRefs) {
    let family = family_of(&req.dst);
    let host = IpNet::host(req.dst).prefix_len();
    let hdr = RtMsg {
        rtm_family: family,
        rtm_dst_len: host,
        rtm_src_len: if req.src.is_some() { host } else { 0 },
        ..Default::default()
    };
    b.header(&hdr);
    b.attr_ip(rta::DST, &req.dst);
    if let Some(src) = &req.src {
        b.attr_ip(rta::SRC, src);
    }
    if let Some(iif) = refs.iif {
        b.attr_u32(rta::IIF, iif);
    }
    if let Some(oif) = refs.oif {
        b.attr_u32(rta::OIF, oif);
    }
    if let Some(table) = refs.table {
        b.attr_u32(rta::TABLE, table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::connection::ack_request;
    use crate::netlink::message::{NLMSG_HDRLEN, msg_type};
    use crate::types::route::{RT_TABLE_MAIN, rtnh};

    fn names() -> HashMap<u32, String> {
        HashMap::from([(2, "eth0".to_string()), (3, "eth1".to_string())])
    }

    fn encode(route: &Route, refs: &RouteRefs) -> Vec<u8> {
        let mut b = ack_request(msg_type::RTM_NEWROUTE, 0);
        encode_add(&mut b, route, refs);
        b.finish()[NLMSG_HDRLEN..].to_vec()
    }

    #[test]
    fn test_single_path() {
        let mut route = Route {
            dst: Some("10.1.0.0/16".parse().unwrap()),
            gateway: Some("10.0.0.1".parse().unwrap()),
            dev: Some("eth0".into()),
            metric: Some(100),
            ..Default::default()
        };
        route.metrics.mtu = Some(1400);
        route.metrics.congctl = Some("bbr".into());
        let refs = RouteRefs {
            oif: Some(2),
            hops: vec![Some(2)],
        };
        let payload = encode(&route, &refs);
        let hdr: RtMsg = read_header(&payload).unwrap();
        assert_eq!(hdr.rtm_protocol, RTPROT_BOOT);
        assert_eq!(hdr.rtm_scope, scope::UNIVERSE);
        assert_eq!(u32::from(hdr.rtm_table), RT_TABLE_MAIN);

        let got = decode(&payload, &names()).unwrap();
        assert_eq!(got.dst, route.dst);
        assert_eq!(got.gateway, route.gateway);
        assert_eq!(got.dev.as_deref(), Some("eth0"));
        assert_eq!(got.metric, Some(100));
        assert_eq!(got.metrics.mtu, Some(1400));
        assert_eq!(got.metrics.congctl.as_deref(), Some("bbr"));
        assert_eq!(got.next_hops.len(), 1);
    }

    #[test]
    fn test_scope_derivation() {
        let link = Route {
            dst: Some("10.0.0.0/24".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(route_scope(&link), scope::LINK);
        let local = Route {
            kind: rtn::LOCAL,
            ..link.clone()
        };
        assert_eq!(route_scope(&local), scope::HOST);
        let blackhole = Route {
            kind: rtn::BLACKHOLE,
            ..link
        };
        assert_eq!(route_scope(&blackhole), scope::UNIVERSE);
    }

    #[test]
    fn test_large_table_uses_attribute() {
        let route = Route {
            dst: Some("10.0.0.0/24".parse().unwrap()),
            table: 1000,
            ..Default::default()
        };
        let payload = encode(&route, &RouteRefs::default());
        let hdr: RtMsg = read_header(&payload).unwrap();
        assert_eq!(u32::from(hdr.rtm_table), RT_TABLE_UNSPEC);
        assert_eq!(decode(&payload, &names()).unwrap().table, 1000);
    }

    #[test]
    fn test_multipath() {
        let route = Route {
            dst: Some("10.9.0.0/16".parse().unwrap()),
            next_hops: vec![
                NextHop {
                    gateway: Some("10.0.0.1".parse().unwrap()),
                    dev: Some("eth0".into()),
                    weight: 1,
                    flags: 0,
                },
                NextHop {
                    gateway: Some("10.0.1.1".parse().unwrap()),
                    dev: Some("eth1".into()),
                    weight: 3,
                    flags: rtnh::ONLINK,
                },
            ],
            ..Default::default()
        };
        let refs = RouteRefs {
            oif: None,
            hops: vec![Some(2), Some(3)],
        };
        let got = decode(&encode(&route, &refs), &names()).unwrap();
        assert_eq!(got.next_hops, route.next_hops);
    }

    #[test]
    fn test_multipath_skips_empty_first_leg() {
        let legs = vec![
            NextHop {
                gateway: Some("10.0.0.1".parse().unwrap()),
                dev: Some("eth0".into()),
                weight: 1,
                flags: 0,
            },
            NextHop {
                gateway: Some("10.0.1.1".parse().unwrap()),
                dev: Some("eth1".into()),
                weight: 2,
                flags: 0,
            },
        ];
        let mut next_hops = vec![NextHop {
            weight: 1,
            ..Default::default()
        }];
        next_hops.extend(legs.clone());
        let route = Route {
            dst: Some("10.9.0.0/16".parse().unwrap()),
            next_hops,
            ..Default::default()
        };
        let refs = RouteRefs {
            oif: None,
            hops: vec![None, Some(2), Some(3)],
        };
        let got = decode(&encode(&route, &refs), &names()).unwrap();
        assert_eq!(got.next_hops, legs);
    }

    #[test]
    fn test_get_request() {
        let mut b = ack_request(msg_type::RTM_GETROUTE, 0);
        let req = RouteGet::new("192.0.2.7".parse().unwrap());
        encode_get(&mut b, &req, GetRefs::default());
        let payload = b.finish()[NLMSG_HDRLEN..].to_vec();
        let hdr: RtMsg = read_header(&payload).unwrap();
        assert_eq!(hdr.rtm_dst_len, 32);
        assert_eq!(attrs(&payload[RtMsg::SIZE..]).len(), 1);
    }
}
