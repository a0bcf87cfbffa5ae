//! Routing table entries.

use std::net::IpAddr;

use super::{AF_INET, AF_INET6, IpNet, family_of};

/// Route types (`RTN_*`).
pub mod rtn {
    pub const UNSPEC: u8 = 0;
    pub const UNICAST: u8 = 1;
    pub const LOCAL: u8 = 2;
    pub const BROADCAST: u8 = 3;
    pub const ANYCAST: u8 = 4;
    pub const MULTICAST: u8 = 5;
    pub const BLACKHOLE: u8 = 6;
    pub const UNREACHABLE: u8 = 7;
    pub const PROHIBIT: u8 = 8;
    pub const THROW: u8 = 9;
    pub const NAT: u8 = 10;
}

/// Next-hop flags (`RTNH_F_*`).
pub mod rtnh {
    pub const DEAD: u32 = 1;
    pub const PERVASIVE: u32 = 2;
    pub const ONLINK: u32 = 4;
    pub const OFFLOAD: u32 = 8;
    pub const LINKDOWN: u32 = 16;
}

/// Well-known table IDs.
pub const RT_TABLE_UNSPEC: u32 = 0;
pub const RT_TABLE_DEFAULT: u32 = 253;
pub const RT_TABLE_MAIN: u32 = 254;
pub const RT_TABLE_LOCAL: u32 = 255;

/// One leg of a (possibly multipath) route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NextHop {
    pub gateway: Option<IpAddr>,
    pub dev: Option<String>,
    /// Relative weight, 1..=256.
    pub weight: u16,
    pub flags: u32,
}

impl NextHop {
    /// A leg with neither a gateway nor a device.
    pub fn is_empty(&self) -> bool {
        self.gateway.is_none() && self.dev.is_none()
    }
}

/// Per-route TCP metrics (`RTAX_*`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMetrics {
    pub mtu: Option<u32>,
    pub advmss: Option<u32>,
    pub rtt: Option<u32>,
    pub rttvar: Option<u32>,
    pub reordering: Option<u32>,
    pub window: Option<u32>,
    pub cwnd: Option<u32>,
    pub initcwnd: Option<u32>,
    pub ssthresh: Option<u32>,
    pub rto_min: Option<u32>,
    pub hoplimit: Option<u32>,
    pub initrwnd: Option<u32>,
    pub features: Option<u32>,
    pub quickack: Option<u32>,
    pub fastopen_no_cookie: Option<u32>,
    pub congctl: Option<String>,
}

impl RouteMetrics {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A route, as requested or as listed.
///
/// `next_hops[0]` mirrors `gateway`/`dev`, so a single-path route has one
/// leg and a multipath route has one leg per path. A route written only
/// with `nexthop` clauses keeps an empty first leg.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub family: u8,
    pub kind: u8,
    /// Destination; `None` is the default route.
    pub dst: Option<IpNet>,
    pub src: Option<IpNet>,
    pub tos: u8,
    pub table: u32,
    pub protocol: u8,
    pub scope: u8,
    pub metric: Option<u32>,
    pub dev: Option<String>,
    pub gateway: Option<IpAddr>,
    pub prefsrc: Option<IpAddr>,
    pub flags: u32,
    pub realms: Option<u32>,
    pub metrics: RouteMetrics,
    pub next_hops: Vec<NextHop>,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            family: 0,
            kind: rtn::UNICAST,
            dst: None,
            src: None,
            tos: 0,
            table: RT_TABLE_MAIN,
            protocol: 0,
            scope: 0,
            metric: None,
            dev: None,
            gateway: None,
            prefsrc: None,
            flags: 0,
            realms: None,
            metrics: RouteMetrics::default(),
            next_hops: Vec::new(),
        }
    }
}

impl Route {
    /// Family derived from the destination, gateway or explicit family.
    pub fn family(&self) -> u8 {
        if let Some(dst) = &self.dst {
            return dst.family();
        }
        if let Some(gw) = &self.gateway {
            return family_of(gw);
        }
        self.family
    }

    pub fn is_ipv6(&self) -> bool {
        self.family() == AF_INET6
    }

    pub fn is_ipv4(&self) -> bool {
        self.family() == AF_INET
    }

    pub fn is_multipath(&self) -> bool {
        self.next_hops.len() > 1
    }

    /// Whether any leg names a gateway or a device.
    pub fn has_path(&self) -> bool {
        self.gateway.is_some() || self.dev.is_some() || self.next_hops.iter().any(|h| !h.is_empty())
    }

    /// Destination string as printed by `ip route`.
    pub fn destination(&self) -> String {
        match &self.dst {
            None => "default".to_string(),
            Some(dst) if dst.is_default() => "default".to_string(),
            Some(dst) if dst.prefix_len() == 32 || dst.prefix_len() == 128 => {
                dst.addr().to_string()
            }
            Some(dst) => dst.to_string(),
        }
    }
}
