//! Listing filters.
//!
//! Each filter is a plain record of optional criteria; an unset criterion
//! matches everything. Callers chain them explicitly.

use std::cmp::Ordering;
use std::net::IpAddr;

use crate::types::neigh::nud;
use crate::types::route::RT_TABLE_UNSPEC;
use crate::types::{Address, IpNet, Link, Neighbor, Route, TunnelParams};

/// Bits of [`RouteFilter::mask`], one per selector part.
pub mod route_mask {
    pub const TYPE: u32 = 1 << 0;
    pub const SCOPE: u32 = 1 << 1;
    pub const TABLE: u32 = 1 << 2;
    pub const PROTOCOL: u32 = 1 << 3;
    pub const DST: u32 = 1 << 4;
}

/// How `root`/`match`/`exact` compare a route destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DstMatch {
    /// Destination lies inside the prefix.
    Root(IpNet),
    /// Destination covers the prefix.
    Match(IpNet),
    /// Destination is exactly the prefix.
    Exact(IpNet),
}

impl DstMatch {
    fn matches(&self, dst: Option<&IpNet>) -> bool {
        let default = |net: &IpNet| {
            IpNet::new(
                if net.is_ipv4() {
                    IpAddr::from([0u8; 4])
                } else {
                    IpAddr::from([0u8; 16])
                },
                0,
            )
        };
        match self {
            Self::Root(p) => dst.is_some_and(|d| p.contains_net(d)),
            Self::Match(p) => {
                let d = dst.copied().or_else(|| default(p));
                d.is_some_and(|d| d.contains_net(p))
            }
            Self::Exact(p) => {
                let d = dst.copied().or_else(|| default(p));
                d.is_some_and(|d| d.network() == p.network())
            }
        }
    }
}

/// `ip route show` selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteFilter {
    pub kind: u8,
    pub scope: u8,
    /// `RT_TABLE_UNSPEC` with the table bit set selects every table.
    pub table: u32,
    pub protocol: u8,
    pub dst: Option<DstMatch>,
    /// Which fields are compared.
    pub mask: u32,
}

impl RouteFilter {
    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    pub fn matches(&self, r: &Route) -> bool {
        let on = |bit| self.mask & bit != 0;
        (!on(route_mask::TYPE) || r.kind == self.kind)
            && (!on(route_mask::SCOPE) || r.scope == self.scope)
            && (!on(route_mask::TABLE) || self.table == RT_TABLE_UNSPEC || r.table == self.table)
            && (!on(route_mask::PROTOCOL) || r.protocol == self.protocol)
            && (!on(route_mask::DST) || self.dst.is_none_or(|m| m.matches(r.dst.as_ref())))
    }
}

/// `ip link show` selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFilter {
    pub name: Option<String>,
    /// Link kinds; empty means any.
    pub kinds: Vec<String>,
}

impl LinkFilter {
    pub fn matches(&self, link: &Link) -> bool {
        self.name.as_ref().is_none_or(|n| *n == link.name)
            && (self.kinds.is_empty() || self.kinds.iter().any(|k| k == link.kind.name()))
    }
}

/// `ip address show|flush` selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressFilter {
    pub dev: Option<String>,
    pub scope: Option<u8>,
    pub to: Option<IpNet>,
    /// Glob over the address label; `*` matches any run.
    pub label: Option<String>,
    pub up: bool,
    /// `Some(true)` for `permanent`, `Some(false)` for `dynamic`.
    pub permanent: Option<bool>,
    pub kinds: Vec<String>,
}

impl AddressFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether any criterion looks at the addresses themselves.
    pub fn selects_addresses(&self) -> bool {
        self.scope.is_some() || self.to.is_some() || self.label.is_some() || self.permanent.is_some()
    }

    pub fn matches_link(&self, link: &Link) -> bool {
        self.dev.as_ref().is_none_or(|d| *d == link.name)
            && (!self.up || link.is_up())
            && (self.kinds.is_empty() || self.kinds.iter().any(|k| k == link.kind.name()))
    }

    pub fn matches(&self, a: &Address) -> bool {
        self.scope.is_none_or(|s| s == a.scope)
            && self.to.is_none_or(|p| p.contains(&a.local.addr()))
            && self
                .label
                .as_ref()
                .is_none_or(|pat| glob(pat, a.label.as_deref().unwrap_or(&a.dev)))
            && self.permanent.is_none_or(|p| p == a.is_permanent())
    }
}

/// Shell-style match supporting only `*`.
fn glob(pattern: &str, s: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == s,
        Some((head, rest)) => {
            let Some(tail) = s.strip_prefix(head) else {
                return false;
            };
            (0..=tail.len()).any(|i| tail.is_char_boundary(i) && glob(rest, &tail[i..]))
        }
    }
}

/// `ip neigh show` selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighFilter {
    pub addr: Option<IpAddr>,
    pub subnet: Option<IpNet>,
    pub dev: Option<String>,
    /// `None` is any state.
    pub state: Option<u16>,
    pub proxy: bool,
}

impl NeighFilter {
    pub fn matches(&self, n: &Neighbor) -> bool {
        self.addr.is_none_or(|a| a == n.dst)
            && self.subnet.is_none_or(|s| s.contains(&n.dst))
            && self.dev.as_ref().is_none_or(|d| *d == n.dev)
            && self.state.is_none_or(|s| s == n.state)
            && (!self.proxy || n.is_proxy())
    }

    /// Entries `neigh show` prints: NOARP entries hidden, the rest
    /// filtered and ordered by link index, then address.
    pub fn apply(&self, neighs: Vec<Neighbor>) -> Vec<Neighbor> {
        let mut kept: Vec<Neighbor> = neighs
            .into_iter()
            .filter(|n| n.state != nud::NOARP && self.matches(n))
            .collect();
        kept.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| cmp_ip(&a.dst, &b.dst)));
        kept
    }
}

/// IPv4 before IPv6, then numerically.
fn cmp_ip(a: &IpAddr, b: &IpAddr) -> Ordering {
    match (a, b) {
        (IpAddr::V4(_), IpAddr::V6(_)) => Ordering::Less,
        (IpAddr::V6(_), IpAddr::V4(_)) => Ordering::Greater,
        _ => a.cmp(b),
    }
}

/// Whether `link` is one of the tunnels `p` selects.
pub fn tunnel_matches(link: &Link, p: &TunnelParams) -> bool {
    let kind = link.kind.name();
    let kinds: &[&str] = if p.kinds.is_empty() {
        crate::types::tunnel::TUNNEL_KINDS
    } else {
        &p.kinds
    };
    if !kinds.contains(&kind) {
        return false;
    }
    let Some(info) = link.kind.tunnel() else {
        return false;
    };
    let vti = matches!(kind, "vti" | "vti6");
    let keyed = matches!(kind, "gre" | "ip6gre" | "vti" | "vti6");
    let same = |want: Option<IpAddr>, have: Option<IpAddr>| {
        want.is_none_or(|w| have.is_some_and(|h| h == w))
    };

    p.name.as_ref().is_none_or(|n| *n == link.name)
        && p.dev.as_ref().is_none_or(|d| info.dev.as_ref() == Some(d))
        && same(p.remote, info.remote)
        && same(p.local, info.local)
        && (vti || p.ttl == -1 || p.ttl == 0 || p.ttl == 255 || p.ttl == i32::from(info.ttl))
        && (vti || p.tos == -1 || p.tos == i32::from(info.tos))
        && (!keyed || p.ikey == -1 || p.ikey as u32 == info.ikey)
        && (!keyed || p.okey == -1 || p.okey as u32 == info.okey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::link::TunnelInfo;
    use crate::types::LinkKind;

    fn route(dst: Option<&str>, table: u32) -> Route {
        Route {
            dst: dst.map(|d| d.parse().unwrap()),
            table,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_route_filter_is_identity() {
        let f = RouteFilter::default();
        let routes = vec![route(None, 254), route(Some("10.0.0.0/8"), 100)];
        let once: Vec<_> = routes.iter().filter(|r| f.matches(r)).cloned().collect();
        let twice: Vec<_> = once.iter().filter(|r| f.matches(r)).cloned().collect();
        assert_eq!(once, routes);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_route_table_and_prefix() {
        let f = RouteFilter {
            table: 100,
            mask: route_mask::TABLE,
            ..Default::default()
        };
        assert!(f.matches(&route(Some("10.0.0.0/8"), 100)));
        assert!(!f.matches(&route(Some("10.0.0.0/8"), 254)));

        let root = RouteFilter {
            dst: Some(DstMatch::Root("10.0.0.0/8".parse().unwrap())),
            mask: route_mask::DST,
            ..Default::default()
        };
        assert!(root.matches(&route(Some("10.1.0.0/16"), 254)));
        assert!(!root.matches(&route(Some("192.168.0.0/16"), 254)));
        assert!(!root.matches(&route(None, 254)));

        let m = RouteFilter {
            dst: Some(DstMatch::Match("10.1.2.0/24".parse().unwrap())),
            mask: route_mask::DST,
            ..Default::default()
        };
        assert!(m.matches(&route(Some("10.0.0.0/8"), 254)));
        assert!(m.matches(&route(None, 254)));

        let exact = RouteFilter {
            dst: Some(DstMatch::Exact("10.0.0.0/8".parse().unwrap())),
            mask: route_mask::DST,
            ..Default::default()
        };
        assert!(exact.matches(&route(Some("10.0.0.0/8"), 254)));
        assert!(!exact.matches(&route(Some("10.0.0.0/16"), 254)));
    }

    #[test]
    fn test_link_filter() {
        let dummy = Link {
            name: "d0".into(),
            kind: LinkKind::Dummy,
            ..Default::default()
        };
        let f = LinkFilter {
            kinds: vec!["dummy".into(), "veth".into()],
            ..Default::default()
        };
        assert!(f.matches(&dummy));
        assert!(LinkFilter::default().matches(&dummy));
        let named = LinkFilter {
            name: Some("eth0".into()),
            ..Default::default()
        };
        assert!(!named.matches(&dummy));
    }

    #[test]
    fn test_address_filter() {
        let mut a = Address::new("10.1.2.3/24".parse().unwrap(), "eth0");
        a.label = Some("eth0:1".into());
        a.scope = 253;
        let f = AddressFilter {
            label: Some("eth0:*".into()),
            to: Some("10.1.0.0/16".parse().unwrap()),
            ..Default::default()
        };
        assert!(f.selects_addresses());
        assert!(f.matches(&a));
        let host = AddressFilter {
            scope: Some(254),
            ..Default::default()
        };
        assert!(!host.matches(&a));
        let dynamic = AddressFilter {
            permanent: Some(false),
            ..Default::default()
        };
        assert!(dynamic.matches(&a));
        assert!(glob("*", ""));
        assert!(!glob("eth*1", "eth0:2"));
    }

    fn neigh(ip: &str, index: u32, state: u16) -> Neighbor {
        let mut n = Neighbor::new(ip.parse().unwrap(), format!("eth{index}"));
        n.index = index;
        n.state = state;
        n
    }

    #[test]
    fn test_neigh_filter_hides_noarp_and_sorts() {
        let list = vec![
            neigh("fe80::1", 1, nud::REACHABLE),
            neigh("192.168.1.3", 2, nud::STALE),
            neigh("192.168.1.1", 1, nud::NOARP),
            neigh("192.168.1.2", 1, nud::REACHABLE),
        ];
        let shown = NeighFilter::default().apply(list.clone());
        let ips: Vec<String> = shown.iter().map(|n| n.dst.to_string()).collect();
        assert_eq!(ips, ["192.168.1.2", "fe80::1", "192.168.1.3"]);

        let subnet = NeighFilter {
            subnet: Some("192.168.1.0/24".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(subnet.apply(list.clone()).len(), 2);
        let none = NeighFilter {
            subnet: Some("10.0.0.0/8".parse().unwrap()),
            ..Default::default()
        };
        assert!(none.apply(list).is_empty());
    }

    fn gre(name: &str, remote: &str, ttl: u8) -> Link {
        Link {
            name: name.into(),
            kind: LinkKind::Gre(TunnelInfo {
                remote: Some(remote.parse().unwrap()),
                ttl,
                ikey: 5,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_tunnel_matching() {
        let t = gre("gre1", "10.0.0.1", 64);
        assert!(tunnel_matches(&t, &TunnelParams::default()));

        let by_remote = TunnelParams {
            remote: Some("10.0.0.2".parse().unwrap()),
            ..Default::default()
        };
        assert!(!tunnel_matches(&t, &by_remote));

        let inherit = TunnelParams {
            ttl: 0,
            ..Default::default()
        };
        assert!(tunnel_matches(&t, &inherit));
        let ttl = TunnelParams {
            ttl: 32,
            ..Default::default()
        };
        assert!(!tunnel_matches(&t, &ttl));

        let key = TunnelParams {
            ikey: 6,
            ..Default::default()
        };
        assert!(!tunnel_matches(&t, &key));

        let sit_only = TunnelParams {
            kinds: vec!["sit"],
            ..Default::default()
        };
        assert!(!tunnel_matches(&t, &sit_only));

        let vti = Link {
            name: "vti1".into(),
            kind: LinkKind::Vti(TunnelInfo::default()),
            ..Default::default()
        };
        assert!(tunnel_matches(&vti, &ttl));

        let dummy = Link {
            kind: LinkKind::Dummy,
            ..Default::default()
        };
        assert!(!tunnel_matches(&dummy, &TunnelParams::default()));
    }
}
