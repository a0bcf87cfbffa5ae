//! Symbolic names for scopes, protocols, route types, tables and NUD states.
//!
//! Lookups by name accept the symbolic form first and fall back to a raw
//! number. Rendering prints the symbolic form unless numeric output is
//! requested; codes without a name render as `UNKNOWN`.

use crate::types::neigh::nud;
use crate::types::route::{RT_TABLE_DEFAULT, RT_TABLE_LOCAL, RT_TABLE_MAIN, RT_TABLE_UNSPEC, rtn};

pub const UNKNOWN: &str = "UNKNOWN";

pub mod scope {
    pub const UNIVERSE: u8 = 0;
    pub const SITE: u8 = 200;
    pub const LINK: u8 = 253;
    pub const HOST: u8 = 254;
    pub const NOWHERE: u8 = 255;
}

const SCOPES: &[(u8, &str)] = &[
    (scope::UNIVERSE, "global"),
    (scope::SITE, "site"),
    (scope::LINK, "link"),
    (scope::HOST, "host"),
    (scope::NOWHERE, "nowhere"),
];

const PROTOCOLS: &[(u8, &str)] = &[
    (0, "unspec"),
    (1, "redirect"),
    (2, "kernel"),
    (3, "boot"),
    (4, "static"),
    (8, "gated"),
    (9, "ra"),
    (10, "mrt"),
    (11, "zebra"),
    (12, "bird"),
    (13, "dnrouted"),
    (14, "xorp"),
    (15, "ntk"),
    (16, "dhcp"),
    (17, "mrouted"),
    (42, "babel"),
    (186, "bgp"),
    (187, "isis"),
    (188, "ospf"),
    (189, "rip"),
    (192, "eigrp"),
];

const ROUTE_TYPES: &[(u8, &str)] = &[
    (rtn::UNICAST, "unicast"),
    (rtn::LOCAL, "local"),
    (rtn::BROADCAST, "broadcast"),
    (rtn::ANYCAST, "anycast"),
    (rtn::MULTICAST, "multicast"),
    (rtn::BLACKHOLE, "blackhole"),
    (rtn::UNREACHABLE, "unreachable"),
    (rtn::PROHIBIT, "prohibit"),
    (rtn::THROW, "throw"),
    (rtn::NAT, "nat"),
];

const TABLES: &[(u32, &str)] = &[
    (RT_TABLE_UNSPEC, "unspec"),
    (RT_TABLE_DEFAULT, "default"),
    (RT_TABLE_MAIN, "main"),
    (RT_TABLE_LOCAL, "local"),
];

const NUD_STATES: &[(u16, &str)] = &[
    (nud::NONE, "none"),
    (nud::INCOMPLETE, "incomplete"),
    (nud::REACHABLE, "reachable"),
    (nud::STALE, "stale"),
    (nud::DELAY, "delay"),
    (nud::PROBE, "probe"),
    (nud::FAILED, "failed"),
    (nud::NOARP, "noarp"),
    (nud::PERMANENT, "permanent"),
];

fn name_of<T: PartialEq + Copy>(table: &[(T, &'static str)], v: T) -> Option<&'static str> {
    table.iter().find(|(n, _)| *n == v).map(|(_, s)| *s)
}

fn value_of<T: Copy>(table: &[(T, &'static str)], s: &str) -> Option<T> {
    table.iter().find(|(_, n)| *n == s).map(|(v, _)| *v)
}

fn render<T: PartialEq + Copy + ToString>(
    table: &[(T, &'static str)],
    v: T,
    numeric: bool,
) -> String {
    if numeric {
        return v.to_string();
    }
    name_of(table, v).unwrap_or(UNKNOWN).to_string()
}

pub fn scope_name(v: u8, numeric: bool) -> String {
    render(SCOPES, v, numeric)
}

/// Scope as route JSON spells it: the zero scope is `universe`.
pub fn route_scope_name(v: u8, numeric: bool) -> String {
    if !numeric && v == scope::UNIVERSE {
        return "universe".to_string();
    }
    scope_name(v, numeric)
}

/// `host`, `link`, `global`, ... or a number.
pub fn scope_from_str(s: &str) -> Option<u8> {
    value_of(SCOPES, s)
        .or_else(|| (s == "universe").then_some(scope::UNIVERSE))
        .or_else(|| s.parse().ok())
}

pub fn protocol_name(v: u8, numeric: bool) -> String {
    render(PROTOCOLS, v, numeric)
}

pub fn protocol_from_str(s: &str) -> Option<u8> {
    value_of(PROTOCOLS, s).or_else(|| s.parse().ok())
}

/// Route type name; type codes outside the table are `unknown`.
pub fn route_type_name(v: u8) -> &'static str {
    name_of(ROUTE_TYPES, v).unwrap_or("unknown")
}

pub fn route_type_from_str(s: &str) -> Option<u8> {
    value_of(ROUTE_TYPES, s)
}

/// The route type keywords, in the order the grammar lists them.
pub fn route_type_names() -> Vec<&'static str> {
    ROUTE_TYPES.iter().map(|(_, n)| *n).collect()
}

pub fn table_name(v: u32, numeric: bool) -> String {
    if numeric {
        return v.to_string();
    }
    name_of(TABLES, v)
        .map(str::to_string)
        .unwrap_or_else(|| v.to_string())
}

pub fn table_from_str(s: &str) -> Option<u32> {
    value_of(TABLES, s).or_else(|| s.parse().ok())
}

/// Upper-case NUD state name, as neighbour listings print it.
pub fn nud_name(state: u16) -> String {
    name_of(NUD_STATES, state)
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// A NUD state by (case-insensitive) name, or a number equal to a defined state.
pub fn nud_from_str(s: &str) -> Option<u16> {
    let lower = s.to_ascii_lowercase();
    if let Some(v) = value_of(NUD_STATES, &lower) {
        return Some(v);
    }
    let n: u16 = s.parse().ok()?;
    name_of(NUD_STATES, n).map(|_| n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_names() {
        assert_eq!(scope_name(254, false), "host");
        assert_eq!(scope_name(254, true), "254");
        assert_eq!(scope_name(7, false), UNKNOWN);
        assert_eq!(route_scope_name(0, false), "universe");
        assert_eq!(route_scope_name(0, true), "0");
        assert_eq!(scope_from_str("link"), Some(253));
        assert_eq!(scope_from_str("42"), Some(42));
        assert_eq!(scope_from_str("lunar"), None);
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(protocol_name(2, false), "kernel");
        assert_eq!(protocol_name(186, false), "bgp");
        assert_eq!(protocol_name(2, true), "2");
        assert_eq!(protocol_name(99, false), UNKNOWN);
        assert_eq!(protocol_from_str("static"), Some(4));
        assert_eq!(protocol_from_str("77"), Some(77));
    }

    #[test]
    fn test_route_types() {
        assert_eq!(route_type_name(rtn::BLACKHOLE), "blackhole");
        assert_eq!(route_type_name(99), "unknown");
        assert_eq!(route_type_from_str("nat"), Some(rtn::NAT));
        assert_eq!(route_type_names().len(), 10);
    }

    #[test]
    fn test_tables() {
        assert_eq!(table_from_str("main"), Some(254));
        assert_eq!(table_from_str("100"), Some(100));
        assert_eq!(table_name(255, false), "local");
        assert_eq!(table_name(100, false), "100");
    }

    #[test]
    fn test_nud_names() {
        let cases = [
            (nud::INCOMPLETE, "INCOMPLETE"),
            (nud::REACHABLE, "REACHABLE"),
            (nud::STALE, "STALE"),
            (nud::DELAY, "DELAY"),
            (nud::PROBE, "PROBE"),
            (nud::FAILED, "FAILED"),
            (nud::NOARP, "NOARP"),
            (nud::PERMANENT, "PERMANENT"),
            (nud::NONE, "NONE"),
        ];
        for (state, name) in cases {
            assert_eq!(nud_name(state), name);
        }
        assert_eq!(nud_name(0x03), UNKNOWN);
    }

    #[test]
    fn test_nud_from_str() {
        assert_eq!(nud_from_str("PeRmAnEnT"), Some(nud::PERMANENT));
        assert_eq!(nud_from_str("2"), Some(nud::REACHABLE));
        assert_eq!(nud_from_str("0"), Some(nud::NONE));
        for bad in ["unknown", "-1", "3", "", "abc"] {
            assert_eq!(nud_from_str(bad), None, "{bad}");
        }
    }
}
