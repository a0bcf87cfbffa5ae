//! Route rendering for `ip route show`.

use std::io::Write;

use serde_json::{Value, json};

use crate::names;
use crate::output::{OutputOptions, Printable};
use crate::types::route::rtnh;
use crate::types::Route;

const NH_FLAGS: &[(u32, &str)] = &[
    (rtnh::DEAD, "dead"),
    (rtnh::PERVASIVE, "pervasive"),
    (rtnh::ONLINK, "onlink"),
    (rtnh::OFFLOAD, "offload"),
    (rtnh::LINKDOWN, "linkdown"),
];

fn flag_words(flags: u32) -> Vec<&'static str> {
    NH_FLAGS
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, w)| *w)
        .collect()
}

impl Printable for Route {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        if opts.details {
            write!(w, "{} ", names::route_type_name(self.kind))?;
        }
        let dev = self.dev.as_deref().unwrap_or_default();
        let proto = names::protocol_name(self.protocol, opts.numeric);
        let metric = self.metric.unwrap_or(0);
        let is_default = self.dst.is_none_or(|d| d.is_default());

        write!(w, "{}", self.destination())?;
        if self.is_multipath() {
            write!(w, " proto {proto}")?;
            if !self.is_ipv6() {
                write!(w, " scope {}", names::scope_name(self.scope, opts.numeric))?;
            }
            writeln!(w, " metric {metric}")?;
            for hop in self.next_hops.iter().filter(|h| !h.is_empty()) {
                write!(w, "\tnexthop")?;
                if let Some(gw) = &hop.gateway {
                    write!(w, " via {gw}")?;
                }
                if let Some(dev) = &hop.dev {
                    write!(w, " dev {dev}")?;
                }
                write!(w, " weight {}", hop.weight.max(1))?;
                for word in flag_words(hop.flags) {
                    write!(w, " {word}")?;
                }
                writeln!(w)?;
            }
            return Ok(());
        }

        if let Some(gw) = &self.gateway {
            write!(w, " via {gw}")?;
        }
        write!(w, " dev {dev} proto {proto}")?;
        if !is_default && !self.is_ipv6() {
            write!(w, " scope {}", names::scope_name(self.scope, opts.numeric))?;
            if let Some(src) = &self.prefsrc {
                write!(w, " src {src}")?;
            }
        }
        writeln!(w, " metric {metric}")
    }

    fn to_json(&self, opts: &OutputOptions) -> Value {
        let mut obj = json!({ "dst": self.destination() });
        if opts.details {
            obj["type"] = json!(names::route_type_name(self.kind));
        }
        if let Some(gw) = &self.gateway {
            obj["gateway"] = json!(gw.to_string());
        }
        obj["dev"] = json!(self.dev.as_deref().unwrap_or_default());
        obj["protocol"] = json!(names::protocol_name(self.protocol, opts.numeric));
        obj["scope"] = json!(names::route_scope_name(self.scope, opts.numeric));
        obj["prefsrc"] = json!(self.prefsrc.map(|a| a.to_string()).unwrap_or_default());
        if let Some(metric) = self.metric.filter(|m| *m != 0) {
            obj["metric"] = json!(metric);
        }
        let flags = flag_words(self.flags);
        if !flags.is_empty() {
            obj["flags"] = json!(flags);
        }
        if self.is_multipath() {
            let hops: Vec<Value> = self
                .next_hops
                .iter()
                .filter(|h| !h.is_empty())
                .map(|h| {
                    json!({
                        "gateway": h.gateway.map(|g| g.to_string()),
                        "dev": h.dev,
                        "weight": h.weight.max(1),
                        "flags": flag_words(h.flags),
                    })
                })
                .collect();
            obj["nexthops"] = Value::Array(hops);
        }
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::scope;
    use crate::output::print_all;
    use crate::types::NextHop;

    fn render(routes: &[Route], opts: OutputOptions) -> String {
        let mut out = Vec::new();
        print_all(&mut out, routes, &opts).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn default_via(gw: &str, dev: &str, proto: u8, metric: u32) -> Route {
        Route {
            gateway: Some(gw.parse().unwrap()),
            dev: Some(dev.into()),
            protocol: proto,
            metric: Some(metric),
            ..Default::default()
        }
    }

    fn host_route() -> Route {
        Route {
            dst: Some("192.0.0.0/24".parse().unwrap()),
            dev: Some("eth0".into()),
            protocol: 1,
            scope: scope::HOST,
            prefsrc: Some("127.0.0.1".parse().unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_routes() {
        let r = default_via("192.168.1.1", "eth0", 1, 100);
        assert_eq!(
            render(&[r.clone()], OutputOptions::default()),
            "default via 192.168.1.1 dev eth0 proto redirect metric 100\n"
        );
        let numeric = OutputOptions {
            numeric: true,
            ..Default::default()
        };
        let r2 = default_via("192.168.1.1", "eth1", 2, 200);
        assert_eq!(
            render(&[r2], numeric),
            "default via 192.168.1.1 dev eth1 proto 2 metric 200\n"
        );
        let details = OutputOptions {
            details: true,
            ..Default::default()
        };
        let r3 = default_via("192.168.1.1", "eth2", 1, 300);
        assert_eq!(
            render(&[r3], details),
            "unicast default via 192.168.1.1 dev eth2 proto redirect metric 300\n"
        );
    }

    #[test]
    fn test_ipv4_route() {
        assert_eq!(
            render(&[host_route()], OutputOptions::default()),
            "192.0.0.0/24 dev eth0 proto redirect scope host src 127.0.0.1 metric 0\n"
        );
        let numeric = OutputOptions {
            numeric: true,
            ..Default::default()
        };
        assert_eq!(
            render(&[host_route()], numeric),
            "192.0.0.0/24 dev eth0 proto 1 scope 254 src 127.0.0.1 metric 0\n"
        );
    }

    #[test]
    fn test_ipv6_routes() {
        let mut r = Route {
            dst: Some("2001:db8::/64".parse().unwrap()),
            dev: Some("eth1".into()),
            ..Default::default()
        };
        assert_eq!(
            render(&[r.clone()], OutputOptions::default()),
            "2001:db8::/64 dev eth1 proto unspec metric 0\n"
        );
        r.gateway = Some("::1".parse().unwrap());
        assert_eq!(
            render(&[r], OutputOptions::default()),
            "2001:db8::/64 via ::1 dev eth1 proto unspec metric 0\n"
        );
    }

    #[test]
    fn test_multipath() {
        let r = Route {
            dst: Some("10.0.0.0/8".parse().unwrap()),
            protocol: 4,
            next_hops: vec![
                NextHop {
                    gateway: Some("192.168.1.1".parse().unwrap()),
                    dev: Some("eth0".into()),
                    weight: 1,
                    flags: 0,
                },
                NextHop {
                    gateway: Some("192.168.2.1".parse().unwrap()),
                    dev: Some("eth1".into()),
                    weight: 2,
                    flags: rtnh::ONLINK,
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            render(&[r], OutputOptions::default()),
            "10.0.0.0/8 proto static scope global metric 0\n\tnexthop via 192.168.1.1 dev eth0 weight 1\n\tnexthop via 192.168.2.1 dev eth1 weight 2 onlink\n"
        );
    }

    #[test]
    fn test_json() {
        let r = Route {
            dst: Some("192.168.1.0/24".parse().unwrap()),
            dev: Some("eth0".into()),
            protocol: 2,
            scope: scope::UNIVERSE,
            prefsrc: Some("127.0.0.3".parse().unwrap()),
            flags: rtnh::ONLINK,
            ..Default::default()
        };
        let json = OutputOptions {
            json: true,
            ..Default::default()
        };
        assert_eq!(
            render(&[r.clone()], json),
            "[{\"dst\":\"192.168.1.0/24\",\"dev\":\"eth0\",\"protocol\":\"kernel\",\"scope\":\"universe\",\"prefsrc\":\"127.0.0.3\",\"flags\":[\"onlink\"]}]\n"
        );
        assert_eq!(
            render(&[r], OutputOptions::default()),
            "192.168.1.0/24 dev eth0 proto kernel scope global src 127.0.0.3 metric 0\n"
        );

        let bare = Route {
            dst: Some("192.168.1.0/24".parse().unwrap()),
            dev: Some("eth0".into()),
            protocol: 2,
            ..Default::default()
        };
        let numeric = OutputOptions {
            json: true,
            numeric: true,
            ..Default::default()
        };
        assert_eq!(
            render(&[bare], numeric),
            "[{\"dst\":\"192.168.1.0/24\",\"dev\":\"eth0\",\"protocol\":\"2\",\"scope\":\"0\",\"prefsrc\":\"\"}]\n"
        );
    }
}
