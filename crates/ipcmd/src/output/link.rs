//! Link rendering for `ip link show`.

use std::io::Write;

use serde_json::{Value, json};

use crate::output::{OutputOptions, Printable};
use crate::types::link::{LinkKind, LinkStats};
use crate::types::Link;

/// A link plus the name of its master device, if any.
#[derive(Debug, Clone, Copy)]
pub struct LinkView<'a> {
    pub link: &'a Link,
    pub master: Option<&'a str>,
}

impl<'a> LinkView<'a> {
    pub fn new(link: &'a Link) -> Self {
        Self { link, master: None }
    }

    pub fn with_master(mut self, master: Option<&'a str>) -> Self {
        self.master = master;
        self
    }

    fn mac(&self) -> String {
        self.link
            .address
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    fn group(&self) -> String {
        if self.link.group == 0 {
            "default".to_string()
        } else {
            self.link.group.to_string()
        }
    }

    /// `1: eth0: <UP> mtu 1500 state UP group default` and the link/ line.
    pub(crate) fn write_header<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        let link = self.link;
        write!(
            w,
            "{}: {}: <{}> mtu {}",
            link.index,
            link.name,
            link.flag_names().join(","),
            link.mtu
        )?;
        if let Some(master) = self.master {
            write!(w, " master {master}")?;
        }
        writeln!(w, " state {} group {}", link.oper_state.name(), self.group())?;
        writeln!(w, "    link/{} {}", link.encap, self.mac())?;
        if opts.details
            && let Some(detail) = kind_details(&link.kind)
        {
            writeln!(w, "    {detail}")?;
        }
        if let Some(alias) = &link.alias {
            writeln!(w, "    alias {alias}")?;
        }
        if opts.stats
            && let Some(stats) = &link.stats
        {
            write_stats(w, stats)?;
        }
        Ok(())
    }

    /// The JSON object without `addr_info`.
    pub(crate) fn json_object(&self, opts: &OutputOptions) -> Value {
        let link = self.link;
        let flags: Vec<String> = link
            .flag_names()
            .iter()
            .map(|f| f.to_ascii_lowercase())
            .collect();
        let mut obj = json!({
            "ifindex": link.index,
            "ifname": link.name,
            "flags": flags,
            "mtu": link.mtu,
        });
        if let Some(master) = self.master {
            obj["master"] = json!(master);
        }
        obj["operstate"] = json!(link.oper_state.name().to_ascii_lowercase());
        obj["group"] = json!(self.group());
        obj["txqlen"] = json!(link.txqlen);
        obj["link_type"] = json!(link.kind.name());
        obj["address"] = json!(self.mac());
        if let Some(alias) = &link.alias {
            obj["ifalias"] = json!(alias);
        }
        if opts.details
            && let Some(data) = kind_json(&link.kind)
        {
            obj["linkinfo"] = json!({ "info_kind": link.kind.name(), "info_data": data });
        }
        if opts.stats
            && let Some(stats) = &link.stats
        {
            obj["stats64"] = stats_json(stats);
        }
        obj
    }
}

impl Printable for LinkView<'_> {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        if opts.brief {
            return writeln!(
                w,
                "{:<26}{:<11}{:<20}<{}>",
                self.link.name,
                self.link.oper_state.name().to_ascii_lowercase(),
                self.mac(),
                self.link.flag_names().join(",")
            );
        }
        self.write_header(w, opts)
    }

    fn to_json(&self, opts: &OutputOptions) -> Value {
        self.json_object(opts)
    }
}

fn write_stats<W: Write>(w: &mut W, s: &LinkStats) -> std::io::Result<()> {
    writeln!(
        w,
        "    RX: bytes {} packets {} errors {} dropped {} missed {} mcast {}",
        s.rx_bytes, s.rx_packets, s.rx_errors, s.rx_dropped, s.rx_missed, s.multicast
    )?;
    writeln!(
        w,
        "    TX: bytes {} packets {} errors {} dropped {} carrier {} collsns {}",
        s.tx_bytes, s.tx_packets, s.tx_errors, s.tx_dropped, s.tx_carrier, s.collisions
    )
}

fn stats_json(s: &LinkStats) -> Value {
    json!({
        "rx": {
            "bytes": s.rx_bytes,
            "packets": s.rx_packets,
            "errors": s.rx_errors,
            "dropped": s.rx_dropped,
            "over_errors": s.rx_missed,
            "multicast": s.multicast,
        },
        "tx": {
            "bytes": s.tx_bytes,
            "packets": s.tx_packets,
            "errors": s.tx_errors,
            "dropped": s.tx_dropped,
            "carrier_errors": s.tx_carrier,
            "collisions": s.collisions,
        },
    })
}

fn opt<T: ToString>(key: &str, v: &Option<T>) -> String {
    v.as_ref()
        .map(|v| format!(" {key} {}", v.to_string()))
        .unwrap_or_default()
}

/// The `-d` line describing kind-specific configuration.
fn kind_details(kind: &LinkKind) -> Option<String> {
    let body = match kind {
        LinkKind::Device | LinkKind::Other(_) => return None,
        LinkKind::Dummy | LinkKind::Ifb | LinkKind::Bridge | LinkKind::Tun => String::new(),
        LinkKind::Bond { mode } => format!(" mode {}", mode.name()),
        LinkKind::Vlan(v) => format!(" protocol {} id {}", v.protocol.name(), v.id),
        LinkKind::Macvlan(m) => format!(" mode {}", m.mode.name()),
        LinkKind::Ipvlan(i) | LinkKind::Ipvtap(i) => format!(" mode {}", i.mode.name()),
        LinkKind::Veth(v) => opt("peer", &v.peer),
        LinkKind::Vxlan(v) => format!(
            " id {}{}{}{}{}{}",
            v.vni,
            opt("remote", &v.remote),
            opt("local", &v.local),
            opt("group", &v.group),
            opt("dev", &v.dev),
            opt("dstport", &v.port)
        ),
        LinkKind::Geneve(g) => format!(
            " id {}{}{}",
            g.vni,
            opt("remote", &g.remote),
            opt("dstport", &g.port)
        ),
        LinkKind::Gretap(t)
        | LinkKind::Gre(t)
        | LinkKind::Ip6Gre(t)
        | LinkKind::Ipip(t)
        | LinkKind::Ip6tnl(t)
        | LinkKind::Sit(t)
        | LinkKind::Vti(t)
        | LinkKind::Vti6(t) => format!(
            "{}{} ttl {}",
            opt("remote", &t.remote),
            opt("local", &t.local),
            t.ttl
        ),
        LinkKind::Vrf { table } => format!(" table {table}"),
        LinkKind::Xfrm(x) => format!(" if_id {:#x}", x.if_id),
        LinkKind::Ipoib(i) => format!(" pkey {:#x}", i.pkey),
        LinkKind::Bareudp(b) => format!(" dstport {} ethertype {:#06x}", b.port, b.ethertype),
    };
    Some(format!("{}{}", kind.name(), body))
}

fn kind_json(kind: &LinkKind) -> Option<Value> {
    Some(match kind {
        LinkKind::Device | LinkKind::Other(_) => return None,
        LinkKind::Dummy | LinkKind::Ifb | LinkKind::Bridge | LinkKind::Tun => json!({}),
        LinkKind::Bond { mode } => json!({ "mode": mode.name() }),
        LinkKind::Vlan(v) => json!({ "protocol": v.protocol.name(), "id": v.id }),
        LinkKind::Macvlan(m) => json!({ "mode": m.mode.name() }),
        LinkKind::Ipvlan(i) | LinkKind::Ipvtap(i) => json!({ "mode": i.mode.name() }),
        LinkKind::Veth(v) => json!({ "peer": v.peer }),
        LinkKind::Vxlan(v) => json!({
            "id": v.vni,
            "remote": v.remote.map(|a| a.to_string()),
            "local": v.local.map(|a| a.to_string()),
            "group": v.group.map(|a| a.to_string()),
            "port": v.port,
            "ttl": v.ttl,
        }),
        LinkKind::Geneve(g) => json!({
            "id": g.vni,
            "remote": g.remote.map(|a| a.to_string()),
            "port": g.port,
            "ttl": g.ttl,
        }),
        LinkKind::Gretap(t)
        | LinkKind::Gre(t)
        | LinkKind::Ip6Gre(t)
        | LinkKind::Ipip(t)
        | LinkKind::Ip6tnl(t)
        | LinkKind::Sit(t)
        | LinkKind::Vti(t)
        | LinkKind::Vti6(t) => json!({
            "remote": t.remote.map(|a| a.to_string()),
            "local": t.local.map(|a| a.to_string()),
            "ttl": t.ttl,
            "tos": t.tos,
            "ikey": t.ikey,
            "okey": t.okey,
        }),
        LinkKind::Vrf { table } => json!({ "table": table }),
        LinkKind::Xfrm(x) => json!({ "if_id": x.if_id }),
        LinkKind::Ipoib(i) => json!({ "pkey": i.pkey }),
        LinkKind::Bareudp(b) => json!({ "port": b.port, "ethertype": b.ethertype }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::print_all;
    use crate::types::link::{VlanInfo, iff};
    use crate::types::{HardwareAddr, OperState};

    fn eth0() -> Link {
        Link {
            index: 1,
            name: "eth0".into(),
            flags: iff::UP,
            mtu: 1500,
            oper_state: OperState::Up,
            txqlen: 1000,
            address: Some(HardwareAddr(vec![0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e])),
            ..Default::default()
        }
    }

    fn render(view: LinkView<'_>, opts: OutputOptions) -> String {
        let mut out = Vec::new();
        print_all(&mut out, &[view], &opts).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_default_text() {
        let link = eth0();
        assert_eq!(
            render(LinkView::new(&link), OutputOptions::default()),
            "1: eth0: <UP> mtu 1500 state UP group default\n    link/ 00:1a:2b:3c:4d:5e\n"
        );
    }

    #[test]
    fn test_brief() {
        let link = eth0();
        let opts = OutputOptions {
            brief: true,
            ..Default::default()
        };
        assert_eq!(
            render(LinkView::new(&link), opts),
            "eth0                      up         00:1a:2b:3c:4d:5e   <UP>\n"
        );
    }

    #[test]
    fn test_stats() {
        let mut link = eth0();
        link.stats = Some(LinkStats {
            rx_packets: 100,
            tx_packets: 200,
            rx_bytes: 1000,
            tx_bytes: 2000,
            rx_errors: 10,
            tx_errors: 20,
            rx_dropped: 1,
            tx_dropped: 2,
            ..Default::default()
        });
        let opts = OutputOptions {
            stats: true,
            ..Default::default()
        };
        assert_eq!(
            render(LinkView::new(&link), opts),
            "1: eth0: <UP> mtu 1500 state UP group default\n    link/ 00:1a:2b:3c:4d:5e\n    RX: bytes 1000 packets 100 errors 10 dropped 1 missed 0 mcast 0\n    TX: bytes 2000 packets 200 errors 20 dropped 2 carrier 0 collsns 0\n"
        );
    }

    #[test]
    fn test_details_and_master() {
        let mut link = eth0();
        link.encap = "ether".into();
        link.kind = LinkKind::Vlan(VlanInfo {
            parent: Some("eth1".into()),
            id: 100,
            ..Default::default()
        });
        let opts = OutputOptions {
            details: true,
            ..Default::default()
        };
        let text = render(LinkView::new(&link).with_master(Some("vrf-blue")), opts);
        assert_eq!(
            text,
            "1: eth0: <UP> mtu 1500 master vrf-blue state UP group default\n    link/ether 00:1a:2b:3c:4d:5e\n    vlan protocol 802.1Q id 100\n"
        );
    }

    #[test]
    fn test_json_keys() {
        let link = eth0();
        let value = LinkView::new(&link).to_json(&OutputOptions::default());
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["ifindex", "ifname", "flags", "mtu", "operstate", "group", "txqlen", "link_type", "address"]
        );
        assert_eq!(value["flags"], json!(["up"]));
        assert_eq!(value["link_type"], "device");
    }
}
