//! Address rendering for `ip address show`.

use std::io::Write;

use serde_json::{Value, json};

use crate::names;
use crate::output::{LinkView, OutputOptions, Printable, lifetime};
use crate::types::address::ifa;
use crate::types::Address;

const FLAG_WORDS: &[(u32, &str)] = &[
    (ifa::SECONDARY, "secondary"),
    (ifa::TENTATIVE, "tentative"),
    (ifa::DEPRECATED, "deprecated"),
    (ifa::HOMEADDRESS, "home"),
    (ifa::NODAD, "nodad"),
    (ifa::MANAGETEMPADDR, "mngtmpaddr"),
    (ifa::NOPREFIXROUTE, "noprefixroute"),
    (ifa::MCAUTOJOIN, "autojoin"),
    (ifa::DADFAILED, "dadfailed"),
];

fn family_word(addr: &Address) -> &'static str {
    if addr.is_ipv4() { "inet" } else { "inet6" }
}

/// One address as printed under its link.
#[derive(Debug, Clone, Copy)]
pub struct AddressBlock<'a>(pub &'a Address);

impl Printable for AddressBlock<'_> {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        let a = self.0;
        write!(w, "    {} {}", family_word(a), a.local)?;
        if let Some(peer) = &a.peer {
            write!(w, " peer {peer}")?;
        }
        if let Some(brd) = &a.broadcast {
            write!(w, " brd {brd}")?;
        }
        if let Some(any) = &a.anycast {
            write!(w, " any {any}")?;
        }
        write!(w, " scope {}", names::scope_name(a.scope, opts.numeric))?;
        for (bit, word) in FLAG_WORDS {
            if a.flags & bit != 0 {
                write!(w, " {word}")?;
            }
        }
        if let Some(label) = &a.label {
            write!(w, " {label}")?;
        }
        writeln!(w)?;
        writeln!(
            w,
            "       valid_lft {} preferred_lft {}",
            lifetime(a.valid_lft),
            lifetime(a.preferred_lft)
        )
    }

    fn to_json(&self, opts: &OutputOptions) -> Value {
        let a = self.0;
        let mut obj = json!({
            "ip": family_word(a),
            "local": a.local.addr().to_string(),
            "prefixlen": a.local.mask_hex(),
        });
        if let Some(peer) = &a.peer {
            obj["address"] = json!(peer.addr().to_string());
        }
        if let Some(brd) = &a.broadcast {
            obj["broadcast"] = json!(brd.to_string());
        }
        obj["scope"] = json!(names::scope_name(a.scope, opts.numeric));
        for (bit, word) in FLAG_WORDS {
            if a.flags & bit != 0 {
                obj[*word] = json!(true);
            }
        }
        if let Some(label) = &a.label {
            obj["label"] = json!(label);
        }
        obj["valid_life_time"] = json!(lifetime(a.valid_lft));
        obj["preferred_life_time"] = json!(lifetime(a.preferred_lft));
        obj
    }
}

/// A link together with the addresses assigned to it.
#[derive(Debug, Clone)]
pub struct LinkAddresses<'a> {
    pub link: LinkView<'a>,
    pub addrs: Vec<&'a Address>,
}

impl Printable for LinkAddresses<'_> {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        if opts.brief {
            let addrs: Vec<String> = self.addrs.iter().map(|a| a.local.to_string()).collect();
            return writeln!(
                w,
                "{:<21}{:<11}{}",
                self.link.link.name,
                self.link.link.oper_state.name().to_ascii_lowercase(),
                addrs.join(" ")
            );
        }
        self.link.write_header(w, opts)?;
        for addr in &self.addrs {
            AddressBlock(addr).print_text(w, opts)?;
        }
        Ok(())
    }

    fn to_json(&self, opts: &OutputOptions) -> Value {
        let mut obj = self.link.json_object(opts);
        let info: Vec<Value> = self
            .addrs
            .iter()
            .map(|a| AddressBlock(a).to_json(opts))
            .collect();
        obj["addr_info"] = Value::Array(info);
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::scope;
    use crate::output::print_all;
    use crate::types::link::iff;
    use crate::types::{HardwareAddr, Link, OperState};

    fn v4() -> Address {
        let mut a = Address::new("192.168.1.1/24".parse().unwrap(), "eth0");
        a.broadcast = Some("192.168.1.255".parse().unwrap());
        a.scope = scope::HOST;
        a.label = Some("eth0".into());
        a
    }

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

    fn text(item: &impl Printable, opts: OutputOptions) -> String {
        let mut out = Vec::new();
        item.print_text(&mut out, &opts).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_ipv4_block() {
        let a = v4();
        assert_eq!(
            text(&AddressBlock(&a), OutputOptions::default()),
            "    inet 192.168.1.1/24 brd 192.168.1.255 scope host eth0\n       valid_lft 0sec preferred_lft 0sec\n"
        );
    }

    #[test]
    fn test_ipv6_block() {
        let mut a = Address::new("2001:db8::1/64".parse().unwrap(), "eth0");
        a.scope = scope::HOST;
        a.label = Some("eth0".into());
        a.valid_lft = 7200;
        a.preferred_lft = 3600;
        assert_eq!(
            text(&AddressBlock(&a), OutputOptions::default()),
            "    inet6 2001:db8::1/64 scope host eth0\n       valid_lft 7200sec preferred_lft 3600sec\n"
        );
    }

    #[test]
    fn test_forever_and_flags() {
        let mut a = Address::new("10.0.0.1/8".parse().unwrap(), "lo");
        a.valid_lft = u32::MAX;
        a.preferred_lft = u32::MAX;
        a.flags = ifa::NOPREFIXROUTE;
        assert_eq!(
            text(&AddressBlock(&a), OutputOptions::default()),
            "    inet 10.0.0.1/8 scope global noprefixroute\n       valid_lft forever preferred_lft forever\n"
        );
    }

    #[test]
    fn test_link_with_addresses() {
        let link = eth0();
        let a = v4();
        let view = LinkAddresses {
            link: LinkView::new(&link),
            addrs: vec![&a],
        };
        assert_eq!(
            text(&view, OutputOptions::default()),
            "1: eth0: <UP> mtu 1500 state UP group default\n    link/ 00:1a:2b:3c:4d:5e\n    inet 192.168.1.1/24 brd 192.168.1.255 scope host eth0\n       valid_lft 0sec preferred_lft 0sec\n"
        );
        let brief = OutputOptions {
            brief: true,
            ..Default::default()
        };
        assert_eq!(text(&view, brief), "eth0                 up         192.168.1.1/24\n");
    }

    #[test]
    fn test_link_addresses_pretty_json() {
        let link = eth0();
        let a = v4();
        let view = LinkAddresses {
            link: LinkView::new(&link),
            addrs: vec![&a],
        };
        let opts = OutputOptions {
            json: true,
            pretty: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        print_all(&mut out, &[view], &opts).unwrap();
        let expected = r#"[
    {
        "ifindex": 1,
        "ifname": "eth0",
        "flags": [
            "up"
        ],
        "mtu": 1500,
        "operstate": "up",
        "group": "default",
        "txqlen": 1000,
        "link_type": "device",
        "address": "00:1a:2b:3c:4d:5e",
        "addr_info": [
            {
                "ip": "inet",
                "local": "192.168.1.1",
                "prefixlen": "ffffff00",
                "broadcast": "192.168.1.255",
                "scope": "host",
                "label": "eth0",
                "valid_life_time": "0sec",
                "preferred_life_time": "0sec"
            }
        ]
    }
]
"#;
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }
}
