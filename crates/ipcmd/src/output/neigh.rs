//! Neighbour cache rendering.

use std::io::Write;

use serde_json::{Value, json};

use crate::names;
use crate::output::{OutputOptions, Printable};
use crate::types::Neighbor;

impl Printable for Neighbor {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()> {
        let lladdr = self.lladdr.as_ref().map(|m| m.to_string());
        if opts.brief {
            return writeln!(
                w,
                "{:<40}{:<14}{}",
                self.dst.to_string(),
                self.dev,
                lladdr.unwrap_or_default()
            );
        }
        write!(w, "{} dev {}", self.dst, self.dev)?;
        if let Some(mac) = lladdr {
            write!(w, " lladdr {mac}")?;
        }
        if self.is_router() {
            write!(w, " router")?;
        }
        if self.is_proxy() {
            write!(w, " proxy")?;
        }
        writeln!(w, " {}", names::nud_name(self.state))
    }

    fn to_json(&self, opts: &OutputOptions) -> Value {
        let mut obj = json!({
            "dst": self.dst.to_string(),
            "dev": self.dev,
        });
        if let Some(mac) = &self.lladdr {
            obj["lladdr"] = json!(mac.to_string());
        }
        if !opts.brief {
            obj["state"] = json!(names::nud_name(self.state));
        }
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::print_all;
    use crate::types::HardwareAddr;
    use crate::types::neigh::{nud, ntf};

    fn pair(states: [u16; 2]) -> Vec<Neighbor> {
        ["eth0", "eth1"]
            .iter()
            .zip(states)
            .enumerate()
            .map(|(i, (dev, state))| {
                let mut n = Neighbor::new(format!("192.168.1.{}", i + 1).parse().unwrap(), *dev);
                n.lladdr = Some(HardwareAddr(vec![0x00, 0x0c, 0x29, 0x3e, 0x1e, 0x4c + i as u8]));
                n.state = state;
                n
            })
            .collect()
    }

    fn render(neighs: &[Neighbor], opts: OutputOptions) -> String {
        let mut out = Vec::new();
        print_all(&mut out, neighs, &opts).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_brief() {
        let opts = OutputOptions {
            brief: true,
            ..Default::default()
        };
        assert_eq!(
            render(&pair([nud::NONE, nud::NONE]), opts),
            "192.168.1.1                             eth0          00:0c:29:3e:1e:4c\n192.168.1.2                             eth1          00:0c:29:3e:1e:4d\n"
        );
    }

    #[test]
    fn test_default() {
        let mut neighs = pair([nud::REACHABLE, nud::STALE]);
        neighs[0].flags = ntf::ROUTER;
        assert_eq!(
            render(&neighs, OutputOptions::default()),
            "192.168.1.1 dev eth0 lladdr 00:0c:29:3e:1e:4c router REACHABLE\n192.168.1.2 dev eth1 lladdr 00:0c:29:3e:1e:4d STALE\n"
        );
    }

    #[test]
    fn test_json() {
        let brief = OutputOptions {
            json: true,
            brief: true,
            ..Default::default()
        };
        assert_eq!(
            render(&pair([nud::NONE, nud::NONE]), brief),
            "[{\"dst\":\"192.168.1.1\",\"dev\":\"eth0\",\"lladdr\":\"00:0c:29:3e:1e:4c\"},{\"dst\":\"192.168.1.2\",\"dev\":\"eth1\",\"lladdr\":\"00:0c:29:3e:1e:4d\"}]\n"
        );
        let full = OutputOptions {
            json: true,
            ..Default::default()
        };
        assert_eq!(
            render(&pair([nud::REACHABLE, nud::STALE]), full),
            "[{\"dst\":\"192.168.1.1\",\"dev\":\"eth0\",\"lladdr\":\"00:0c:29:3e:1e:4c\",\"state\":\"REACHABLE\"},{\"dst\":\"192.168.1.2\",\"dev\":\"eth1\",\"lladdr\":\"00:0c:29:3e:1e:4d\",\"state\":\"STALE\"}]\n"
        );
    }
}
