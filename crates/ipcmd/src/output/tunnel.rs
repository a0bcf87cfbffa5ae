//! `ip tunnel show` rendering.

use std::io::Write;
use std::net::IpAddr;

use serde_json::{Value, json};

use crate::output::{OutputOptions, Printable};
use crate::types::{Link, LinkKind};

/// A tunnel link as `ip tunnel show` lists it.
#[derive(Debug, Clone, Copy)]
pub struct TunnelView<'a>(pub &'a Link);

impl TunnelView<'_> {
    /// Encapsulation label printed before `/ip`.
    fn label(&self) -> &str {
        match &self.0.kind {
            LinkKind::Gre(_) | LinkKind::Ip6Gre(_) | LinkKind::Gretap(_) => "gre",
            LinkKind::Ipip(_) | LinkKind::Vti(_) | LinkKind::Vti6(_) => "ip",
            LinkKind::Ip6tnl(_) => "ipv6",
            other => other.name(),
        }
    }

    fn is_vti(&self) -> bool {
        matches!(self.0.kind, LinkKind::Vti(_) | LinkKind::Vti6(_))
    }

    fn ttl(&self) -> String {
        let ttl = self.0.kind.tunnel().map_or(0, |t| t.ttl);
        if self.is_vti() || ttl == 0 || ttl == 255 {
            "inherit".to_string()
        } else {
            ttl.to_string()
        }
    }
}

fn endpoint(addr: Option<IpAddr>) -> String {
    match addr {
        Some(a) if !a.is_unspecified() => a.to_string(),
        _ => "any".to_string(),
    }
}

impl Printable for TunnelView<'_> {
    fn print_text<W: Write>(&self, w: &mut W, _opts: &OutputOptions) -> std::io::Result<()> {
        let info = self.0.kind.tunnel();
        writeln!(
            w,
            "{}: {}/ip remote {} local {} ttl {}",
            self.0.name,
            self.label(),
            endpoint(info.and_then(|t| t.remote)),
            endpoint(info.and_then(|t| t.local)),
            self.ttl()
        )
    }

    fn to_json(&self, _opts: &OutputOptions) -> Value {
        let info = self.0.kind.tunnel();
        json!({
            "ifname": self.0.name,
            "mode": self.0.kind.name(),
            "remote": endpoint(info.and_then(|t| t.remote)),
            "local": endpoint(info.and_then(|t| t.local)),
            "ttl": self.ttl(),
        })
    }
}
