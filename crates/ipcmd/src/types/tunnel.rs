//! Point-to-point IP tunnel parameters for `ip tunnel`.

use std::net::IpAddr;

use super::link::TunnelInfo;
use super::LinkKind;

/// Tunnel encapsulation selected with `mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelMode {
    Gre,
    Ip6Gre,
    Ipip,
    Ip6tnl,
    Vti,
    Vti6,
    Sit,
}

impl TunnelMode {
    pub const NAMES: &'static [&'static str] =
        &["gre", "ip6gre", "ipip", "ip6tnl", "vti", "vti6", "sit"];

    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "gre" => Self::Gre,
            "ip6gre" => Self::Ip6Gre,
            "ipip" => Self::Ipip,
            "ip6tnl" => Self::Ip6tnl,
            "vti" => Self::Vti,
            "vti6" => Self::Vti6,
            "sit" => Self::Sit,
            _ => return None,
        })
    }

    /// Link kinds a `show` in this mode lists.
    pub fn show_kinds(&self) -> &'static [&'static str] {
        match self {
            Self::Gre => &["gre", "ip6gre"],
            Self::Ipip => &["ipip", "ip6tnl"],
            Self::Vti => &["vti", "vti6"],
            Self::Ip6Gre => &["ip6gre"],
            Self::Ip6tnl => &["ip6tnl"],
            Self::Vti6 => &["vti6"],
            Self::Sit => &["sit"],
        }
    }

    /// Name a new tunnel gets when none is given.
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::Gre | Self::Ip6Gre => "gre0",
            Self::Ipip => "tunl0",
            Self::Ip6tnl => "ip6tnl0",
            Self::Vti | Self::Vti6 => "ip_vti0",
            Self::Sit => "sit0",
        }
    }

    /// The link kind carrying `info`.
    pub fn link_kind(&self, info: TunnelInfo) -> LinkKind {
        match self {
            Self::Gre => LinkKind::Gre(info),
            Self::Ip6Gre => LinkKind::Ip6Gre(info),
            Self::Ipip => LinkKind::Ipip(info),
            Self::Ip6tnl => LinkKind::Ip6tnl(info),
            Self::Vti => LinkKind::Vti(info),
            Self::Vti6 => LinkKind::Vti6(info),
            Self::Sit => LinkKind::Sit(info),
        }
    }
}

/// Every link kind `ip tunnel` manages.
pub const TUNNEL_KINDS: &[&str] = &["gre", "ip6gre", "ipip", "ip6tnl", "vti", "vti6", "sit"];

/// Parsed `ip tunnel` arguments.
///
/// Numeric fields use -1 for "not given".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelParams {
    pub name: Option<String>,
    pub mode: Option<TunnelMode>,
    /// Kinds `show` lists; empty means all tunnel kinds.
    pub kinds: Vec<&'static str>,
    /// `None` for unset or `any`.
    pub remote: Option<IpAddr>,
    pub local: Option<IpAddr>,
    pub ttl: i32,
    pub tos: i32,
    pub ikey: i32,
    pub okey: i32,
    pub dev: Option<String>,
}

impl Default for TunnelParams {
    fn default() -> Self {
        Self {
            name: None,
            mode: None,
            kinds: Vec::new(),
            remote: None,
            local: None,
            ttl: -1,
            tos: -1,
            ikey: -1,
            okey: -1,
            dev: None,
        }
    }
}

impl TunnelParams {
    /// Kernel parameters for `add`, with unset values as 0.
    pub fn info(&self) -> TunnelInfo {
        TunnelInfo {
            remote: self.remote,
            local: self.local,
            ttl: self.ttl.clamp(0, 255) as u8,
            tos: self.tos.clamp(0, 255) as u8,
            ikey: self.ikey.max(0) as u32,
            okey: self.okey.max(0) as u32,
            dev: self.dev.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        for name in TunnelMode::NAMES {
            assert!(TunnelMode::from_name(name).is_some(), "{name}");
        }
        assert_eq!(TunnelMode::from_name("ip6tln"), None);
        assert_eq!(TunnelMode::Gre.show_kinds(), ["gre", "ip6gre"]);
        assert_eq!(TunnelMode::Ipip.default_name(), "tunl0");
    }

    #[test]
    fn test_info_normalises_unset() {
        let p = TunnelParams {
            ttl: 64,
            ..Default::default()
        };
        let info = p.info();
        assert_eq!((info.ttl, info.tos, info.ikey, info.okey), (64, 0, 0, 0));
    }
}
