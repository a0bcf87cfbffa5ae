//! IPsec (xfrm) states and policies.

use std::fmt;
use std::net::IpAddr;

use super::IpNet;

/// IPsec transform protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XfrmProto {
    Route2,
    Esp,
    Ah,
    Hao,
    Comp,
}

impl XfrmProto {
    pub const NAMES: &'static [&'static str] = &["esp", "ah", "comp", "route2", "hao"];

    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "esp" => Self::Esp,
            "ah" => Self::Ah,
            "comp" => Self::Comp,
            "route2" => Self::Route2,
            "hao" => Self::Hao,
            _ => return None,
        })
    }

    /// IP protocol number carried in the SA id.
    pub fn number(&self) -> u8 {
        match self {
            Self::Route2 => 43,
            Self::Esp => 50,
            Self::Ah => 51,
            Self::Hao => 60,
            Self::Comp => 108,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Some(match n {
            43 => Self::Route2,
            50 => Self::Esp,
            51 => Self::Ah,
            60 => Self::Hao,
            108 => Self::Comp,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Route2 => "route2",
            Self::Esp => "esp",
            Self::Ah => "ah",
            Self::Hao => "hao",
            Self::Comp => "comp",
        }
    }
}

/// SA encapsulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XfrmMode {
    #[default]
    Transport,
    Tunnel,
    RouteOptimization,
    InTrigger,
    Beet,
}

impl XfrmMode {
    pub const NAMES: &'static [&'static str] = &["transport", "tunnel", "ro", "in_trigger", "beet"];

    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "transport" => Self::Transport,
            "tunnel" => Self::Tunnel,
            "ro" => Self::RouteOptimization,
            "in_trigger" => Self::InTrigger,
            "beet" => Self::Beet,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        Self::NAMES[*self as usize]
    }
}

/// Policy direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XfrmDir {
    #[default]
    In,
    Out,
    Fwd,
}

impl XfrmDir {
    pub fn name(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Fwd => "fwd",
        }
    }
}

/// Policy action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XfrmAction {
    #[default]
    Allow,
    Block,
}

impl XfrmAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Block => "block",
        }
    }
}

/// Firewall mark with optional mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XfrmMark {
    pub value: u32,
    pub mask: u32,
}

impl fmt::Display for XfrmMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)?;
        if self.mask != 0 {
            write!(f, "/{:x}", self.mask)?;
        }
        Ok(())
    }
}

/// An algorithm with its key material.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XfrmAlgo {
    pub name: String,
    pub key: Vec<u8>,
    /// Truncation length for `auth-trunc`.
    pub trunc_len: Option<u32>,
    /// ICV length for `aead`.
    pub icv_len: Option<u32>,
}

impl XfrmAlgo {
    pub fn key_bits(&self) -> usize {
        self.key.len() * 8
    }

    pub fn key_hex(&self) -> String {
        self.key.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// UDP encapsulation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncapType {
    EspInUdpNonIke,
    EspInUdp,
}

impl EncapType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EspInUdpNonIke => "espinudp-nonike",
            Self::EspInUdp => "espinudp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XfrmEncap {
    pub kind: EncapType,
    pub sport: u16,
    pub dport: u16,
    pub oaddr: IpAddr,
}

/// Soft and hard lifetime limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XfrmLimits {
    pub byte_soft: u64,
    pub byte_hard: u64,
    pub packet_soft: u64,
    pub packet_hard: u64,
    pub time_soft: u64,
    pub time_hard: u64,
    pub time_use_soft: u64,
    pub time_use_hard: u64,
}

/// Counters reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XfrmStats {
    pub replay_window: u32,
    pub replay: u32,
    pub failed: u32,
    pub bytes: u64,
    pub packets: u64,
    pub add_time: u64,
    pub use_time: u64,
}

/// A security association.
///
/// Unset selector fields are `None` or zero and match anything when the
/// record is used as a filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XfrmState {
    pub src: Option<IpAddr>,
    pub dst: Option<IpAddr>,
    pub proto: Option<XfrmProto>,
    pub spi: u32,
    pub mode: Option<XfrmMode>,
    pub reqid: u32,
    pub replay_window: u32,
    pub auth: Option<XfrmAlgo>,
    pub crypt: Option<XfrmAlgo>,
    pub aead: Option<XfrmAlgo>,
    pub encap: Option<XfrmEncap>,
    pub mark: Option<XfrmMark>,
    pub output_mark: Option<XfrmMark>,
    pub if_id: u32,
    pub limits: XfrmLimits,
    pub stats: XfrmStats,
}

impl XfrmState {
    /// Whether `self`, used as a filter, selects `state`.
    pub fn selects(&self, state: &XfrmState) -> bool {
        (self.src.is_none() || self.src == state.src)
            && (self.dst.is_none() || self.dst == state.dst)
            && (self.proto.is_none() || self.proto == state.proto)
            && (self.spi == 0 || self.spi == state.spi)
            && (self.mode.is_none() || self.mode == state.mode)
            && (self.reqid == 0 || self.reqid == state.reqid)
    }
}

/// A policy template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XfrmTmpl {
    pub src: Option<IpAddr>,
    pub dst: Option<IpAddr>,
    pub proto: Option<XfrmProto>,
    pub spi: u32,
    pub mode: Option<XfrmMode>,
    pub reqid: u32,
    /// `level use`.
    pub optional: bool,
}

/// A security policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XfrmPolicy {
    pub src: Option<IpNet>,
    pub dst: Option<IpNet>,
    pub proto: Option<XfrmProto>,
    pub sport: u16,
    pub dport: u16,
    pub dir: Option<XfrmDir>,
    pub mark: Option<XfrmMark>,
    pub index: u32,
    pub action: Option<XfrmAction>,
    pub priority: u32,
    pub if_id: u32,
    pub tmpls: Vec<XfrmTmpl>,
}

impl XfrmPolicy {
    /// Whether `self`, used as a filter, selects `policy`.
    pub fn selects(&self, policy: &XfrmPolicy) -> bool {
        (self.src.is_none() || self.src == policy.src)
            && (self.dst.is_none() || self.dst == policy.dst)
            && (self.proto.is_none() || self.proto == policy.proto)
            && (self.sport == 0 || self.sport == policy.sport)
            && (self.dport == 0 || self.dport == policy.dport)
            && (self.dir.is_none() || self.dir == policy.dir)
            && (self.mark.is_none() || self.mark == policy.mark)
            && (self.index == 0 || self.index == policy.index)
            && (self.action.is_none() || self.action == policy.action)
            && (self.priority == 0 || self.priority == policy.priority)
            && (self.if_id == 0 || self.if_id == policy.if_id)
    }
}
