//! Link (network interface) records.

use std::net::IpAddr;

use super::HardwareAddr;

/// Interface flags (`IFF_*`).
pub mod iff {
    pub const UP: u32 = 0x1;
    pub const BROADCAST: u32 = 0x2;
    pub const DEBUG: u32 = 0x4;
    pub const LOOPBACK: u32 = 0x8;
    pub const POINTOPOINT: u32 = 0x10;
    pub const NOTRAILERS: u32 = 0x20;
    pub const RUNNING: u32 = 0x40;
    pub const NOARP: u32 = 0x80;
    pub const PROMISC: u32 = 0x100;
    pub const ALLMULTI: u32 = 0x200;
    pub const MASTER: u32 = 0x400;
    pub const SLAVE: u32 = 0x800;
    pub const MULTICAST: u32 = 0x1000;
    pub const PORTSEL: u32 = 0x2000;
    pub const AUTOMEDIA: u32 = 0x4000;
    pub const DYNAMIC: u32 = 0x8000;
    pub const LOWER_UP: u32 = 0x10000;
    pub const DORMANT: u32 = 0x20000;
    pub const ECHO: u32 = 0x40000;
}

/// Flag names in the order `ip link` prints them.
pub const FLAG_NAMES: &[(u32, &str)] = &[
    (iff::LOOPBACK, "LOOPBACK"),
    (iff::BROADCAST, "BROADCAST"),
    (iff::POINTOPOINT, "POINTOPOINT"),
    (iff::MULTICAST, "MULTICAST"),
    (iff::NOARP, "NOARP"),
    (iff::ALLMULTI, "ALLMULTI"),
    (iff::PROMISC, "PROMISC"),
    (iff::NOTRAILERS, "NOTRAILERS"),
    (iff::DEBUG, "DEBUG"),
    (iff::DYNAMIC, "DYNAMIC"),
    (iff::AUTOMEDIA, "AUTOMEDIA"),
    (iff::PORTSEL, "PORTSEL"),
    (iff::MASTER, "MASTER"),
    (iff::SLAVE, "SLAVE"),
    (iff::UP, "UP"),
    (iff::LOWER_UP, "LOWER_UP"),
    (iff::DORMANT, "DORMANT"),
    (iff::ECHO, "ECHO"),
];

/// RFC 2863 operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperState {
    #[default]
    Unknown,
    NotPresent,
    Down,
    LowerLayerDown,
    Testing,
    Dormant,
    Up,
}

impl OperState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::NotPresent,
            2 => Self::Down,
            3 => Self::LowerLayerDown,
            4 => Self::Testing,
            5 => Self::Dormant,
            6 => Self::Up,
            _ => Self::Unknown,
        }
    }

    /// Upper-case name used in text output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::NotPresent => "NOTPRESENT",
            Self::Down => "DOWN",
            Self::LowerLayerDown => "LOWERLAYERDOWN",
            Self::Testing => "TESTING",
            Self::Dormant => "DORMANT",
            Self::Up => "UP",
        }
    }
}

/// Interface counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub rx_dropped: u64,
    pub rx_missed: u64,
    pub multicast: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
    pub tx_dropped: u64,
    pub tx_carrier: u64,
    pub collisions: u64,
}

/// A network interface and its kind-specific configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Link {
    pub index: u32,
    pub name: String,
    pub flags: u32,
    pub mtu: u32,
    pub oper_state: OperState,
    pub group: u32,
    pub txqlen: u32,
    /// Link-layer type, e.g. "ether" or "loopback".
    pub encap: String,
    pub address: Option<HardwareAddr>,
    /// Master device index (bridge, bond, VRF).
    pub master: Option<u32>,
    pub alias: Option<String>,
    pub num_tx_queues: Option<u32>,
    pub num_rx_queues: Option<u32>,
    pub kind: LinkKind,
    pub stats: Option<LinkStats>,
}

impl Link {
    /// A bare link with just a name, used as a creation template.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_up(&self) -> bool {
        self.flags & iff::UP != 0
    }

    /// Upper-case flag names in print order.
    pub fn flag_names(&self) -> Vec<&'static str> {
        FLAG_NAMES
            .iter()
            .filter(|(bit, _)| self.flags & bit != 0)
            .map(|(_, name)| *name)
            .collect()
    }
}

/// Bonding policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BondMode {
    #[default]
    BalanceRr,
    ActiveBackup,
    BalanceXor,
    Broadcast,
    Lacp,
    BalanceTlb,
    BalanceAlb,
}

impl BondMode {
    pub const NAMES: &'static [&'static str] = &[
        "balance-rr",
        "active-backup",
        "balance-xor",
        "broadcast",
        "802.3ad",
        "balance-tlb",
        "balance-alb",
    ];

    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "balance-rr" | "0" => Self::BalanceRr,
            "active-backup" | "1" => Self::ActiveBackup,
            "balance-xor" | "2" => Self::BalanceXor,
            "broadcast" | "3" => Self::Broadcast,
            "802.3ad" | "4" => Self::Lacp,
            "balance-tlb" | "5" => Self::BalanceTlb,
            "balance-alb" | "6" => Self::BalanceAlb,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        Self::NAMES[*self as usize]
    }
}

/// VLAN tag protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VlanProtocol {
    #[default]
    Dot1Q,
    Dot1Ad,
}

impl VlanProtocol {
    pub fn ethertype(&self) -> u16 {
        match self {
            Self::Dot1Q => 0x8100,
            Self::Dot1Ad => 0x88a8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dot1Q => "802.1Q",
            Self::Dot1Ad => "802.1ad",
        }
    }
}

/// macvlan/macvtap forwarding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacvlanMode {
    Private,
    Vepa,
    #[default]
    Bridge,
    Passthru,
    Source,
}

impl MacvlanMode {
    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "private" => Self::Private,
            "vepa" => Self::Vepa,
            "bridge" => Self::Bridge,
            "passthru" => Self::Passthru,
            "source" => Self::Source,
            _ => return None,
        })
    }

    /// Kernel `MACVLAN_MODE_*` bit.
    pub fn bits(&self) -> u32 {
        match self {
            Self::Private => 1,
            Self::Vepa => 2,
            Self::Bridge => 4,
            Self::Passthru => 8,
            Self::Source => 16,
        }
    }

    pub fn from_bits(v: u32) -> Self {
        match v {
            1 => Self::Private,
            2 => Self::Vepa,
            8 => Self::Passthru,
            16 => Self::Source,
            _ => Self::Bridge,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Vepa => "vepa",
            Self::Bridge => "bridge",
            Self::Passthru => "passthru",
            Self::Source => "source",
        }
    }
}

/// ipvlan/ipvtap mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpvlanMode {
    #[default]
    L2,
    L3,
    L3s,
}

impl IpvlanMode {
    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "l2" => Self::L2,
            "l3" => Self::L3,
            "l3s" => Self::L3s,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::L3 => "l3",
            Self::L3s => "l3s",
        }
    }
}

/// IPoIB transport mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpoibMode {
    #[default]
    Datagram,
    Connected,
}

/// Parent-device based link (vlan, macvlan, ipvlan).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VlanInfo {
    pub parent: Option<String>,
    pub id: u16,
    pub protocol: VlanProtocol,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacvlanInfo {
    pub parent: Option<String>,
    pub mode: MacvlanMode,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpvlanInfo {
    pub parent: Option<String>,
    pub mode: IpvlanMode,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VethInfo {
    pub peer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VxlanInfo {
    pub vni: u32,
    pub remote: Option<IpAddr>,
    pub local: Option<IpAddr>,
    pub group: Option<IpAddr>,
    pub port: Option<u16>,
    pub dev: Option<String>,
    pub ttl: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneveInfo {
    pub vni: u32,
    pub remote: Option<IpAddr>,
    pub port: Option<u16>,
    pub ttl: Option<u8>,
}

/// Point-to-point IP tunnel parameters (gre, ipip, sit, vti and friends).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TunnelInfo {
    pub remote: Option<IpAddr>,
    pub local: Option<IpAddr>,
    pub ttl: u8,
    pub tos: u8,
    pub ikey: u32,
    pub okey: u32,
    pub dev: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XfrmiInfo {
    pub if_id: u32,
    pub dev: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpoibInfo {
    pub pkey: u16,
    pub mode: IpoibMode,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BareudpInfo {
    pub port: u16,
    pub ethertype: u16,
}

/// Closed set of link kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LinkKind {
    /// A physical or otherwise kind-less device.
    #[default]
    Device,
    Dummy,
    Ifb,
    Bridge,
    Bond { mode: BondMode },
    Vlan(VlanInfo),
    Macvlan(MacvlanInfo),
    Veth(VethInfo),
    Vxlan(VxlanInfo),
    Ipvlan(IpvlanInfo),
    Ipvtap(IpvlanInfo),
    Geneve(GeneveInfo),
    Gretap(TunnelInfo),
    Gre(TunnelInfo),
    Ip6Gre(TunnelInfo),
    Ipip(TunnelInfo),
    Ip6tnl(TunnelInfo),
    Sit(TunnelInfo),
    Vti(TunnelInfo),
    Vti6(TunnelInfo),
    Vrf { table: u32 },
    Xfrm(XfrmiInfo),
    Ipoib(IpoibInfo),
    Bareudp(BareudpInfo),
    Tun,
    /// A kind this crate does not model.
    Other(String),
}

impl LinkKind {
    /// Kernel `IFLA_INFO_KIND` string, or "device".
    pub fn name(&self) -> &str {
        match self {
            Self::Device => "device",
            Self::Dummy => "dummy",
            Self::Ifb => "ifb",
            Self::Bridge => "bridge",
            Self::Bond { .. } => "bond",
            Self::Vlan(_) => "vlan",
            Self::Macvlan(_) => "macvlan",
            Self::Veth(_) => "veth",
            Self::Vxlan(_) => "vxlan",
            Self::Ipvlan(_) => "ipvlan",
            Self::Ipvtap(_) => "ipvtap",
            Self::Geneve(_) => "geneve",
            Self::Gretap(_) => "gretap",
            Self::Gre(_) => "gre",
            Self::Ip6Gre(_) => "ip6gre",
            Self::Ipip(_) => "ipip",
            Self::Ip6tnl(_) => "ip6tnl",
            Self::Sit(_) => "sit",
            Self::Vti(_) => "vti",
            Self::Vti6(_) => "vti6",
            Self::Vrf { .. } => "vrf",
            Self::Xfrm(_) => "xfrm",
            Self::Ipoib(_) => "ipoib",
            Self::Bareudp(_) => "bareudp",
            Self::Tun => "tun",
            Self::Other(kind) => kind,
        }
    }

    /// Tunnel parameters for the point-to-point tunnel kinds.
    pub fn tunnel(&self) -> Option<&TunnelInfo> {
        match self {
            Self::Gretap(t)
            | Self::Gre(t)
            | Self::Ip6Gre(t)
            | Self::Ipip(t)
            | Self::Ip6tnl(t)
            | Self::Sit(t)
            | Self::Vti(t)
            | Self::Vti6(t) => Some(t),
            _ => None,
        }
    }
}
