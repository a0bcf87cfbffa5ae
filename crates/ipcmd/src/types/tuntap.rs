//! TUN/TAP device records.

/// `IFF_*` flags understood by `TUNSETIFF`.
pub mod tun_flags {
    pub const TUN: u16 = 0x0001;
    pub const TAP: u16 = 0x0002;
    pub const MULTI_QUEUE: u16 = 0x0100;
    pub const NO_PI: u16 = 0x1000;
    pub const ONE_QUEUE: u16 = 0x2000;
    pub const VNET_HDR: u16 = 0x4000;

    /// Flags a new device gets when nothing else is asked for.
    pub const DEFAULTS: u16 = NO_PI;
    /// Flags implied by `multi_queue`.
    pub const MULTI_QUEUE_DEFAULTS: u16 = MULTI_QUEUE | NO_PI;
}

/// TUN (layer 3) or TAP (layer 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TuntapMode {
    #[default]
    Tun,
    Tap,
}

impl TuntapMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tun => "tun",
            Self::Tap => "tap",
        }
    }

    pub fn flag(&self) -> u16 {
        match self {
            Self::Tun => tun_flags::TUN,
            Self::Tap => tun_flags::TAP,
        }
    }
}

/// A TUN/TAP device, as requested or as listed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tuntap {
    pub name: String,
    pub mode: TuntapMode,
    /// Extra `tun_flags` (queueing, packet info, vnet header).
    pub flags: u16,
    pub owner: Option<u32>,
    pub group: Option<u32>,
    pub non_persist: bool,
}
