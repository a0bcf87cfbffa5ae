//! Neighbour (ARP/NDP) cache entries.

use std::net::IpAddr;

use super::{HardwareAddr, family_of};

/// Neighbour Unreachability Detection states (`NUD_*`).
pub mod nud {
    pub const NONE: u16 = 0x00;
    pub const INCOMPLETE: u16 = 0x01;
    pub const REACHABLE: u16 = 0x02;
    pub const STALE: u16 = 0x04;
    pub const DELAY: u16 = 0x08;
    pub const PROBE: u16 = 0x10;
    pub const FAILED: u16 = 0x20;
    pub const NOARP: u16 = 0x40;
    pub const PERMANENT: u16 = 0x80;
}

/// Neighbour flags (`NTF_*`).
pub mod ntf {
    pub const USE: u8 = 0x01;
    pub const SELF: u8 = 0x02;
    pub const MASTER: u8 = 0x04;
    pub const PROXY: u8 = 0x08;
    pub const EXT_LEARNED: u8 = 0x10;
    pub const OFFLOADED: u8 = 0x20;
    pub const ROUTER: u8 = 0x80;
}

/// A neighbour table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub index: u32,
    pub dev: String,
    pub dst: IpAddr,
    pub lladdr: Option<HardwareAddr>,
    pub state: u16,
    pub flags: u8,
}

impl Neighbor {
    pub fn new(dst: IpAddr, dev: impl Into<String>) -> Self {
        Self {
            index: 0,
            dev: dev.into(),
            dst,
            lladdr: None,
            state: nud::NONE,
            flags: 0,
        }
    }

    pub fn family(&self) -> u8 {
        family_of(&self.dst)
    }

    pub fn is_router(&self) -> bool {
        self.flags & ntf::ROUTER != 0
    }

    pub fn is_proxy(&self) -> bool {
        self.flags & ntf::PROXY != 0
    }
}
