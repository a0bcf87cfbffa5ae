//! Interface address records.

use std::net::IpAddr;

use super::IpNet;

/// Address flags (`IFA_F_*`).
pub mod ifa {
    pub const SECONDARY: u32 = 0x01;
    pub const NODAD: u32 = 0x02;
    pub const OPTIMISTIC: u32 = 0x04;
    pub const DADFAILED: u32 = 0x08;
    pub const HOMEADDRESS: u32 = 0x10;
    pub const DEPRECATED: u32 = 0x20;
    pub const TENTATIVE: u32 = 0x40;
    pub const PERMANENT: u32 = 0x80;
    pub const MANAGETEMPADDR: u32 = 0x100;
    pub const NOPREFIXROUTE: u32 = 0x200;
    pub const MCAUTOJOIN: u32 = 0x400;
}

/// Lifetime value meaning "never expires".
pub const INFINITY_LIFE_TIME: u32 = u32::MAX;

/// An address assigned to a link.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    /// Owning link index (0 when only the name is known).
    pub index: u32,
    /// Owning link name.
    pub dev: String,
    pub local: IpNet,
    pub peer: Option<IpNet>,
    pub broadcast: Option<IpAddr>,
    pub anycast: Option<IpAddr>,
    pub label: Option<String>,
    pub scope: u8,
    pub flags: u32,
    pub valid_lft: u32,
    pub preferred_lft: u32,
}

impl Address {
    pub fn new(local: IpNet, dev: impl Into<String>) -> Self {
        Self {
            index: 0,
            dev: dev.into(),
            local,
            peer: None,
            broadcast: None,
            anycast: None,
            label: None,
            scope: 0,
            flags: 0,
            valid_lft: 0,
            preferred_lft: 0,
        }
    }

    pub fn is_ipv4(&self) -> bool {
        self.local.is_ipv4()
    }

    pub fn family(&self) -> u8 {
        self.local.family()
    }

    /// Whether the address never expires.
    pub fn is_permanent(&self) -> bool {
        self.flags & ifa::PERMANENT != 0
    }
}
