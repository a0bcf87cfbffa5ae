//! Network object model shared by the parsers, the gateway and the printers.
//!
//! The same records describe both what a command wants to create and what
//! the kernel reported in a listing.

pub mod address;
pub mod event;
pub mod link;
pub mod neigh;
pub mod route;
pub mod tunnel;
pub mod tuntap;
pub mod xfrm;

pub use address::Address;
pub use event::{Event, EventClass, XfrmEvent, XfrmEventClass};
pub use link::{Link, LinkKind, LinkStats, OperState};
pub use neigh::Neighbor;
pub use route::{NextHop, Route, RouteMetrics};
pub use tunnel::{TunnelMode, TunnelParams};
pub use tuntap::{Tuntap, TuntapMode};

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Address family constants.
pub const AF_UNSPEC: u8 = 0;
pub const AF_INET: u8 = 2;
pub const AF_INET6: u8 = 10;

/// Address family number for an IP address.
pub fn family_of(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => AF_INET,
        IpAddr::V6(_) => AF_INET6,
    }
}

/// An IP address with a prefix length.
///
/// The address keeps whatever host bits it was given; use
/// [`IpNet::network`] for the masked form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpNet {
    addr: IpAddr,
    prefix_len: u8,
}

impl IpNet {
    /// Build a prefix, rejecting out-of-range lengths.
    pub fn new(addr: IpAddr, prefix_len: u8) -> Option<Self> {
        let max = if addr.is_ipv4() { 32 } else { 128 };
        (prefix_len <= max).then_some(Self { addr, prefix_len })
    }

    /// A single-host prefix (/32 or /128).
    pub fn host(addr: IpAddr) -> Self {
        let prefix_len = if addr.is_ipv4() { 32 } else { 128 };
        Self { addr, prefix_len }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }

    pub fn family(&self) -> u8 {
        family_of(&self.addr)
    }

    /// The prefix with host bits cleared.
    pub fn network(&self) -> Self {
        let addr = match self.addr {
            IpAddr::V4(a) => IpAddr::V4(Ipv4Addr::from(u32::from(a) & v4_mask(self.prefix_len))),
            IpAddr::V6(a) => IpAddr::V6(Ipv6Addr::from(u128::from(a) & v6_mask(self.prefix_len))),
        };
        Self {
            addr,
            prefix_len: self.prefix_len,
        }
    }

    /// Whether `ip` lies inside this prefix.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = v4_mask(self.prefix_len);
                u32::from(net) & mask == u32::from(*ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = v6_mask(self.prefix_len);
                u128::from(net) & mask == u128::from(*ip) & mask
            }
            _ => false,
        }
    }

    /// Whether `other` is entirely covered by this prefix.
    pub fn contains_net(&self, other: &IpNet) -> bool {
        other.prefix_len >= self.prefix_len && self.contains(&other.addr)
    }

    /// The netmask as a lowercase hex string, e.g. `ffffff00`.
    pub fn mask_hex(&self) -> String {
        match self.addr {
            IpAddr::V4(_) => format!("{:08x}", v4_mask(self.prefix_len)),
            IpAddr::V6(_) => format!("{:032x}", v6_mask(self.prefix_len)),
        }
    }

    /// The IPv4 directed broadcast address of this prefix.
    pub fn broadcast(&self) -> Option<IpAddr> {
        match self.addr {
            IpAddr::V4(a) => Some(IpAddr::V4(Ipv4Addr::from(
                u32::from(a) | !v4_mask(self.prefix_len),
            ))),
            IpAddr::V6(_) => None,
        }
    }

    /// Whether this is the all-zero default prefix.
    pub fn is_default(&self) -> bool {
        self.prefix_len == 0 && self.addr.is_unspecified()
    }
}

fn v4_mask(len: u8) -> u32 {
    if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len)) }
}

fn v6_mask(len: u8) -> u128 {
    if len == 0 { 0 } else { u128::MAX << (128 - u32::from(len)) }
}

impl fmt::Display for IpNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl FromStr for IpNet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| format!("invalid CIDR address: {s}"))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| format!("invalid CIDR address: {s}"))?;
        let len: u8 = len
            .parse()
            .map_err(|_| format!("invalid CIDR address: {s}"))?;
        IpNet::new(addr, len).ok_or_else(|| format!("invalid CIDR address: {s}"))
    }
}

/// A link-layer address of any length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct HardwareAddr(pub Vec<u8>);

impl HardwareAddr {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for HardwareAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for HardwareAddr {
    type Err = String;

    /// Accepts 6, 8 or 20 colon- or dash-separated hex octets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep = if s.contains('-') { '-' } else { ':' };
        let bytes = s
            .split(sep)
            .map(|part| {
                if part.len() != 2 {
                    return Err(());
                }
                u8::from_str_radix(part, 16).map_err(|_| ())
            })
            .collect::<Result<Vec<u8>, ()>>()
            .map_err(|_| format!("invalid MAC address: {s}"))?;
        match bytes.len() {
            6 | 8 | 20 => Ok(Self(bytes)),
            _ => Err(format!("invalid MAC address: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipnet_network_masks_host_bits() {
        let net: IpNet = "192.0.0.2/24".parse().unwrap();
        assert_eq!(net.addr().to_string(), "192.0.0.2");
        assert_eq!(net.network().to_string(), "192.0.0.0/24");
        let v6: IpNet = "fe80::1/64".parse().unwrap();
        assert_eq!(v6.network().to_string(), "fe80::/64");
    }

    #[test]
    fn test_ipnet_contains() {
        let net: IpNet = "10.0.0.0/8".parse().unwrap();
        assert!(net.contains(&"10.1.2.3".parse().unwrap()));
        assert!(!net.contains(&"11.0.0.1".parse().unwrap()));
        assert!(!net.contains(&"::1".parse().unwrap()));
        assert!(net.contains_net(&"10.2.0.0/16".parse().unwrap()));
        assert!(!net.contains_net(&"0.0.0.0/0".parse().unwrap()));
        let any: IpNet = "0.0.0.0/0".parse().unwrap();
        assert!(any.is_default());
        assert!(any.contains(&"1.2.3.4".parse().unwrap()));
    }

    #[test]
    fn test_ipnet_mask_and_broadcast() {
        let net: IpNet = "192.168.1.1/24".parse().unwrap();
        assert_eq!(net.mask_hex(), "ffffff00");
        assert_eq!(net.broadcast().unwrap().to_string(), "192.168.1.255");
    }

    #[test]
    fn test_ipnet_rejects() {
        assert!("192.168.1.1/invalid".parse::<IpNet>().is_err());
        assert!("192.168.1.1/33".parse::<IpNet>().is_err());
        assert!("fe80::/invalid".parse::<IpNet>().is_err());
        assert!("192.168.1.1".parse::<IpNet>().is_err());
    }

    #[test]
    fn test_hardware_addr() {
        let mac: HardwareAddr = "01:23:45:67:89:ab".parse().unwrap();
        assert_eq!(mac.0, vec![0x01, 0x23, 0x45, 0x67, 0x89, 0xab]);
        assert_eq!(mac.to_string(), "01:23:45:67:89:ab");
        assert!("invalid".parse::<HardwareAddr>().is_err());
        assert!("01:23:45".parse::<HardwareAddr>().is_err());
        let guid: HardwareAddr = "00:11:22:33:44:55:66:77".parse().unwrap();
        assert_eq!(guid.0.len(), 8);
    }
}
