//! `RTM_*ADDR` encoding and decoding.

use super::attr::{attrs, get};
use super::builder::MessageBuilder;
use super::message::{IfAddrMsg, IfaCacheInfo, read_header};
use crate::error::GatewayError;
use crate::gateway::GatewayResult;
use crate::types::address::INFINITY_LIFE_TIME;
use crate::types::{Address, IpNet};

mod ifa_attr {
    pub const ADDRESS: u16 = 1;
    pub const LOCAL: u16 = 2;
    pub const LABEL: u16 = 3;
    pub const BROADCAST: u16 = 4;
    pub const ANYCAST: u16 = 5;
    pub const CACHEINFO: u16 = 6;
    pub const FLAGS: u16 = 8;
}

/// Decode one address message. `dev` is left empty for the caller to name.
pub fn decode(payload: &[u8]) -> GatewayResult<Address> {
    let hdr: IfAddrMsg = read_header(payload)?;
    let mut address = None;
    let mut local = None;
    let mut broadcast = None;
    let mut anycast = None;
    let mut label = None;
    let mut flags = u32::from(hdr.ifa_flags);
    let mut lifetimes = (INFINITY_LIFE_TIME, INFINITY_LIFE_TIME);

    for (kind, data) in attrs(&payload[IfAddrMsg::SIZE..]) {
        match kind {
            ifa_attr::ADDRESS => address = Some(get::ip(data)?),
            ifa_attr::LOCAL => local = Some(get::ip(data)?),
            ifa_attr::BROADCAST => broadcast = Some(get::ip(data)?),
            ifa_attr::ANYCAST => anycast = Some(get::ip(data)?),
            ifa_attr::LABEL => label = Some(get::string(data)?),
            ifa_attr::FLAGS => flags = get::u32(data)?,
            ifa_attr::CACHEINFO => {
                let ci: IfaCacheInfo = read_header(data)?;
                lifetimes = (ci.ifa_valid, ci.ifa_prefered);
            }
            _ => {}
        }
    }

    let prefix = hdr.ifa_prefixlen;
    let net = |addr| {
        IpNet::new(addr, prefix)
            .ok_or_else(|| GatewayError::Malformed(format!("prefix length {prefix} out of range")))
    };
    // With both present IFA_LOCAL is ours and IFA_ADDRESS the peer.
    let (mine, peer) = match (local, address) {
        (Some(l), Some(a)) if l != a => (l, Some(a)),
        (Some(l), _) => (l, None),
        (None, Some(a)) => (a, None),
        (None, None) => return Err(GatewayError::Malformed("address without IFA_ADDRESS".into())),
    };

    let mut out = Address::new(net(mine)?, "");
    out.index = hdr.ifa_index;
    out.peer = peer.map(net).transpose()?;
    out.broadcast = broadcast;
    out.anycast = anycast;
    out.label = label;
    out.scope = hdr.ifa_scope;
    out.flags = flags;
    (out.valid_lft, out.preferred_lft) = lifetimes;
    Ok(out)
}

fn header(addr: &Address, index: u32) -> IfAddrMsg {
    let prefix = addr.peer.as_ref().unwrap_or(&addr.local).prefix_len();
    IfAddrMsg {
        ifa_family: addr.family(),
        ifa_prefixlen: prefix,
        ifa_flags: (addr.flags & 0xff) as u8,
        ifa_scope: addr.scope,
        ifa_index: index,
    }
}

fn encode_key(b: &mut MessageBuilder, addr: &Address) {
    b.attr_ip(ifa_attr::LOCAL, &addr.local.addr());
    let remote = addr.peer.as_ref().unwrap_or(&addr.local).addr();
    b.attr_ip(ifa_attr::ADDRESS, &remote);
}

/// Encode an `RTM_NEWADDR` body for link `index`.
pub fn encode_add(b: &mut MessageBuilder, addr: &Address, index: u32) {
    b.header(&header(addr, index));
    encode_key(b, addr);
    if let Some(brd) = &addr.broadcast {
        b.attr_ip(ifa_attr::BROADCAST, brd);
    }
    if let Some(any) = &addr.anycast {
        b.attr_ip(ifa_attr::ANYCAST, any);
    }
    if let Some(label) = &addr.label {
        b.attr_str(ifa_attr::LABEL, label);
    }
    if addr.flags > 0xff {
        b.attr_u32(ifa_attr::FLAGS, addr.flags);
    }
    if addr.valid_lft != 0 || addr.preferred_lft != 0 {
        let forever = |v: u32| if v == 0 { INFINITY_LIFE_TIME } else { v };
        let ci = IfaCacheInfo {
            ifa_prefered: forever(addr.preferred_lft),
            ifa_valid: forever(addr.valid_lft),
            ..Default::default()
        };
        b.attr(ifa_attr::CACHEINFO, zerocopy::IntoBytes::as_bytes(&ci));
    }
}

/// Encode an `RTM_DELADDR` body for link `index`.
pub fn encode_delete(b: &mut MessageBuilder, addr: &Address, index: u32) {
    b.header(&header(addr, index));
    encode_key(b, addr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::connection::ack_request;
    use crate::netlink::message::{NLMSG_HDRLEN, msg_type};
    use crate::types::address::ifa;

    fn round_trip(addr: &Address) -> Address {
        let mut b = ack_request(msg_type::RTM_NEWADDR, 0);
        encode_add(&mut b, addr, 3);
        decode(&b.finish()[NLMSG_HDRLEN..]).unwrap()
    }

    #[test]
    fn test_plain_address() {
        let mut addr = Address::new("10.0.0.1/24".parse().unwrap(), "eth0");
        addr.broadcast = Some("10.0.0.255".parse().unwrap());
        addr.label = Some("eth0:1".into());
        addr.flags = ifa::PERMANENT;
        let got = round_trip(&addr);
        assert_eq!(got.index, 3);
        assert_eq!(got.local, addr.local);
        assert_eq!(got.peer, None);
        assert_eq!(got.broadcast, addr.broadcast);
        assert_eq!(got.label.as_deref(), Some("eth0:1"));
        assert!(got.is_permanent());
        assert_eq!(got.valid_lft, INFINITY_LIFE_TIME);
    }

    #[test]
    fn test_peer_sets_prefix() {
        let mut addr = Address::new("10.0.0.1/32".parse().unwrap(), "ppp0");
        addr.peer = Some("10.0.0.2/30".parse().unwrap());
        let got = round_trip(&addr);
        assert_eq!(got.local.addr(), addr.local.addr());
        assert_eq!(got.local.prefix_len(), 30);
        assert_eq!(got.peer.map(|p| p.addr()), Some("10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn test_lifetime_zero_means_forever() {
        let mut addr = Address::new("2001:db8::1/64".parse().unwrap(), "eth0");
        addr.valid_lft = 300;
        let got = round_trip(&addr);
        assert_eq!((got.valid_lft, got.preferred_lft), (300, INFINITY_LIFE_TIME));
    }
}
