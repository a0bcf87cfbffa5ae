//! Netlink message framing and the fixed rtnetlink headers.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::GatewayError;
use crate::gateway::GatewayResult;

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Mirrors `struct nlmsghdr`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    pub nlmsg_len: u32,
    pub nlmsg_type: u16,
    pub nlmsg_flags: u16,
    pub nlmsg_seq: u32,
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.nlmsg_type == msg_type::ERROR
    }

    pub fn is_done(&self) -> bool {
        self.nlmsg_type == msg_type::DONE
    }
}

/// Netlink and rtnetlink message types.
pub mod msg_type {
    pub const NOOP: u16 = 1;
    pub const ERROR: u16 = 2;
    pub const DONE: u16 = 3;
    pub const OVERRUN: u16 = 4;

    pub const RTM_NEWLINK: u16 = 16;
    pub const RTM_DELLINK: u16 = 17;
    pub const RTM_GETLINK: u16 = 18;

    pub const RTM_NEWADDR: u16 = 20;
    pub const RTM_DELADDR: u16 = 21;
    pub const RTM_GETADDR: u16 = 22;

    pub const RTM_NEWROUTE: u16 = 24;
    pub const RTM_DELROUTE: u16 = 25;
    pub const RTM_GETROUTE: u16 = 26;

    pub const RTM_NEWNEIGH: u16 = 28;
    pub const RTM_DELNEIGH: u16 = 29;
    pub const RTM_GETNEIGH: u16 = 30;
}

pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;
pub const NLM_F_DUMP_INTR: u16 = 0x10;

// GET modifiers
pub const NLM_F_ROOT: u16 = 0x100;
pub const NLM_F_MATCH: u16 = 0x200;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

// NEW modifiers
pub const NLM_F_REPLACE: u16 = 0x100;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;
pub const NLM_F_APPEND: u16 = 0x800;

/// Copy a fixed header off the front of `data`.
pub fn read_header<T: FromBytes + KnownLayout + Immutable + Copy>(data: &[u8]) -> GatewayResult<T> {
    T::read_from_prefix(data)
        .map(|(h, _)| h)
        .map_err(|_| {
            GatewayError::Malformed(format!(
                "need {} header bytes, got {}",
                std::mem::size_of::<T>(),
                data.len()
            ))
        })
}

/// Iterator over the messages packed in one datagram.
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    /// The header and the payload that follows it.
    type Item = GatewayResult<(NlMsgHdr, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLMSG_HDRLEN {
            return None;
        }
        let header: NlMsgHdr = match read_header(self.data) {
            Ok(h) => h,
            Err(e) => return Some(Err(e)),
        };
        let len = header.nlmsg_len as usize;
        if len < NLMSG_HDRLEN || len > self.data.len() {
            self.data = &[];
            return Some(Err(GatewayError::Malformed(format!(
                "invalid message length: {len}"
            ))));
        }
        let payload = &self.data[NLMSG_HDRLEN..len];
        let aligned = nlmsg_align(len).min(self.data.len());
        self.data = &self.data[aligned..];
        Some(Ok((header, payload)))
    }
}

/// The errno that opens an `NLMSG_ERROR` payload; 0 is an ACK.
pub fn error_code(payload: &[u8]) -> GatewayResult<i32> {
    let code: [u8; 4] = read_header(payload)?;
    Ok(i32::from_ne_bytes(code))
}

/// Mirrors `struct ifinfomsg`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub ifi_pad: u8,
    pub ifi_type: u16,
    pub ifi_index: i32,
    pub ifi_flags: u32,
    pub ifi_change: u32,
}

impl IfInfoMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn with_index(index: u32) -> Self {
        Self {
            ifi_index: index as i32,
            ..Default::default()
        }
    }
}

/// Mirrors `struct ifaddrmsg`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfAddrMsg {
    pub ifa_family: u8,
    pub ifa_prefixlen: u8,
    pub ifa_flags: u8,
    pub ifa_scope: u8,
    pub ifa_index: u32,
}

impl IfAddrMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Mirrors `struct ifa_cacheinfo`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfaCacheInfo {
    pub ifa_prefered: u32,
    pub ifa_valid: u32,
    pub cstamp: u32,
    pub tstamp: u32,
}

/// Mirrors `struct rtmsg`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtMsg {
    pub rtm_family: u8,
    pub rtm_dst_len: u8,
    pub rtm_src_len: u8,
    pub rtm_tos: u8,
    pub rtm_table: u8,
    pub rtm_protocol: u8,
    pub rtm_scope: u8,
    pub rtm_type: u8,
    pub rtm_flags: u32,
}

impl RtMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Mirrors `struct rtnexthop`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtNextHop {
    pub rtnh_len: u16,
    pub rtnh_flags: u8,
    pub rtnh_hops: u8,
    pub rtnh_ifindex: i32,
}

impl RtNextHop {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Mirrors `struct ndmsg`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NdMsg {
    pub ndm_family: u8,
    pub ndm_pad1: u8,
    pub ndm_pad2: u16,
    pub ndm_ifindex: i32,
    pub ndm_state: u16,
    pub ndm_flags: u8,
    pub ndm_type: u8,
}

impl NdMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// The leading counters of `struct rtnl_link_stats64`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct LinkStats64 {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub multicast: u64,
    pub collisions: u64,
    pub rx_length_errors: u64,
    pub rx_over_errors: u64,
    pub rx_crc_errors: u64,
    pub rx_frame_errors: u64,
    pub rx_fifo_errors: u64,
    pub rx_missed_errors: u64,
    pub tx_aborted_errors: u64,
    pub tx_carrier_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(msg_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut hdr = NlMsgHdr::new(msg_type, 0);
        hdr.nlmsg_len = (NLMSG_HDRLEN + payload.len()) as u32;
        let mut buf = hdr.as_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf.resize(nlmsg_align(buf.len()), 0);
        buf
    }

    #[test]
    fn test_header_sizes() {
        assert_eq!(NLMSG_HDRLEN, 16);
        assert_eq!(IfInfoMsg::SIZE, 16);
        assert_eq!(IfAddrMsg::SIZE, 8);
        assert_eq!(RtMsg::SIZE, 12);
        assert_eq!(NdMsg::SIZE, 12);
        assert_eq!(RtNextHop::SIZE, 8);
    }

    #[test]
    fn test_iterates_packed_messages() {
        let mut data = frame(msg_type::RTM_NEWLINK, &[1, 2, 3]);
        data.extend(frame(msg_type::DONE, &0i32.to_ne_bytes()));
        let msgs: Vec<_> = MessageIter::new(&data).collect::<GatewayResult<_>>().unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].0.nlmsg_type, msg_type::RTM_NEWLINK);
        assert_eq!(msgs[0].1, [1, 2, 3]);
        assert!(msgs[1].0.is_done());
    }

    #[test]
    fn test_rejects_bad_length() {
        let mut data = frame(msg_type::RTM_NEWLINK, &[0; 4]);
        data[0] = 200;
        let first = MessageIter::new(&data).next().unwrap();
        assert!(matches!(first, Err(GatewayError::Malformed(_))));
    }

    #[test]
    fn test_error_code() {
        assert_eq!(error_code(&(-17i32).to_ne_bytes()).unwrap(), -17);
        assert!(error_code(&[0, 0]).is_err());
    }
}
