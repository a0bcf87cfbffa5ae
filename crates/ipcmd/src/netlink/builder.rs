//! Request construction.

use std::net::IpAddr;

use bytes::{BufMut, BytesMut};
use zerocopy::{Immutable, IntoBytes};

use super::attr::{NLA_F_NESTED, NLA_HDRLEN, nla_align};
use super::message::{NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};

/// Token returned by [`MessageBuilder::nest_start`].
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct NestToken {
    offset: usize,
}

/// Builds one netlink request in a growing buffer.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    buf: BytesMut,
}

impl MessageBuilder {
    pub fn new(msg_type: u16, flags: u16) -> Self {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_slice(NlMsgHdr::new(msg_type, flags).as_bytes());
        buf.resize(NLMSG_HDRLEN, 0);
        Self { buf }
    }

    fn pad(&mut self, aligned: usize) {
        self.buf.resize(aligned, 0);
    }

    /// Append a fixed header such as `ifinfomsg`.
    pub fn header<T: IntoBytes + Immutable>(&mut self, header: &T) {
        self.buf.put_slice(header.as_bytes());
        let aligned = nlmsg_align(self.buf.len());
        self.pad(aligned);
    }

    /// Append raw payload bytes without an attribute header.
    pub fn raw(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    pub fn attr(&mut self, kind: u16, data: &[u8]) {
        self.buf.put_u16_ne((NLA_HDRLEN + data.len()) as u16);
        self.buf.put_u16_ne(kind);
        self.buf.put_slice(data);
        let aligned = nla_align(self.buf.len());
        self.pad(aligned);
    }

    pub fn attr_flag(&mut self, kind: u16) {
        self.attr(kind, &[]);
    }

    pub fn attr_u8(&mut self, kind: u16, value: u8) {
        self.attr(kind, &[value]);
    }

    pub fn attr_u16(&mut self, kind: u16, value: u16) {
        self.attr(kind, &value.to_ne_bytes());
    }

    pub fn attr_u16_be(&mut self, kind: u16, value: u16) {
        self.attr(kind, &value.to_be_bytes());
    }

    pub fn attr_u32(&mut self, kind: u16, value: u32) {
        self.attr(kind, &value.to_ne_bytes());
    }

    pub fn attr_u32_be(&mut self, kind: u16, value: u32) {
        self.attr(kind, &value.to_be_bytes());
    }

    /// NUL-terminated string.
    pub fn attr_str(&mut self, kind: u16, value: &str) {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        self.attr(kind, &data);
    }

    pub fn attr_ip(&mut self, kind: u16, addr: &IpAddr) {
        match addr {
            IpAddr::V4(a) => self.attr(kind, &a.octets()),
            IpAddr::V6(a) => self.attr(kind, &a.octets()),
        }
    }

    pub fn nest_start(&mut self, kind: u16) -> NestToken {
        let offset = self.buf.len();
        self.buf.put_u16_ne(NLA_HDRLEN as u16);
        self.buf.put_u16_ne(kind | NLA_F_NESTED);
        NestToken { offset }
    }

    pub fn nest_end(&mut self, token: NestToken) {
        let len = (self.buf.len() - token.offset) as u16;
        self.buf[token.offset..token.offset + 2].copy_from_slice(&len.to_ne_bytes());
        let aligned = nla_align(self.buf.len());
        self.pad(aligned);
    }

    /// Current length, used to frame `rtnexthop` entries in place.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == NLMSG_HDRLEN
    }

    /// Overwrite a native-endian u16 at `offset`.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        self.buf[offset..offset + 2].copy_from_slice(&value.to_ne_bytes());
    }

    pub fn set_seq(&mut self, seq: u32) {
        self.buf[8..12].copy_from_slice(&seq.to_ne_bytes());
    }

    pub fn set_pid(&mut self, pid: u32) {
        self.buf[12..16].copy_from_slice(&pid.to_ne_bytes());
    }

    /// Write the final length and hand out the bytes.
    pub fn finish(mut self) -> BytesMut {
        let len = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&len.to_ne_bytes());
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::{attrs, get};
    use crate::netlink::message::{IfInfoMsg, NLM_F_REQUEST, read_header};

    #[test]
    fn test_header_only() {
        let msg = MessageBuilder::new(16, NLM_F_REQUEST).finish();
        assert_eq!(msg.len(), NLMSG_HDRLEN);
        let hdr: NlMsgHdr = read_header(&msg).unwrap();
        assert_eq!(hdr.nlmsg_len as usize, NLMSG_HDRLEN);
        assert_eq!((hdr.nlmsg_type, hdr.nlmsg_flags), (16, NLM_F_REQUEST));
    }

    #[test]
    fn test_attributes_are_aligned() {
        let mut b = MessageBuilder::new(16, NLM_F_REQUEST);
        b.header(&IfInfoMsg::with_index(3));
        b.attr_str(3, "eth0");
        b.attr_u32(4, 9000);
        let msg = b.finish();
        assert_eq!(msg.len() % 4, 0);
        let found = attrs(&msg[NLMSG_HDRLEN + IfInfoMsg::SIZE..]);
        assert_eq!(found.len(), 2);
        assert_eq!(get::string(found[0].1).unwrap(), "eth0");
        assert_eq!(get::u32(found[1].1).unwrap(), 9000);
    }

    #[test]
    fn test_nested_length() {
        let mut b = MessageBuilder::new(16, NLM_F_REQUEST);
        let nest = b.nest_start(18);
        b.attr_str(1, "vrf");
        b.nest_end(nest);
        let msg = b.finish();
        let outer = attrs(&msg[NLMSG_HDRLEN..]);
        assert_eq!(outer.len(), 1);
        assert_eq!(outer[0].0, 18);
        let inner = attrs(outer[0].1);
        assert_eq!(get::string(inner[0].1).unwrap(), "vrf");
    }
}
