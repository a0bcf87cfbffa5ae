//! Attribute (`rtattr`/`nlattr`) parsing.
//!
//! Attributes are walked with winnow combinators over the payload that
//! follows a fixed header. Decoding is lenient: a truncated trailing
//! attribute ends the walk instead of failing the whole message.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use crate::error::GatewayError;
use crate::gateway::GatewayResult;

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

pub const NLA_ALIGNTO: usize = 4;
pub const NLA_HDRLEN: usize = 4;

pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

fn cut() -> ErrMode<ContextError> {
    ErrMode::Cut(ContextError::new())
}

/// Parse a native-endian u16.
pub fn ne_u16(input: &mut &[u8]) -> PResult<u16> {
    let b: &[u8] = take(2usize).parse_next(input)?;
    Ok(u16::from_ne_bytes([b[0], b[1]]))
}

/// Parse one attribute, returning its type (flags masked off) and payload.
pub fn parse_attr<'a>(input: &mut &'a [u8]) -> PResult<(u16, &'a [u8])> {
    let len = ne_u16(input)? as usize;
    let kind = ne_u16(input)?;
    if len < NLA_HDRLEN {
        return Err(cut());
    }
    let payload: &[u8] = take(len - NLA_HDRLEN).parse_next(input)?;
    let padding = (nla_align(len) - len).min(input.len());
    let _: &[u8] = take(padding).parse_next(input)?;
    Ok((kind & NLA_TYPE_MASK, payload))
}

/// Walk every attribute in `data`.
pub fn attrs(data: &[u8]) -> Vec<(u16, &[u8])> {
    let mut input = data;
    let mut out = Vec::new();
    while input.len() >= NLA_HDRLEN {
        match parse_attr(&mut input) {
            Ok(attr) => out.push(attr),
            Err(_) => break,
        }
    }
    out
}

/// Typed views of attribute payloads.
pub mod get {
    use super::*;

    fn short(what: &str, data: &[u8]) -> GatewayError {
        GatewayError::Malformed(format!("truncated {what} attribute ({} bytes)", data.len()))
    }

    pub fn u8(data: &[u8]) -> GatewayResult<u8> {
        data.first().copied().ok_or_else(|| short("u8", data))
    }

    pub fn u16(data: &[u8]) -> GatewayResult<u16> {
        let mut input = data;
        ne_u16(&mut input).map_err(|_| short("u16", data))
    }

    pub fn u16_be(data: &[u8]) -> GatewayResult<u16> {
        match data {
            [a, b, ..] => Ok(u16::from_be_bytes([*a, *b])),
            _ => Err(short("u16", data)),
        }
    }

    pub fn u32(data: &[u8]) -> GatewayResult<u32> {
        match data {
            [a, b, c, d, ..] => Ok(u32::from_ne_bytes([*a, *b, *c, *d])),
            _ => Err(short("u32", data)),
        }
    }

    pub fn u32_be(data: &[u8]) -> GatewayResult<u32> {
        u32(data).map(u32::from_be)
    }

    pub fn u64(data: &[u8]) -> GatewayResult<u64> {
        let bytes: [u8; 8] = data
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| short("u64", data))?;
        Ok(u64::from_ne_bytes(bytes))
    }

    /// A string up to the first NUL.
    pub fn string(data: &[u8]) -> GatewayResult<String> {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..end])
            .map(str::to_string)
            .map_err(|e| GatewayError::Malformed(format!("invalid UTF-8: {e}")))
    }

    /// An address; the family follows from the length.
    pub fn ip(data: &[u8]) -> GatewayResult<IpAddr> {
        match data.len() {
            4 => Ok(IpAddr::V4(Ipv4Addr::new(data[0], data[1], data[2], data[3]))),
            16 => {
                let octets: [u8; 16] = data
                    .try_into()
                    .map_err(|_| short("address", data))?;
                Ok(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            _ => Err(short("address", data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(kind: u16, payload: &[u8]) -> Vec<u8> {
        let mut buf = ((NLA_HDRLEN + payload.len()) as u16).to_ne_bytes().to_vec();
        buf.extend_from_slice(&kind.to_ne_bytes());
        buf.extend_from_slice(payload);
        buf.resize(nla_align(buf.len()), 0);
        buf
    }

    #[test]
    fn test_walks_padded_attributes() {
        let mut data = attr(3, b"eth0\0");
        data.extend(attr(4, &1500u32.to_ne_bytes()));
        data.extend(attr(18 | NLA_F_NESTED, &[]));
        let found = attrs(&data);
        assert_eq!(found.len(), 3);
        assert_eq!(get::string(found[0].1).unwrap(), "eth0");
        assert_eq!(get::u32(found[1].1).unwrap(), 1500);
        assert_eq!(found[2].0, 18);
    }

    #[test]
    fn test_truncated_tail_is_dropped() {
        let mut data = attr(4, &1500u32.to_ne_bytes());
        data.extend_from_slice(&[40, 0, 1, 0]);
        assert_eq!(attrs(&data).len(), 1);
    }

    #[test]
    fn test_typed_getters() {
        assert_eq!(get::u16_be(&[0x12, 0xb5]).unwrap(), 4789);
        assert_eq!(get::ip(&[10, 0, 0, 1]).unwrap().to_string(), "10.0.0.1");
        assert!(get::ip(&[1, 2, 3]).is_err());
        assert!(get::u64(&[0; 4]).is_err());
        assert!(get::u8(&[]).is_err());
    }
}
