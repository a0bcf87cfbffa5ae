//! Value parsers shared by the object grammars.
//!
//! Each parser pulls what it needs from the [`Cursor`] and records a hint,
//! so a failure inside a value still reports what was expected.

use std::net::IpAddr;

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::types::{HardwareAddr, IpNet};

/// An IP address, optionally preceded by the `address` keyword.
pub fn parse_address(c: &mut Cursor) -> Result<IpAddr> {
    let mut tok = c.next_token(&["address", "IP"])?;
    if tok == "address" {
        tok = c.next_token(&["IP"])?;
    }
    ip_from_str(&tok)
}

pub fn ip_from_str(s: &str) -> Result<IpAddr> {
    s.parse()
        .map_err(|_| Error::invalid(format!("invalid IP address: {s}")))
}

/// A CIDR prefix with the host bits cleared.
pub fn parse_ipnet(c: &mut Cursor) -> Result<IpNet> {
    let tok = c.next_token(&["CIDR format address"])?;
    let net: IpNet = tok.parse().map_err(Error::Invalid)?;
    Ok(net.network())
}

/// A CIDR prefix that keeps the host bits, as used for address assignment.
pub fn parse_prefix(c: &mut Cursor) -> Result<IpNet> {
    let tok = c.next_token(&["CIDR format address"])?;
    prefix_from_str(&tok)
}

/// A plain address becomes a host prefix.
pub fn prefix_from_str(s: &str) -> Result<IpNet> {
    if s.contains('/') {
        s.parse().map_err(Error::Invalid)
    } else {
        Ok(IpNet::host(ip_from_str(s)?))
    }
}

/// Either a bare IP or a CIDR prefix.
///
/// A prefix yields the address as written plus the masked network.
pub fn parse_address_or_cidr(c: &mut Cursor) -> Result<(IpAddr, Option<IpNet>)> {
    let tok = c.next_token(&["IP", "CIDR"])?;
    if tok.contains('/') {
        let net: IpNet = tok.parse().map_err(Error::Invalid)?;
        return Ok((net.addr(), Some(net.network())));
    }
    Ok((ip_from_str(&tok)?, None))
}

pub fn parse_hardware_address(c: &mut Cursor) -> Result<HardwareAddr> {
    let tok = c.next_token(&["<MAC address>"])?;
    tok.parse().map_err(Error::Invalid)
}

/// Hex key material with an optional `0x` prefix.
pub fn parse_bytes(c: &mut Cursor) -> Result<Vec<u8>> {
    let tok = c.next_token(&["hex string"])?;
    hex_decode(&tok)
}

pub fn hex_decode(s: &str) -> Result<Vec<u8>> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let err = || Error::invalid(format!("invalid hex string: {s}"));
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(err());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(err)
        })
        .collect()
}

pub fn parse_int(c: &mut Cursor, name: &str) -> Result<i64> {
    let tok = c.next_token(&[name])?;
    tok.parse()
        .map_err(|_| Error::invalid(format!("invalid {name}: {tok}")))
}

macro_rules! unsigned_parser {
    ($fn:ident, $from:ident, $ty:ty) => {
        pub fn $fn(c: &mut Cursor, name: &str) -> Result<$ty> {
            let tok = c.next_token(&[name])?;
            $from(&tok, name)
        }

        /// Decimal, or hex with a `0x` prefix.
        pub fn $from(s: &str, name: &str) -> Result<$ty> {
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => <$ty>::from_str_radix(hex, 16),
                None => s.parse::<$ty>(),
            };
            parsed.map_err(|_| Error::invalid(format!("invalid {name}: {s}")))
        }
    };
}

unsigned_parser!(parse_u8, u8_from_str, u8);
unsigned_parser!(parse_u16, u16_from_str, u16);
unsigned_parser!(parse_u32, u32_from_str, u32);
unsigned_parser!(parse_u64, u64_from_str, u64);

/// One of two words, e.g. `on`/`off`.
pub fn parse_bool(c: &mut Cursor, yes: &str, no: &str) -> Result<bool> {
    let tok = c.next_token(&[yes, no])?;
    if tok == yes {
        Ok(true)
    } else if tok == no {
        Ok(false)
    } else {
        Err(c.usage())
    }
}

/// A name, optionally preceded by the `name` keyword.
pub fn parse_name(c: &mut Cursor) -> Result<String> {
    let tok = c.next_token(&["name", "NAME"])?;
    if tok == "name" {
        return c.next_token(&["NAME"]);
    }
    Ok(tok)
}

/// A device name, optionally preceded by the `dev` keyword.
pub fn parse_device_name(c: &mut Cursor) -> Result<String> {
    let tok = c.next_token(&["dev", "device name"])?;
    if tok == "dev" {
        return c.next_token(&["device name"]);
    }
    Ok(tok)
}

/// `via ADDR`.
pub fn parse_next_hop(c: &mut Cursor) -> Result<IpAddr> {
    let tok = c.next_token(&["via"])?;
    if tok != "via" {
        return Err(c.usage());
    }
    let addr = c.next_token(&["Gateway IP"])?;
    ip_from_str(&addr)
}

/// Address lifetime: `forever` is 0.
pub fn parse_lifetime(c: &mut Cursor, name: &str) -> Result<u32> {
    let tok = c.next_token(&["forever", "lifetime in seconds"])?;
    if tok == "forever" {
        return Ok(0);
    }
    u32_from_str(&tok, name)
}

/// Set a singly-valued field, rejecting a second assignment.
pub fn set_once<T>(slot: &mut Option<T>, value: T, name: &str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::invalid(format!("duplicate {name}")));
    }
    *slot = Some(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(args: &[&str]) -> Cursor {
        Cursor::new(args.iter().copied())
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address(&mut cursor(&["address", "invalid"])).is_err());
        assert_eq!(
            parse_address(&mut cursor(&["address", "192.168.1.1"])).unwrap(),
            "192.168.1.1".parse::<IpAddr>().unwrap()
        );
        assert_eq!(
            parse_address(&mut cursor(&["fe80::1"])).unwrap(),
            "fe80::1".parse::<IpAddr>().unwrap()
        );
        assert!(parse_address(&mut cursor(&["address"])).is_err());
    }

    #[test]
    fn test_parse_ipnet() {
        assert!(parse_ipnet(&mut cursor(&["invalid"])).is_err());
        let net = parse_ipnet(&mut cursor(&["192.168.1.7/24"])).unwrap();
        assert_eq!(net.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn test_parse_prefix_keeps_host_bits() {
        let net = parse_prefix(&mut cursor(&["127.0.0.1/24"])).unwrap();
        assert_eq!(net.to_string(), "127.0.0.1/24");
        let host = parse_prefix(&mut cursor(&["10.0.0.1"])).unwrap();
        assert_eq!(host.prefix_len(), 32);
    }

    #[test]
    fn test_parse_address_or_cidr() {
        let (ip, net) = parse_address_or_cidr(&mut cursor(&["192.168.1.0/24"])).unwrap();
        assert_eq!(ip.to_string(), "192.168.1.0");
        assert_eq!(net.unwrap().to_string(), "192.168.1.0/24");

        let (ip, net) = parse_address_or_cidr(&mut cursor(&["fe80::1"])).unwrap();
        assert_eq!(ip.to_string(), "fe80::1");
        assert!(net.is_none());

        for bad in ["192.168.1.1/invalid", "fe80::/invalid", "nope"] {
            assert!(parse_address_or_cidr(&mut cursor(&[bad])).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_parse_hardware_address() {
        let mac = parse_hardware_address(&mut cursor(&["01:23:45:67:89:ab"])).unwrap();
        assert_eq!(mac.to_string(), "01:23:45:67:89:ab");
        assert!(parse_hardware_address(&mut cursor(&["invalid"])).is_err());
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(
            parse_bytes(&mut cursor(&["deadbeef"])).unwrap(),
            vec![0xde, 0xad, 0xbe, 0xef]
        );
        assert_eq!(parse_bytes(&mut cursor(&["0x0102"])).unwrap(), vec![1, 2]);
        assert!(parse_bytes(&mut cursor(&["xyz"])).is_err());
        assert!(parse_bytes(&mut cursor(&["abc"])).is_err());
    }

    #[test]
    fn test_parse_integers() {
        assert_eq!(parse_int(&mut cursor(&["-123"]), "value").unwrap(), -123);
        assert!(parse_int(&mut cursor(&["abc"]), "value").is_err());
        assert_eq!(parse_u8(&mut cursor(&["255"]), "ttl").unwrap(), 255);
        assert!(parse_u8(&mut cursor(&["256"]), "ttl").is_err());
        assert_eq!(parse_u16(&mut cursor(&["65535"]), "port").unwrap(), 65535);
        assert_eq!(parse_u32(&mut cursor(&["0x10"]), "spi").unwrap(), 16);
        assert_eq!(
            parse_u64(&mut cursor(&["18446744073709551615"]), "bytes").unwrap(),
            u64::MAX
        );
        assert_eq!(
            parse_u32(&mut cursor(&["-1"]), "mtu").unwrap_err().to_string(),
            "invalid mtu: -1"
        );
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool(&mut cursor(&["true"]), "true", "false").unwrap());
        assert!(!parse_bool(&mut cursor(&["false"]), "true", "false").unwrap());
        assert!(parse_bool(&mut cursor(&["maybe"]), "true", "false").is_err());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_name(&mut cursor(&["name", "eth0"])).unwrap(), "eth0");
        assert_eq!(parse_name(&mut cursor(&["eth0"])).unwrap(), "eth0");
        assert_eq!(parse_device_name(&mut cursor(&["dev", "lo"])).unwrap(), "lo");
        assert_eq!(parse_device_name(&mut cursor(&["lo"])).unwrap(), "lo");
    }

    #[test]
    fn test_parse_next_hop() {
        assert_eq!(
            parse_next_hop(&mut cursor(&["via", "192.168.1.1"])).unwrap(),
            "192.168.1.1".parse::<IpAddr>().unwrap()
        );
        assert!(parse_next_hop(&mut cursor(&["via", "aaa"])).is_err());
        assert!(parse_next_hop(&mut cursor(&["192.168.1.0/24"])).is_err());
    }

    #[test]
    fn test_parse_lifetime() {
        assert_eq!(parse_lifetime(&mut cursor(&["forever"]), "valid_lft").unwrap(), 0);
        assert_eq!(parse_lifetime(&mut cursor(&["10"]), "valid_lft").unwrap(), 10);
        assert!(parse_lifetime(&mut cursor(&["soon"]), "valid_lft").is_err());
    }

    #[test]
    fn test_set_once() {
        let mut slot = None;
        set_once(&mut slot, 1, "tos").unwrap();
        assert_eq!(
            set_once(&mut slot, 2, "tos").unwrap_err().to_string(),
            "duplicate tos"
        );
        assert_eq!(slot, Some(1));
    }
}
