//! Object grammars and their execution.
//!
//! Each object module exposes the same pair: `parse` turns the remaining
//! tokens into a typed command, `execute` runs it against a
//! [`Gateway`](crate::gateway::Gateway) and writes to the injected writer.
//! The dispatcher glues them together.

pub mod address;
pub mod link;
pub mod monitor;
pub mod neigh;
pub mod route;
pub mod tunnel;
pub mod tuntap;
pub mod vrf;
pub mod xfrm;

use std::io::Write;

use crate::cursor::{Cursor, find_prefix};
use crate::error::{Error, GatewayError, Result};
use crate::types::Link;

/// Attach the failed operation to a gateway error.
pub(crate) trait GatewayContext<T> {
    fn context(self, operation: impl Into<String>) -> Result<T>;
}

impl<T> GatewayContext<T> for std::result::Result<T, GatewayError> {
    fn context(self, operation: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::gateway(operation, e))
    }
}

/// Resolve the next token against `candidates`.
///
/// `None` when no tokens are left, a usage error when the token matches
/// nothing (or more than one candidate).
pub(crate) fn subcommand(c: &mut Cursor, candidates: &[&'static str]) -> Result<Option<&'static str>> {
    if !c.tokens_remain() {
        return Ok(None);
    }
    let tok = c.next_token(candidates)?;
    find_prefix(&tok, candidates).map(Some).ok_or_else(|| c.usage())
}

/// Fail on any token left over.
pub(crate) fn expect_end(c: &mut Cursor) -> Result<()> {
    if c.tokens_remain() {
        c.next_token(&[])?;
        return Err(c.usage());
    }
    Ok(())
}

pub(crate) fn write_help<W: Write>(out: &mut W, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())?;
    Ok(())
}

/// Name of `link`'s master device, if it has one among `links`.
pub(crate) fn master_name<'a>(links: &'a [Link], link: &Link) -> Option<&'a str> {
    let index = link.master?;
    links
        .iter()
        .find(|l| l.index == index)
        .map(|l| l.name.as_str())
}

/// `on`/`off` switch value.
pub(crate) fn parse_on_off(c: &mut Cursor) -> Result<bool> {
    crate::parse::parse_bool(c, "on", "off")
}
