//! Output formatting (text/JSON) for listings.
//!
//! Every listed object implements [`Printable`]. [`print_all`] picks the
//! rendering from [`OutputOptions`]: a JSON array (compact or pretty), or
//! the object's text form, folded onto one line with `-o`.

mod address;
mod event;
mod link;
mod neigh;
mod route;
mod tunnel;
mod tuntap;
mod vrf;
mod xfrm;

pub use address::{AddressBlock, LinkAddresses};
pub use event::{EventLine, XfrmEventLine, write_timestamp};
pub use link::LinkView;
pub use tunnel::TunnelView;
pub use tuntap::TuntapView;
pub use vrf::VrfTable;
pub use xfrm::{PolicyView, StateView};

use std::io::Write;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::Result;

/// Output format options.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    /// Show statistics.
    pub stats: bool,
    /// Show extra details.
    pub details: bool,
    /// Print numbers instead of symbolic names.
    pub numeric: bool,
    /// Print JSON.
    pub json: bool,
    /// Indent JSON.
    pub pretty: bool,
    /// One compact line per object.
    pub brief: bool,
    /// All fields of one object on one line.
    pub oneline: bool,
    /// Human-readable counters.
    pub human: bool,
    /// Use 1024-based units with `human`.
    pub iec: bool,
}

/// Trait for types that can be printed.
pub trait Printable {
    /// Print as plain text, honouring `brief`, `details`, `stats` and `numeric`.
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> std::io::Result<()>;

    /// Convert to a JSON value.
    fn to_json(&self, opts: &OutputOptions) -> serde_json::Value;
}

/// Print a listing in the format `opts` selects.
pub fn print_all<W: Write, T: Printable>(w: &mut W, items: &[T], opts: &OutputOptions) -> Result<()> {
    if opts.json {
        let json: Vec<_> = items.iter().map(|i| i.to_json(opts)).collect();
        return write_json(w, &serde_json::Value::Array(json), opts.pretty);
    }
    for item in items {
        print_one(w, item, opts)?;
    }
    Ok(())
}

/// Print a single object's text form, folding it with `-o`.
pub fn print_one<W: Write, T: Printable>(w: &mut W, item: &T, opts: &OutputOptions) -> Result<()> {
    if opts.oneline && !opts.brief {
        let mut buf = Vec::new();
        item.print_text(&mut buf, opts)?;
        w.write_all(&fold_lines(&buf))?;
    } else {
        item.print_text(w, opts)?;
    }
    Ok(())
}

/// Write one JSON document followed by a newline.
///
/// Pretty mode indents by four spaces.
pub fn write_json<W: Write, T: Serialize + ?Sized>(w: &mut W, value: &T, pretty: bool) -> Result<()> {
    if pretty {
        let mut ser = Serializer::with_formatter(&mut *w, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut ser)?;
    } else {
        serde_json::to_writer(&mut *w, value)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Join the lines of a multi-line block with `\`, as `ip -o` does.
fn fold_lines(text: &[u8]) -> Vec<u8> {
    let body = text.strip_suffix(b"\n").unwrap_or(text);
    let mut out = Vec::with_capacity(text.len() + 1);
    for &b in body {
        if b == b'\n' {
            out.push(b'\\');
        } else {
            out.push(b);
        }
    }
    out.push(b'\n');
    out
}

/// Lifetime in seconds, with the infinite value spelled `forever`.
pub fn lifetime(v: u32) -> String {
    if v == u32::MAX {
        "forever".to_string()
    } else {
        format!("{v}sec")
    }
}
