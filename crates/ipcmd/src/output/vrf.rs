//! `ip vrf show` table.

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::output::{OutputOptions, write_json};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VrfRow {
    pub name: String,
    pub table: u32,
}

/// The VRF devices and the routing table each one binds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VrfTable {
    pub rows: Vec<VrfRow>,
}

impl VrfTable {
    pub fn push(&mut self, name: impl Into<String>, table: u32) {
        self.rows.push(VrfRow {
            name: name.into(),
            table,
        });
    }

    pub fn print<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> Result<()> {
        if opts.json {
            return write_json(w, &self.rows, opts.pretty);
        }
        writeln!(w, "Name              Table")?;
        writeln!(w, "-----------------------")?;
        for row in &self.rows {
            writeln!(w, "{:<16} {:>5}", row.name, row.table)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table() {
        let mut table = VrfTable::default();
        table.push("blue", 10);
        table.push("management", 1001);
        let mut out = Vec::new();
        table.print(&mut out, &OutputOptions::default()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Name              Table\n-----------------------\nblue                10\nmanagement        1001\n"
        );
    }

    #[test]
    fn test_json() {
        let mut table = VrfTable::default();
        table.push("blue", 10);
        let opts = OutputOptions {
            json: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        table.print(&mut out, &opts).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "[{\"name\":\"blue\",\"table\":10}]\n");
    }
}
