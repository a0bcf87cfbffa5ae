//! `ip vrf`: VRF devices and their members.

use std::io::Write;

use super::{GatewayContext, expect_end, subcommand, write_help};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::gateway::{Gateway, LinkChange};
use crate::help;
use crate::options::Options;
use crate::output::VrfTable;
use crate::parse::parse_u32;
use crate::types::{Link, LinkKind};

const SUBCOMMANDS: &[&str] = &["show", "list", "add", "delete", "del", "enslave", "release", "help"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VrfCommand {
    Show(Option<String>),
    Add { name: String, table: u32 },
    Delete(String),
    Enslave { dev: String, vrf: String },
    Release(String),
    Help,
}

pub fn parse(c: &mut Cursor) -> Result<VrfCommand> {
    let Some(sub) = subcommand(c, SUBCOMMANDS)? else {
        return Ok(VrfCommand::Show(None));
    };
    let cmd = match sub {
        "show" | "list" => {
            let name = if c.tokens_remain() {
                Some(c.next_token(&["NAME"])?)
            } else {
                None
            };
            VrfCommand::Show(name)
        }
        "add" => {
            let name = c.next_token(&["NAME"])?;
            if c.next_token(&["table"])? != "table" {
                return Err(c.usage());
            }
            let table = parse_u32(c, "table")?;
            VrfCommand::Add { name, table }
        }
        "delete" | "del" => VrfCommand::Delete(c.next_token(&["NAME"])?),
        "enslave" => {
            let dev = c.next_token(&["DEV"])?;
            let vrf = c.next_token(&["NAME"])?;
            VrfCommand::Enslave { dev, vrf }
        }
        "release" => VrfCommand::Release(c.next_token(&["DEV"])?),
        _ => VrfCommand::Help,
    };
    expect_end(c)?;
    Ok(cmd)
}

fn vrf_table(link: &Link) -> Option<u32> {
    match link.kind {
        LinkKind::Vrf { table } => Some(table),
        _ => None,
    }
}

/// Fail unless `name` is an existing VRF device.
async fn require_vrf<G: Gateway>(gw: &G, name: &str) -> Result<()> {
    let links = gw.links().await.context("listing links")?;
    match links.iter().find(|l| l.name == name) {
        Some(l) if vrf_table(l).is_some() => Ok(()),
        Some(_) => Err(Error::invalid(format!("{name} is not a VRF"))),
        None => Err(Error::invalid(format!("VRF {name} does not exist"))),
    }
}

pub async fn execute<G: Gateway, W: Write>(
    cmd: VrfCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        VrfCommand::Show(name) => {
            let links = gw.links().await.context("listing links")?;
            let mut table = VrfTable::default();
            for link in &links {
                if let Some(id) = vrf_table(link)
                    && name.as_ref().is_none_or(|n| *n == link.name)
                {
                    table.push(link.name.clone(), id);
                }
            }
            if let Some(name) = &name
                && table.rows.is_empty()
            {
                return Err(Error::invalid(format!("VRF {name} does not exist")));
            }
            table.print(out, &opts.output)
        }
        VrfCommand::Add { name, table } => {
            let link = Link {
                kind: LinkKind::Vrf { table },
                ..Link::named(&name)
            };
            gw.add_link(&link)
                .await
                .context(format!("adding vrf {name}"))
        }
        VrfCommand::Delete(name) => {
            require_vrf(gw, &name).await?;
            gw.delete_link(&name)
                .await
                .context(format!("deleting vrf {name}"))
        }
        VrfCommand::Enslave { dev, vrf } => {
            require_vrf(gw, &vrf).await?;
            gw.apply_link_change(&dev, &LinkChange::Master(vrf.clone()))
                .await
                .context(format!("enslaving {dev} to vrf {vrf}"))
        }
        VrfCommand::Release(dev) => gw
            .apply_link_change(&dev, &LinkChange::NoMaster)
            .await
            .context(format!("releasing {dev}")),
        VrfCommand::Help => write_help(out, help::VRF),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::{cursor, opts, text};
    use crate::gateway::MemoryGateway;

    fn parse_str(args: &str) -> Result<VrfCommand> {
        let mut c = cursor(args);
        c.next_token(&[]).unwrap();
        parse(&mut c)
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_str("vrf").unwrap(), VrfCommand::Show(None));
        assert_eq!(
            parse_str("vrf add blue table 10").unwrap(),
            VrfCommand::Add {
                name: "blue".into(),
                table: 10
            }
        );
        assert_eq!(
            parse_str("vrf enslave eth0 blue").unwrap(),
            VrfCommand::Enslave {
                dev: "eth0".into(),
                vrf: "blue".into()
            }
        );
        assert!(parse_str("vrf add blue").unwrap_err().is_usage());
        assert!(parse_str("vrf add blue tabel 10").unwrap_err().is_usage());
        assert!(parse_str("vrf release eth0 extra").unwrap_err().is_usage());
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let gw = MemoryGateway::new().with_link(Link::named("eth0"));
        for args in ["vrf add blue table 10", "vrf add red table 20", "vrf enslave eth0 blue"] {
            execute(parse_str(args).unwrap(), &opts(), &gw, &mut Vec::new())
                .await
                .unwrap();
        }
        let links = gw.snapshot_links();
        let blue = links.iter().find(|l| l.name == "blue").unwrap();
        let eth0 = links.iter().find(|l| l.name == "eth0").unwrap();
        assert_eq!(eth0.master, Some(blue.index));

        let mut out = Vec::new();
        execute(parse_str("vrf show").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap();
        assert_eq!(
            text(out),
            "Name              Table\n-----------------------\nblue                10\nred                 20\n"
        );

        let err = execute(parse_str("vrf enslave eth0 eth0").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "eth0 is not a VRF");

        execute(parse_str("vrf release eth0").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap();
        execute(parse_str("vrf delete red").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap();
        let err = execute(parse_str("vrf show red").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "VRF red does not exist");
        assert_eq!(gw.snapshot_links().iter().find(|l| l.name == "eth0").unwrap().master, None);
    }
}
