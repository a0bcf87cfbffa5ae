//! `ip tunnel`: point-to-point IP tunnels, managed as links.

use std::io::Write;

use super::{GatewayContext, subcommand, write_help};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::filter::tunnel_matches;
use crate::gateway::Gateway;
use crate::help;
use crate::options::Options;
use crate::output::{TunnelView, print_all};
use crate::parse::{ip_from_str, parse_u8, parse_u16};
use crate::types::{Link, TunnelMode, TunnelParams};

const SUBCOMMANDS: &[&str] = &["add", "del", "show", "help"];

const OPTIONS: &[&str] = &[
    "name", "mode", "remote", "local", "ttl", "tos", "ikey", "okey", "dev",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TunnelCommand {
    Add(TunnelParams),
    Delete(TunnelParams),
    Show(TunnelParams),
    Help,
}

pub fn parse(c: &mut Cursor) -> Result<TunnelCommand> {
    let Some(sub) = subcommand(c, SUBCOMMANDS)? else {
        return Ok(TunnelCommand::Show(TunnelParams::default()));
    };
    Ok(match sub {
        "add" => TunnelCommand::Add(parse_params(c)?),
        "del" => TunnelCommand::Delete(parse_params(c)?),
        "show" => TunnelCommand::Show(parse_params(c)?),
        _ => TunnelCommand::Help,
    })
}

/// `IP | any`; `any` leaves the endpoint unset.
fn parse_endpoint(c: &mut Cursor) -> Result<Option<std::net::IpAddr>> {
    let tok = c.next_token(&["IP_ADDRESS", "any"])?;
    if tok == "any" {
        return Ok(None);
    }
    ip_from_str(&tok).map(Some)
}

fn parse_params(c: &mut Cursor) -> Result<TunnelParams> {
    let mut p = TunnelParams::default();
    while c.tokens_remain() {
        let tok = c.next_token(OPTIONS)?;
        match tok.as_str() {
            "name" => p.name = Some(c.next_token(&["NAME"])?),
            "mode" => {
                let m = c.next_token(TunnelMode::NAMES)?;
                let mode = TunnelMode::from_name(&m)
                    .ok_or_else(|| Error::invalid(format!("invalid mode {m}")))?;
                p.mode = Some(mode);
                p.kinds.extend_from_slice(mode.show_kinds());
            }
            "remote" => p.remote = parse_endpoint(c)?,
            "local" => p.local = parse_endpoint(c)?,
            "ttl" => {
                p.ttl = if c.peek_token(&["TTL (0...255)", "inherit"]) == Some("inherit") {
                    c.next_token(&[])?;
                    0
                } else {
                    i32::from(parse_u8(c, "TTL (0...255) | inherit")?)
                };
            }
            "tos" => p.tos = i32::from(parse_u8(c, "TOS (0...255)")?),
            "ikey" => p.ikey = i32::from(parse_u16(c, "KEY")?),
            "okey" => p.okey = i32::from(parse_u16(c, "KEY")?),
            "dev" => p.dev = Some(c.next_token(&["PHYS_DEV"])?),
            _ if p.name.is_none() => p.name = Some(tok),
            _ => return Err(c.usage()),
        }
    }
    Ok(p)
}

pub async fn execute<G: Gateway, W: Write>(
    cmd: TunnelCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        TunnelCommand::Add(p) => {
            let mode = p.mode.ok_or_else(|| Error::invalid("tunnel mode is required"))?;
            let name = p.name.clone().unwrap_or_else(|| mode.default_name().to_string());
            let link = Link {
                kind: mode.link_kind(p.info()),
                ..Link::named(name)
            };
            gw.add_link(&link)
                .await
                .context(format!("adding tunnel {}", link.name))
        }
        TunnelCommand::Delete(p) => {
            let name = p.name.ok_or_else(|| Error::invalid("tunnel name is required"))?;
            gw.delete_link(&name)
                .await
                .context(format!("deleting tunnel {name}"))
        }
        TunnelCommand::Show(p) => {
            let links = gw.links().await.context("listing links")?;
            let views: Vec<TunnelView<'_>> = links
                .iter()
                .filter(|l| tunnel_matches(l, &p))
                .map(TunnelView)
                .collect();
            print_all(out, &views, &opts.output)
        }
        TunnelCommand::Help => write_help(out, help::TUNNEL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::{cursor, opts, text};
    use crate::gateway::MemoryGateway;
    use crate::types::LinkKind;

    fn parse_str(args: &str) -> Result<TunnelCommand> {
        let mut c = cursor(args);
        c.next_token(&[]).unwrap();
        parse(&mut c)
    }

    #[test]
    fn test_parse_params() {
        let TunnelCommand::Add(p) =
            parse_str("tunnel add gre1 mode gre remote 10.0.0.2 local any ttl inherit tos 4 ikey 7 dev eth0").unwrap()
        else {
            panic!("expected add");
        };
        assert_eq!(p.name.as_deref(), Some("gre1"));
        assert_eq!(p.mode, Some(TunnelMode::Gre));
        assert_eq!(p.kinds, ["gre", "ip6gre"]);
        assert_eq!(p.remote, Some("10.0.0.2".parse().unwrap()));
        assert_eq!(p.local, None);
        assert_eq!((p.ttl, p.tos, p.ikey, p.okey), (0, 4, 7, -1));
        assert_eq!(p.dev.as_deref(), Some("eth0"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_str("tunnel add mode nope").unwrap_err().to_string(),
            "invalid mode nope"
        );
        assert!(parse_str("tunnel show ttl 300").is_err());
        assert!(parse_str("tunnel invalid").unwrap_err().is_usage());
        assert!(parse_str("tunnel show a b").unwrap_err().is_usage());
        assert_eq!(parse_str("tunnel").unwrap(), TunnelCommand::Show(TunnelParams::default()));
    }

    #[tokio::test]
    async fn test_add_requires_mode_and_defaults_name() {
        let gw = MemoryGateway::new();
        let err = execute(parse_str("tunnel add t0").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "tunnel mode is required");

        execute(parse_str("tunnel add mode ipip remote 1.1.1.1").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap();
        let links = gw.snapshot_links();
        assert_eq!(links[0].name, "tunl0");
        assert!(matches!(links[0].kind, LinkKind::Ipip(_)));

        let err = execute(parse_str("tunnel del").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "tunnel name is required");
        execute(parse_str("tunnel del tunl0").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap();
        assert!(gw.snapshot_links().is_empty());
    }

    #[tokio::test]
    async fn test_show_filters_by_mode() {
        let gw = MemoryGateway::new();
        for args in [
            "tunnel add gre1 mode gre remote 10.0.0.2 local 10.0.0.1 ttl 64",
            "tunnel add sit1 mode sit",
        ] {
            execute(parse_str(args).unwrap(), &opts(), &gw, &mut Vec::new())
                .await
                .unwrap();
        }
        let mut out = Vec::new();
        execute(parse_str("tunnel show").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap();
        assert_eq!(
            text(out),
            "gre1: gre/ip remote 10.0.0.2 local 10.0.0.1 ttl 64\n\
             sit1: sit/ip remote any local any ttl inherit\n"
        );
        let mut out = Vec::new();
        execute(parse_str("tunnel show mode sit").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap();
        assert_eq!(text(out), "sit1: sit/ip remote any local any ttl inherit\n");
    }
}
