//! `ip tuntap`: persistent TUN/TAP devices.

use std::io::Write;

use super::{GatewayContext, subcommand, write_help};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::help;
use crate::options::Options;
use crate::output::{TuntapView, print_all};
use crate::parse::u32_from_str;
use crate::types::tuntap::tun_flags;
use crate::types::{Tuntap, TuntapMode};

const SUBCOMMANDS: &[&str] = &["add", "del", "show", "list", "help"];

const OPTIONS: &[&str] = &[
    "mode",
    "user",
    "group",
    "name",
    "dev",
    "one_queue",
    "pi",
    "vnet_hdr",
    "multi_queue",
];

/// Parsed `ip tuntap` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct TuntapArgs {
    pub dev: Tuntap,
    /// Whether `mode` was given, so `show` filters on it.
    pub mode_given: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TuntapCommand {
    Add(Tuntap),
    Delete(Tuntap),
    Show(TuntapArgs),
    Help,
}

pub fn parse(c: &mut Cursor) -> Result<TuntapCommand> {
    let Some(sub) = subcommand(c, SUBCOMMANDS)? else {
        return Ok(TuntapCommand::Show(parse_args(c)?));
    };
    Ok(match sub {
        "add" => TuntapCommand::Add(parse_args(c)?.dev),
        "del" => TuntapCommand::Delete(parse_args(c)?.dev),
        "show" | "list" => TuntapCommand::Show(parse_args(c)?),
        _ => TuntapCommand::Help,
    })
}

fn parse_args(c: &mut Cursor) -> Result<TuntapArgs> {
    let mut args = TuntapArgs {
        dev: Tuntap {
            flags: tun_flags::DEFAULTS,
            ..Default::default()
        },
        mode_given: false,
    };
    let dev = &mut args.dev;
    while c.tokens_remain() {
        match c.next_token(OPTIONS)?.as_str() {
            "mode" => {
                dev.mode = match c.next_token(&["tun", "tap"])?.as_str() {
                    "tun" => TuntapMode::Tun,
                    "tap" => TuntapMode::Tap,
                    other => return Err(Error::invalid(format!("invalid mode {other}"))),
                };
                args.mode_given = true;
            }
            "user" => dev.owner = Some(u32_from_str(&c.next_token(&["USER"])?, "user")?),
            "group" => dev.group = Some(u32_from_str(&c.next_token(&["GROUP"])?, "group")?),
            "name" | "dev" => dev.name = c.next_token(&["NAME"])?,
            "one_queue" => dev.flags |= tun_flags::ONE_QUEUE,
            "pi" => dev.flags &= !tun_flags::NO_PI,
            "vnet_hdr" => dev.flags |= tun_flags::VNET_HDR,
            "multi_queue" => dev.flags = tun_flags::MULTI_QUEUE_DEFAULTS,
            _ => return Err(c.usage()),
        }
    }
    Ok(args)
}

pub async fn execute<G: Gateway, W: Write>(
    cmd: TuntapCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        TuntapCommand::Add(dev) => gw
            .add_tuntap(&dev)
            .await
            .context(format!("adding {} device {}", dev.mode.name(), dev.name)),
        TuntapCommand::Delete(dev) => {
            if dev.name.is_empty() {
                return Err(Error::invalid("tun/tap device name is required"));
            }
            gw.delete_tuntap(&dev)
                .await
                .context(format!("deleting {} device {}", dev.mode.name(), dev.name))
        }
        TuntapCommand::Show(args) => {
            let devs = gw.tuntaps().await.context("listing tun/tap devices")?;
            let filtered = args.mode_given || !args.dev.name.is_empty();
            let views: Vec<TuntapView<'_>> = devs
                .iter()
                .filter(|d| args.dev.name.is_empty() || d.name == args.dev.name)
                .filter(|d| !args.mode_given || d.mode == args.dev.mode)
                .map(TuntapView)
                .collect();
            if filtered && views.is_empty() {
                return Err(Error::invalid("found 0 matching tun/tap devices"));
            }
            print_all(out, &views, &opts.output)
        }
        TuntapCommand::Help => write_help(out, help::TUNTAP),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::{cursor, opts, text};
    use crate::gateway::MemoryGateway;

    fn parse_str(args: &str) -> Result<TuntapCommand> {
        let mut c = cursor(args);
        c.next_token(&[]).unwrap();
        parse(&mut c)
    }

    fn added(args: &str) -> Tuntap {
        match parse_str(args).unwrap() {
            TuntapCommand::Add(dev) => dev,
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_flags() {
        let dev = added("tuntap add");
        assert_eq!((dev.mode, dev.flags, dev.owner), (TuntapMode::Tun, tun_flags::NO_PI, None));
        assert_eq!(added("tuntap add pi").flags, 0);
        assert_eq!(
            added("tuntap add one_queue").flags,
            tun_flags::NO_PI | tun_flags::ONE_QUEUE
        );
        assert_eq!(
            added("tuntap add multi_queue").flags,
            tun_flags::MULTI_QUEUE | tun_flags::NO_PI
        );
        let dev = added("tuntap add mode tap user 10 group 20 name foo");
        assert_eq!(dev.mode, TuntapMode::Tap);
        assert_eq!((dev.owner, dev.group), (Some(10), Some(20)));
        assert_eq!(dev.name, "foo");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_str("tuntap add mode xyz").unwrap_err().to_string(), "invalid mode xyz");
        assert!(parse_str("tuntap add user avc").is_err());
        assert!(parse_str("tuntap add group avc").is_err());
        assert!(parse_str("tuntap add yxz").unwrap_err().is_usage());
        assert!(parse_str("tuntap ac").unwrap_err().is_usage());
    }

    #[tokio::test]
    async fn test_add_show_delete() {
        let gw = MemoryGateway::new();
        for args in ["tuntap add mode tap", "tuntap add name tun9 user 1000"] {
            execute(parse_str(args).unwrap(), &opts(), &gw, &mut Vec::new())
                .await
                .unwrap();
        }
        let mut out = Vec::new();
        execute(parse_str("tuntap").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap();
        assert_eq!(text(out), "tap0: tap persist\ntun9: tun persist user 1000\n");

        let err = execute(parse_str("tuntap show mode tun name tap0").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "found 0 matching tun/tap devices");

        execute(parse_str("tuntap del mode tap name tap0").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap();
        assert_eq!(gw.snapshot_tuntaps().len(), 1);
        let err = execute(parse_str("tuntap del").unwrap(), &opts(), &gw, &mut Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "tun/tap device name is required");
    }
}
