//! `ip route`: manage and query the routing tables.

use std::io::Write;

use tracing::debug;

use super::{GatewayContext, subcommand, write_help};
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::filter::{DstMatch, RouteFilter, route_mask};
use crate::gateway::{Gateway, RouteGet, WriteMode};
use crate::help;
use crate::names;
use crate::options::Options;
use crate::output::print_all;
use crate::parse::{ip_from_str, parse_ipnet, parse_u8, parse_u16, parse_u32, set_once};
use crate::types::route::{RT_TABLE_MAIN, RT_TABLE_UNSPEC, rtn, rtnh};
use crate::types::{NextHop, Route};

const SUBCOMMANDS: &[&str] = &[
    "add", "append", "replace", "del", "delete", "show", "list", "flush", "get", "help",
];

const ROUTE_OPTIONS: &[&str] = &[
    "tos",
    "table",
    "proto",
    "scope",
    "metric",
    "via",
    "dev",
    "nexthop",
    "onlink",
    "mtu",
    "advmss",
    "rtt",
    "rttvar",
    "reordering",
    "window",
    "cwnd",
    "initcwnd",
    "ssthresh",
    "realms",
    "src",
    "rto_min",
    "hoplimit",
    "initrwnd",
    "features",
    "congctl",
    "quickack",
    "fastopen_no_cookie",
];

const SELECTOR_OPTIONS: &[&str] = &["type", "scope", "table", "proto", "root", "match", "exact"];

#[derive(Debug, Clone, PartialEq)]
pub enum RouteCommand {
    Add { mode: WriteMode, route: Route },
    Delete(Route),
    Show(RouteFilter),
    Flush(RouteFilter),
    Get(RouteGet),
    Help,
}

pub fn parse(c: &mut Cursor) -> Result<RouteCommand> {
    let Some(sub) = subcommand(c, SUBCOMMANDS)? else {
        return Ok(RouteCommand::Show(RouteFilter::default()));
    };
    Ok(match sub {
        "add" => add(c, WriteMode::Create)?,
        "append" => add(c, WriteMode::Append)?,
        "replace" => add(c, WriteMode::Replace)?,
        "del" | "delete" => RouteCommand::Delete(parse_route(c)?),
        "show" | "list" => RouteCommand::Show(parse_selector(c)?),
        "flush" => RouteCommand::Flush(parse_selector(c)?),
        "get" => RouteCommand::Get(parse_get(c)?),
        _ => RouteCommand::Help,
    })
}

fn add(c: &mut Cursor, mode: WriteMode) -> Result<RouteCommand> {
    let route = parse_route(c)?;
    if route.kind == rtn::UNICAST && !route.has_path() {
        return Err(Error::invalid("a unicast route needs a device or a gateway"));
    }
    Ok(RouteCommand::Add { mode, route })
}

fn parse_table(c: &mut Cursor) -> Result<u32> {
    let tok = c.next_token(&["local", "main", "default", "all", "NUMBER"])?;
    if tok == "all" {
        return Ok(RT_TABLE_UNSPEC);
    }
    names::table_from_str(&tok).ok_or_else(|| Error::invalid(format!("invalid table ID: {tok}")))
}

fn parse_proto(c: &mut Cursor) -> Result<u8> {
    let tok = c.next_token(&["RTPROTO"])?;
    names::protocol_from_str(&tok).ok_or_else(|| Error::invalid(format!("invalid protocol: {tok}")))
}

fn parse_scope(c: &mut Cursor) -> Result<u8> {
    let tok = c.next_token(&["host", "link", "global", "NUMBER"])?;
    names::scope_from_str(&tok).ok_or_else(|| Error::invalid(format!("invalid scope: {tok}")))
}

/// `1` or `0`.
fn parse_flag01(c: &mut Cursor) -> Result<u32> {
    match c.next_token(&["1", "0"])?.as_str() {
        "1" => Ok(1),
        "0" => Ok(0),
        _ => Err(c.usage()),
    }
}

fn parse_weight(c: &mut Cursor) -> Result<u16> {
    let weight = parse_u16(c, "weight")?;
    if !(1..=256).contains(&weight) {
        return Err(Error::invalid(format!("invalid weight: {weight}")));
    }
    Ok(weight)
}

/// `nexthop via ADDR [dev NAME] [weight N] [onlink]`.
fn parse_leg(c: &mut Cursor) -> Result<NextHop> {
    let mut hop = NextHop {
        weight: 1,
        ..Default::default()
    };
    while let Some(tok) = c.peek_token(&["via", "dev", "weight", "onlink"])
        && matches!(tok, "via" | "dev" | "weight" | "onlink")
    {
        match c.next_token(&[])?.as_str() {
            "via" => hop.gateway = Some(ip_from_str(&c.next_token(&["Gateway IP"])?)?),
            "dev" => hop.dev = Some(c.next_token(&["device name"])?),
            "weight" => hop.weight = parse_weight(c)?,
            _ => hop.flags |= rtnh::ONLINK,
        }
    }
    if hop.gateway.is_none() && hop.dev.is_none() {
        c.next_token(&["via", "dev"])?;
        return Err(c.usage());
    }
    Ok(hop)
}

/// `[TYPE] (default|PREFIX) QUALIFIERS NEXTHOP-INFO OPTIONS`.
fn parse_route(c: &mut Cursor) -> Result<Route> {
    let mut route = Route::default();
    let mut tok = c.next_token(&["TYPE", "default", "PREFIX"])?;
    if let Some(kind) = names::route_type_from_str(&tok) {
        route.kind = kind;
        tok = c.next_token(&["default", "PREFIX"])?;
    }
    if tok != "default" {
        c.last_token(&[]);
        route.dst = Some(parse_ipnet(c)?);
    }

    let (mut tos, mut table, mut proto, mut scope) = (None, None, None, None);
    let mut first = NextHop {
        weight: 1,
        ..Default::default()
    };
    let mut legs = Vec::new();
    let m = &mut route.metrics;
    while c.tokens_remain() {
        let tok = c.next_token(ROUTE_OPTIONS)?;
        match tok.as_str() {
            "tos" => set_once(&mut tos, parse_u8(c, "tos")?, "tos")?,
            "table" => set_once(&mut table, parse_table(c)?, "table")?,
            "proto" => set_once(&mut proto, parse_proto(c)?, "proto")?,
            "scope" => set_once(&mut scope, parse_scope(c)?, "scope")?,
            "metric" => set_once(&mut route.metric, parse_u32(c, "metric")?, "metric")?,
            "via" => set_once(
                &mut first.gateway,
                ip_from_str(&c.next_token(&["Gateway IP"])?)?,
                "via",
            )?,
            "dev" => set_once(&mut first.dev, c.next_token(&["device name"])?, "dev")?,
            "nexthop" => legs.push(parse_leg(c)?),
            "onlink" => first.flags |= rtnh::ONLINK,
            "mtu" => set_once(&mut m.mtu, parse_u32(c, "mtu")?, "mtu")?,
            "advmss" => set_once(&mut m.advmss, parse_u32(c, "advmss")?, "advmss")?,
            "rtt" => set_once(&mut m.rtt, parse_u32(c, "rtt")?, "rtt")?,
            "rttvar" => set_once(&mut m.rttvar, parse_u32(c, "rttvar")?, "rttvar")?,
            "reordering" => set_once(&mut m.reordering, parse_u32(c, "reordering")?, "reordering")?,
            "window" => set_once(&mut m.window, parse_u32(c, "window")?, "window")?,
            "cwnd" => set_once(&mut m.cwnd, parse_u32(c, "cwnd")?, "cwnd")?,
            "initcwnd" => set_once(&mut m.initcwnd, parse_u32(c, "initcwnd")?, "initcwnd")?,
            "ssthresh" => set_once(&mut m.ssthresh, parse_u32(c, "ssthresh")?, "ssthresh")?,
            "realms" => set_once(&mut route.realms, parse_u32(c, "realms")?, "realms")?,
            "src" => {
                let tok = c.next_token(&["ADDRESS"])?;
                let src = tok
                    .parse()
                    .map_err(|_| Error::invalid(format!("invalid source address: {tok}")))?;
                set_once(&mut route.prefsrc, src, "src")?;
            }
            "rto_min" => set_once(&mut m.rto_min, parse_u32(c, "rto_min")?, "rto_min")?,
            "hoplimit" => set_once(&mut m.hoplimit, parse_u32(c, "hoplimit")?, "hoplimit")?,
            "initrwnd" => set_once(&mut m.initrwnd, parse_u32(c, "initrwnd")?, "initrwnd")?,
            "features" => set_once(&mut m.features, parse_u32(c, "features")?, "features")?,
            "congctl" => set_once(&mut m.congctl, c.next_token(&["NAME"])?, "congctl")?,
            "quickack" => set_once(&mut m.quickack, parse_flag01(c)?, "quickack")?,
            "fastopen_no_cookie" => set_once(
                &mut m.fastopen_no_cookie,
                parse_flag01(c)?,
                "fastopen_no_cookie",
            )?,
            _ => return Err(c.usage()),
        }
    }

    route.tos = tos.unwrap_or(0);
    route.table = table.unwrap_or(RT_TABLE_MAIN);
    route.protocol = proto.unwrap_or(0);
    route.scope = scope.unwrap_or(names::scope::UNIVERSE);
    route.gateway = first.gateway;
    route.dev = first.dev.clone();
    route.flags = first.flags;
    route.next_hops = std::iter::once(first).chain(legs).collect();
    Ok(route)
}

fn parse_selector(c: &mut Cursor) -> Result<RouteFilter> {
    let mut f = RouteFilter::default();
    if let Some(tok) = c.peek_token(&[])
        && let Some(kind) = names::route_type_from_str(tok)
    {
        c.next_token(&[])?;
        f.kind = kind;
        f.mask |= route_mask::TYPE;
    }
    while c.tokens_remain() {
        let tok = c.next_token(SELECTOR_OPTIONS)?;
        match tok.as_str() {
            "type" => {
                let t = c.next_token(&names::route_type_names())?;
                f.kind = names::route_type_from_str(&t).ok_or_else(|| c.usage())?;
                f.mask |= route_mask::TYPE;
            }
            "scope" => {
                f.scope = parse_scope(c)?;
                f.mask |= route_mask::SCOPE;
            }
            "table" => {
                f.table = parse_table(c)?;
                f.mask |= route_mask::TABLE;
            }
            "proto" => {
                f.protocol = parse_proto(c)?;
                f.mask |= route_mask::PROTOCOL;
            }
            "root" | "match" | "exact" => {
                let net = parse_ipnet(c)?;
                f.dst = Some(match tok.as_str() {
                    "root" => DstMatch::Root(net),
                    "match" => DstMatch::Match(net),
                    _ => DstMatch::Exact(net),
                });
                f.mask |= route_mask::DST;
            }
            _ => return Err(c.usage()),
        }
    }
    Ok(f)
}

fn parse_get(c: &mut Cursor) -> Result<RouteGet> {
    let dst = ip_from_str(&c.next_token(&["ADDRESS"])?)?;
    let mut req = RouteGet::new(dst);
    while c.tokens_remain() {
        match c.next_token(&["from", "iif", "oif", "vrf"])?.as_str() {
            "from" => req.src = Some(ip_from_str(&c.next_token(&["ADDRESS"])?)?),
            "iif" => req.iif = Some(c.next_token(&["STRING"])?),
            "oif" => req.oif = Some(c.next_token(&["STRING"])?),
            "vrf" => req.vrf = Some(c.next_token(&["NAME"])?),
            _ => return Err(c.usage()),
        }
    }
    Ok(req)
}

/// Routes a selector lists; without a table criterion only the main table.
async fn selected<G: Gateway>(gw: &G, opts: &Options, filter: &RouteFilter) -> Result<Vec<Route>> {
    let routes = gw
        .routes_filtered(opts.family, filter)
        .await
        .context("listing routes")?;
    let all_tables = filter.mask & route_mask::TABLE != 0;
    Ok(routes
        .into_iter()
        .filter(|r| all_tables || r.table == RT_TABLE_MAIN)
        .collect())
}

pub async fn execute<G: Gateway, W: Write>(
    cmd: RouteCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        RouteCommand::Add { mode, route } => gw
            .add_route(&route, mode)
            .await
            .context(format!("adding route {}", route.destination())),
        RouteCommand::Delete(route) => gw
            .delete_route(&route)
            .await
            .context(format!("deleting route {}", route.destination())),
        RouteCommand::Show(filter) => {
            let routes = selected(gw, opts, &filter).await?;
            print_all(out, &routes, &opts.output)
        }
        RouteCommand::Flush(filter) => {
            let routes = selected(gw, opts, &filter).await?;
            debug!(count = routes.len(), "flushing routes");
            for route in &routes {
                gw.delete_route(route)
                    .await
                    .context(format!("deleting route {}", route.destination()))?;
            }
            Ok(())
        }
        RouteCommand::Get(req) => {
            let routes = gw
                .get_route(&req)
                .await
                .context(format!("getting route to {}", req.dst))?;
            print_all(out, &routes, &opts.output)
        }
        RouteCommand::Help => write_help(out, help::ROUTE),
    }
}
