//! `ip xfrm`: IPsec security associations, policies and notifications.

use std::io::Write;

use tracing::debug;

use super::monitor::{shutdown_signal, write_event};
use super::{GatewayContext, subcommand, write_help};
use crate::cursor::{Cursor, find_prefix};
use crate::error::{Error, GatewayError, Result};
use crate::gateway::Gateway;
use crate::help;
use crate::options::Options;
use crate::output::{PolicyView, StateView, XfrmEventLine, print_all, print_one};
use crate::parse::{parse_address, parse_bytes, parse_u16, parse_u32, parse_u64, prefix_from_str};
use crate::types::{IpNet, XfrmEventClass};
use crate::types::xfrm::{
    EncapType, XfrmAction, XfrmAlgo, XfrmDir, XfrmEncap, XfrmLimits, XfrmMark, XfrmMode,
    XfrmPolicy, XfrmProto, XfrmState, XfrmTmpl,
};

const OBJECTS: &[&str] = &["state", "policy", "monitor", "help"];

const STATE_SUBCOMMANDS: &[&str] = &[
    "add", "update", "allocspi", "delete", "get", "deleteall", "show", "list", "flush", "count",
    "help",
];

const POLICY_SUBCOMMANDS: &[&str] = &[
    "add", "update", "delete", "get", "deleteall", "show", "list", "flush", "count", "help",
];

const STATE_ADD_KEYS: &[&str] = &[
    "src",
    "dst",
    "proto",
    "spi",
    "enc",
    "auth",
    "auth-trunc",
    "aead",
    "comp",
    "mode",
    "mark",
    "reqid",
    "replay-window",
    "limit",
    "encap",
    "output-mark",
    "if_id",
];
const STATE_ALLOC_KEYS: &[&str] = &["src", "dst", "proto", "spi", "mode", "mark", "reqid", "min", "max"];
const STATE_ID_KEYS: &[&str] = &["src", "dst", "proto", "spi", "mark"];
const STATE_LIST_KEYS: &[&str] = &["src", "dst", "proto", "spi", "mode", "reqid", "nokeys"];

const POLICY_ADD_KEYS: &[&str] = &[
    "src", "dst", "dir", "proto", "sport", "dport", "mark", "index", "action", "priority", "if_id",
    "tmpl",
];
const POLICY_ID_KEYS: &[&str] = &[
    "src", "dst", "proto", "sport", "dport", "dir", "mark", "index", "if_id",
];
const POLICY_LIST_KEYS: &[&str] = &[
    "src", "dst", "dir", "proto", "sport", "dport", "mark", "index", "action", "priority", "if_id",
];

const TMPL_KEYS: &[&str] = &["src", "dst", "proto", "spi", "mode", "reqid", "level"];

const LIMIT_KEYS: &[&str] = &[
    "time-soft",
    "time-hard",
    "time-use-soft",
    "time-use-hard",
    "byte-soft",
    "byte-hard",
    "packet-soft",
    "packet-hard",
];

const MONITOR_OBJECTS: &[&str] = &["all", "acquire", "expire", "SA", "aevent", "policy", "report", "help"];

/// Default SPI range for `allocspi`.
const SPI_MIN: u32 = 0x100;
const SPI_MAX: u32 = 0x0fff_ffff;

#[derive(Debug, Clone, PartialEq)]
pub enum XfrmCommand {
    State(StateCommand),
    Policy(PolicyCommand),
    Monitor(Vec<XfrmEventClass>),
    MonitorHelp,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateCommand {
    Add { state: XfrmState, update: bool },
    AllocSpi { state: XfrmState, min: u32, max: u32 },
    Delete(XfrmState),
    Get(XfrmState),
    DeleteAll(XfrmState),
    List { filter: XfrmState, nokeys: bool },
    Flush(Option<XfrmProto>),
    Count,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyCommand {
    Add { policy: XfrmPolicy, update: bool },
    Delete(XfrmPolicy),
    Get(XfrmPolicy),
    DeleteAll(XfrmPolicy),
    List(XfrmPolicy),
    Flush(Option<XfrmDir>),
    Count,
    Help,
}

pub fn parse(c: &mut Cursor) -> Result<XfrmCommand> {
    let tok = c.next_token(OBJECTS)?;
    match find_prefix(&tok, OBJECTS) {
        Some("state") => parse_state_command(c).map(XfrmCommand::State),
        Some("policy") => parse_policy_command(c).map(XfrmCommand::Policy),
        Some("monitor") => parse_monitor(c),
        Some("help") => Ok(XfrmCommand::Help),
        _ => Err(c.usage()),
    }
}

// Value vocabulary

fn parse_proto(c: &mut Cursor) -> Result<XfrmProto> {
    let tok = c.next_token(XfrmProto::NAMES)?;
    XfrmProto::from_name(&tok).ok_or_else(|| Error::invalid(format!("invalid proto {tok}")))
}

fn parse_mode(c: &mut Cursor) -> Result<XfrmMode> {
    let tok = c.next_token(XfrmMode::NAMES)?;
    XfrmMode::from_name(&tok).ok_or_else(|| Error::invalid(format!("invalid mode {tok}")))
}

fn parse_dir(c: &mut Cursor) -> Result<XfrmDir> {
    Ok(match c.next_token(&["in", "out", "fwd"])?.as_str() {
        "in" => XfrmDir::In,
        "out" => XfrmDir::Out,
        "fwd" => XfrmDir::Fwd,
        other => return Err(Error::invalid(format!("invalid dir {other}"))),
    })
}

fn parse_action(c: &mut Cursor) -> Result<XfrmAction> {
    Ok(match c.next_token(&["allow", "block"])?.as_str() {
        "allow" => XfrmAction::Allow,
        "block" => XfrmAction::Block,
        other => return Err(Error::invalid(format!("invalid action {other}"))),
    })
}

/// `MARK [mask MASK]`.
fn parse_mark(c: &mut Cursor) -> Result<XfrmMark> {
    let value = parse_u32(c, "MARK")?;
    let mut mask = 0;
    if c.peek_token(&["mask"]) == Some("mask") {
        c.next_token(&["mask"])?;
        mask = parse_u32(c, "MASK")?;
    }
    Ok(XfrmMark { value, mask })
}

/// `{ espinudp | espinudp-nonike } SPORT DPORT OADDR`.
fn parse_encap(c: &mut Cursor) -> Result<XfrmEncap> {
    let kind = match c.next_token(&["espinudp", "espinudp-nonike", "espintcp"])?.as_str() {
        "espinudp" => EncapType::EspInUdp,
        "espinudp-nonike" => EncapType::EspInUdpNonIke,
        "espintcp" => return Err(Error::unsupported("espintcp not supported yet")),
        other => return Err(Error::invalid(format!("invalid encap type {other}"))),
    };
    let sport = parse_u16(c, "SPORT")?;
    let dport = parse_u16(c, "DPORT")?;
    let oaddr = parse_address(c)?;
    Ok(XfrmEncap {
        kind,
        sport,
        dport,
        oaddr,
    })
}

/// One `limit` clause; repeated clauses accumulate.
fn parse_limit(c: &mut Cursor, limits: &mut XfrmLimits) -> Result<()> {
    let tok = c.next_token(LIMIT_KEYS)?;
    let (slot, unit) = match tok.as_str() {
        "time-soft" => (&mut limits.time_soft, "SECONDS"),
        "time-hard" => (&mut limits.time_hard, "SECONDS"),
        "time-use-soft" => (&mut limits.time_use_soft, "SECONDS"),
        "time-use-hard" => (&mut limits.time_use_hard, "SECONDS"),
        "byte-soft" => (&mut limits.byte_soft, "SIZE"),
        "byte-hard" => (&mut limits.byte_hard, "SIZE"),
        "packet-soft" => (&mut limits.packet_soft, "COUNT"),
        "packet-hard" => (&mut limits.packet_hard, "COUNT"),
        other => return Err(Error::invalid(format!("unknown limit option {other}"))),
    };
    *slot = parse_u64(c, unit)?;
    Ok(())
}

/// `ALGO-NAME ALGO-KEYMAT`, the key in hex.
fn parse_algo(c: &mut Cursor) -> Result<XfrmAlgo> {
    let name = c.next_token(&["ALGO-NAME"])?;
    let key = parse_bytes(c)?;
    Ok(XfrmAlgo {
        name,
        key,
        ..Default::default()
    })
}

/// A policy selector address; host bits are cleared.
fn parse_selector(c: &mut Cursor) -> Result<IpNet> {
    let tok = c.next_token(&["ADDR[/PLEN]"])?;
    Ok(prefix_from_str(&tok)?.network())
}

/// The next key of a keyword loop, restricted to `keys`.
fn next_key(c: &mut Cursor, keys: &[&str]) -> Result<String> {
    let tok = c.next_token(keys)?;
    if !keys.contains(&tok.as_str()) {
        return Err(c.usage());
    }
    Ok(tok)
}

// state

#[derive(Debug, Default)]
struct StateArgs {
    state: XfrmState,
    nokeys: bool,
    min: Option<u32>,
    max: Option<u32>,
}

fn parse_state(c: &mut Cursor, keys: &[&str]) -> Result<StateArgs> {
    let mut args = StateArgs::default();
    let s = &mut args.state;
    while c.tokens_remain() {
        match next_key(c, keys)?.as_str() {
            "src" => s.src = Some(parse_address(c)?),
            "dst" => s.dst = Some(parse_address(c)?),
            "proto" => s.proto = Some(parse_proto(c)?),
            "spi" => s.spi = parse_u32(c, "SPI")?,
            "enc" => s.crypt = Some(parse_algo(c)?),
            "auth" => s.auth = Some(parse_algo(c)?),
            "auth-trunc" => {
                let mut algo = parse_algo(c)?;
                algo.trunc_len = Some(parse_u32(c, "ALGO-TRUNC-LEN")?);
                s.auth = Some(algo);
            }
            "aead" => {
                let mut algo = parse_algo(c)?;
                algo.icv_len = Some(parse_u32(c, "ALGO-ICV-LEN")?);
                s.aead = Some(algo);
            }
            "comp" => return Err(Error::unsupported("comp not implemented")),
            "mode" => s.mode = Some(parse_mode(c)?),
            "mark" => s.mark = Some(parse_mark(c)?),
            "reqid" => s.reqid = parse_u32(c, "REQID")?,
            "replay-window" => s.replay_window = parse_u32(c, "SIZE")?,
            "limit" => parse_limit(c, &mut s.limits)?,
            "encap" => s.encap = Some(parse_encap(c)?),
            "output-mark" => s.output_mark = Some(parse_mark(c)?),
            "if_id" => s.if_id = parse_u32(c, "IF_ID")?,
            "min" => args.min = Some(parse_u32(c, "SPI")?),
            "max" => args.max = Some(parse_u32(c, "SPI")?),
            _ => args.nokeys = true,
        }
    }
    Ok(args)
}

fn parse_state_command(c: &mut Cursor) -> Result<StateCommand> {
    let Some(sub) = subcommand(c, STATE_SUBCOMMANDS)? else {
        return Ok(StateCommand::List {
            filter: XfrmState::default(),
            nokeys: false,
        });
    };
    Ok(match sub {
        "add" | "update" => StateCommand::Add {
            state: parse_state(c, STATE_ADD_KEYS)?.state,
            update: sub == "update",
        },
        "allocspi" => {
            let args = parse_state(c, STATE_ALLOC_KEYS)?;
            let min = args.min.unwrap_or(SPI_MIN);
            let max = args.max.unwrap_or(SPI_MAX);
            if min > max {
                return Err(Error::invalid(format!("invalid SPI range {min:#x}-{max:#x}")));
            }
            StateCommand::AllocSpi {
                state: args.state,
                min,
                max,
            }
        }
        "delete" => StateCommand::Delete(parse_state(c, STATE_ID_KEYS)?.state),
        "get" => StateCommand::Get(parse_state(c, STATE_ID_KEYS)?.state),
        "deleteall" => {
            let args = parse_state(c, STATE_LIST_KEYS)?;
            if args.nokeys {
                return Err(Error::invalid("deleteall does not support nokeys"));
            }
            StateCommand::DeleteAll(args.state)
        }
        "show" | "list" => {
            let args = parse_state(c, STATE_LIST_KEYS)?;
            StateCommand::List {
                filter: args.state,
                nokeys: args.nokeys,
            }
        }
        "flush" => {
            let mut proto = None;
            if c.tokens_remain() {
                if c.next_token(&["proto"])? != "proto" {
                    return Err(c.usage());
                }
                proto = Some(parse_proto(c)?);
            }
            StateCommand::Flush(proto)
        }
        "count" => StateCommand::Count,
        _ => StateCommand::Help,
    })
}

// policy

fn parse_tmpl(c: &mut Cursor) -> Result<XfrmTmpl> {
    let mut t = XfrmTmpl::default();
    while c
        .peek_token(TMPL_KEYS)
        .is_some_and(|tok| TMPL_KEYS.contains(&tok))
    {
        match c.next_token(TMPL_KEYS)?.as_str() {
            "src" => t.src = Some(parse_address(c)?),
            "dst" => t.dst = Some(parse_address(c)?),
            "proto" => t.proto = Some(parse_proto(c)?),
            "spi" => t.spi = parse_u32(c, "SPI")?,
            "mode" => t.mode = Some(parse_mode(c)?),
            "reqid" => t.reqid = parse_u32(c, "REQID")?,
            _ => {
                t.optional = match c.next_token(&["required", "use"])?.as_str() {
                    "required" => false,
                    "use" => true,
                    other => return Err(Error::invalid(format!("invalid level {other}"))),
                }
            }
        }
    }
    Ok(t)
}

/// Parse a policy; the flag reports whether any selector field was given.
fn parse_policy(c: &mut Cursor, keys: &[&str]) -> Result<(XfrmPolicy, bool)> {
    let mut p = XfrmPolicy::default();
    let mut selector = false;
    while c.tokens_remain() {
        let key = next_key(c, keys)?;
        match key.as_str() {
            "src" => p.src = Some(parse_selector(c)?),
            "dst" => p.dst = Some(parse_selector(c)?),
            "proto" => p.proto = Some(parse_proto(c)?),
            "sport" => p.sport = parse_u16(c, "SPORT")?,
            "dport" => p.dport = parse_u16(c, "DPORT")?,
            "dir" => p.dir = Some(parse_dir(c)?),
            "mark" => p.mark = Some(parse_mark(c)?),
            "index" => p.index = parse_u32(c, "INDEX")?,
            "action" => p.action = Some(parse_action(c)?),
            "priority" => p.priority = parse_u32(c, "PRIORITY")?,
            "if_id" => p.if_id = parse_u32(c, "IF_ID")?,
            _ => p.tmpls.push(parse_tmpl(c)?),
        }
        selector |= matches!(key.as_str(), "src" | "dst" | "proto" | "sport" | "dport");
    }
    Ok((p, selector))
}

/// A policy addressed either by selector or by index, never both.
fn parse_policy_id(c: &mut Cursor) -> Result<XfrmPolicy> {
    let (policy, selector) = parse_policy(c, POLICY_ID_KEYS)?;
    if selector && policy.index != 0 {
        return Err(Error::invalid("cannot specify both SELECTOR and index"));
    }
    Ok(policy)
}

fn parse_policy_command(c: &mut Cursor) -> Result<PolicyCommand> {
    let Some(sub) = subcommand(c, POLICY_SUBCOMMANDS)? else {
        return Ok(PolicyCommand::List(XfrmPolicy::default()));
    };
    Ok(match sub {
        "add" | "update" => PolicyCommand::Add {
            policy: parse_policy(c, POLICY_ADD_KEYS)?.0,
            update: sub == "update",
        },
        "delete" => PolicyCommand::Delete(parse_policy_id(c)?),
        "get" => PolicyCommand::Get(parse_policy_id(c)?),
        "deleteall" => PolicyCommand::DeleteAll(parse_policy(c, POLICY_LIST_KEYS)?.0),
        "show" | "list" => PolicyCommand::List(parse_policy(c, POLICY_LIST_KEYS)?.0),
        "flush" => {
            let mut dir = None;
            if c.tokens_remain() {
                if c.next_token(&["dir"])? != "dir" {
                    return Err(c.usage());
                }
                dir = Some(parse_dir(c)?);
            }
            PolicyCommand::Flush(dir)
        }
        "count" => PolicyCommand::Count,
        _ => PolicyCommand::Help,
    })
}

// monitor

fn parse_monitor(c: &mut Cursor) -> Result<XfrmCommand> {
    let mut all = false;
    let mut classes = Vec::new();
    while c.tokens_remain() {
        let tok = c.next_token(MONITOR_OBJECTS)?;
        match tok.as_str() {
            "help" => return Ok(XfrmCommand::MonitorHelp),
            "all" => all = true,
            other => {
                let class = XfrmEventClass::from_name(other).ok_or_else(|| c.usage())?;
                if !classes.contains(&class) {
                    classes.push(class);
                }
            }
        }
        if all && !classes.is_empty() {
            return Err(c.usage());
        }
    }
    if classes.is_empty() {
        classes = XfrmEventClass::ALL.to_vec();
    }
    Ok(XfrmCommand::Monitor(classes))
}

pub async fn execute<G: Gateway, W: Write>(
    cmd: XfrmCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        XfrmCommand::State(cmd) => execute_state(cmd, opts, gw, out).await,
        XfrmCommand::Policy(cmd) => execute_policy(cmd, opts, gw, out).await,
        XfrmCommand::Monitor(classes) => monitor(&classes, opts, gw, out).await,
        XfrmCommand::MonitorHelp => write_help(out, help::XFRM_MONITOR),
        XfrmCommand::Help => write_help(out, help::XFRM),
    }
}

async fn execute_state<G: Gateway, W: Write>(
    cmd: StateCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        StateCommand::Add { state, update } => gw
            .add_xfrm_state(&state, update)
            .await
            .context(format!("adding xfrm state spi {:#x}", state.spi)),
        StateCommand::AllocSpi { state, min, max } => {
            let allocated = gw
                .alloc_spi(&state, min, max)
                .await
                .context("allocating SPI")?;
            print_one(out, &StateView::new(&allocated, false), &opts.output)
        }
        StateCommand::Delete(state) => gw
            .delete_xfrm_state(&state)
            .await
            .context(format!("deleting xfrm state spi {:#x}", state.spi)),
        StateCommand::Get(id) => {
            let states = gw.xfrm_states(opts.family).await.context("listing xfrm states")?;
            let found = states
                .iter()
                .find(|s| id.selects(s) && (id.mark.is_none() || id.mark == s.mark))
                .ok_or_else(|| {
                    Error::gateway(
                        "getting xfrm state",
                        GatewayError::NotFound {
                            kind: "xfrm state",
                            name: format!("spi {:#x}", id.spi),
                        },
                    )
                })?;
            print_one(out, &StateView::new(found, true), &opts.output)
        }
        StateCommand::DeleteAll(filter) => {
            let states = gw.xfrm_states(opts.family).await.context("listing xfrm states")?;
            for state in states.iter().filter(|s| filter.selects(s)) {
                gw.delete_xfrm_state(state)
                    .await
                    .context(format!("deleting xfrm state spi {:#x}", state.spi))?;
            }
            Ok(())
        }
        StateCommand::List { filter, nokeys } => {
            let states = gw.xfrm_states(opts.family).await.context("listing xfrm states")?;
            let views: Vec<StateView<'_>> = states
                .iter()
                .filter(|s| filter.selects(s))
                .map(|s| StateView::new(s, nokeys))
                .collect();
            print_all(out, &views, &opts.output)
        }
        StateCommand::Flush(proto) => gw
            .flush_xfrm_states(proto)
            .await
            .context("flushing xfrm states"),
        StateCommand::Count => {
            let states = gw.xfrm_states(opts.family).await.context("listing xfrm states")?;
            writeln!(out, "XFRM states: {}", states.len())?;
            Ok(())
        }
        StateCommand::Help => write_help(out, help::XFRM_STATE),
    }
}

async fn execute_policy<G: Gateway, W: Write>(
    cmd: PolicyCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    match cmd {
        PolicyCommand::Add { policy, update } => {
            if policy.dir.is_none() {
                return Err(Error::invalid("\"DIR\" is required"));
            }
            gw.add_xfrm_policy(&policy, update)
                .await
                .context("adding xfrm policy")
        }
        PolicyCommand::Delete(policy) => gw
            .delete_xfrm_policy(&policy)
            .await
            .context("deleting xfrm policy"),
        PolicyCommand::Get(policy) => {
            let found = gw
                .get_xfrm_policy(&policy)
                .await
                .context("getting xfrm policy")?;
            print_one(out, &PolicyView(&found), &opts.output)
        }
        PolicyCommand::DeleteAll(filter) => {
            let policies = gw
                .xfrm_policies(opts.family)
                .await
                .context("listing xfrm policies")?;
            for policy in policies.iter().filter(|p| filter.selects(p)) {
                gw.delete_xfrm_policy(policy)
                    .await
                    .context("deleting xfrm policy")?;
            }
            Ok(())
        }
        PolicyCommand::List(filter) => {
            let policies = gw
                .xfrm_policies(opts.family)
                .await
                .context("listing xfrm policies")?;
            let views: Vec<PolicyView<'_>> = policies
                .iter()
                .filter(|p| filter.selects(p))
                .map(PolicyView)
                .collect();
            print_all(out, &views, &opts.output)
        }
        PolicyCommand::Flush(dir) => gw
            .flush_xfrm_policies(dir)
            .await
            .context("flushing xfrm policies"),
        PolicyCommand::Count => {
            let policies = gw
                .xfrm_policies(opts.family)
                .await
                .context("listing xfrm policies")?;
            writeln!(out, "XFRM policies: {}", policies.len())?;
            Ok(())
        }
        PolicyCommand::Help => write_help(out, help::XFRM_POLICY),
    }
}

async fn monitor<G: Gateway, W: Write>(
    classes: &[XfrmEventClass],
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    let mut rx = gw
        .subscribe_xfrm(classes)
        .await
        .context("subscribing to xfrm events")?;
    debug!(?classes, "monitoring xfrm");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => write_event(out, &XfrmEventLine(&event), opts)?,
                None => break,
            },
            res = &mut shutdown => {
                res?;
                break;
            }
        }
    }
    Ok(())
}
