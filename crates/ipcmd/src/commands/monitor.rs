//! `ip monitor`: stream configuration changes until interrupted.
//!
//! One receiver per subscribed class is merged through a [`StreamMap`],
//! so events print in arrival order whatever their class.

use std::io::Write;

use chrono::Local;
use tokio::signal::unix::{SignalKind, signal};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::debug;

use super::{GatewayContext, write_help};
use crate::cursor::{Cursor, find_prefix};
use crate::error::Result;
use crate::gateway::Gateway;
use crate::help;
use crate::options::Options;
use crate::output::{EventLine, Printable, print_one, write_json, write_timestamp};
use crate::types::EventClass;

const OBJECTS: &[&str] = &["all", "address", "link", "neigh", "route", "help"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorCommand {
    /// Watch these classes, in subscription order.
    Watch(Vec<EventClass>),
    Help,
}

pub fn parse(c: &mut Cursor) -> Result<MonitorCommand> {
    let mut all = false;
    let mut classes = Vec::new();
    while c.tokens_remain() {
        let tok = c.next_token(OBJECTS)?;
        let class = match find_prefix(&tok, OBJECTS) {
            Some("help") => return Ok(MonitorCommand::Help),
            Some("all") => {
                all = true;
                None
            }
            Some("address") => Some(EventClass::Address),
            Some("link") => Some(EventClass::Link),
            Some("neigh") => Some(EventClass::Neigh),
            Some("route") => Some(EventClass::Route),
            _ => return Err(c.usage()),
        };
        if let Some(class) = class
            && !classes.contains(&class)
        {
            classes.push(class);
        }
        if all && !classes.is_empty() {
            return Err(c.usage());
        }
    }
    if classes.is_empty() {
        classes = EventClass::ALL.to_vec();
    }
    Ok(MonitorCommand::Watch(classes))
}

/// Resolve once SIGINT or SIGTERM arrives.
pub(crate) async fn shutdown_signal() -> Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = term.recv() => {}
    }
    debug!("monitor interrupted");
    Ok(())
}

/// Print one event: a compact JSON line, or the text form behind the
/// optional timestamp.
pub(crate) fn write_event<W: Write, T: Printable>(out: &mut W, item: &T, opts: &Options) -> Result<()> {
    if opts.output.json {
        write_json(out, &item.to_json(&opts.output), false)?;
    } else {
        write_timestamp(out, opts.timestamp, Local::now().naive_local())?;
        print_one(out, item, &opts.output)?;
    }
    out.flush()?;
    Ok(())
}

pub async fn execute<G: Gateway, W: Write>(
    cmd: MonitorCommand,
    opts: &Options,
    gw: &G,
    out: &mut W,
) -> Result<()> {
    let classes = match cmd {
        MonitorCommand::Help => return write_help(out, help::MONITOR),
        MonitorCommand::Watch(classes) => classes,
    };
    let label = classes.len() == EventClass::ALL.len();

    let mut streams = StreamMap::with_capacity(classes.len());
    for class in classes {
        let rx = gw
            .subscribe(class)
            .await
            .context(format!("subscribing to {} events", class.label()))?;
        streams.insert(class, ReceiverStream::new(rx));
    }
    debug!(streams = streams.len(), label, "monitoring");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            next = streams.next() => match next {
                Some((_, event)) => write_event(out, &EventLine { event: &event, label }, opts)?,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_util::{cursor, opts, text};
    use crate::gateway::MemoryGateway;
    use crate::types::{Event, Link};

    fn parse_str(args: &str) -> Result<MonitorCommand> {
        let mut c = cursor(args);
        c.next_token(&[]).unwrap();
        parse(&mut c)
    }

    #[test]
    fn test_parse_classes() {
        assert_eq!(
            parse_str("monitor").unwrap(),
            MonitorCommand::Watch(EventClass::ALL.to_vec())
        );
        assert_eq!(
            parse_str("monitor all").unwrap(),
            MonitorCommand::Watch(EventClass::ALL.to_vec())
        );
        assert_eq!(
            parse_str("monitor route ro link").unwrap(),
            MonitorCommand::Watch(vec![EventClass::Route, EventClass::Link])
        );
        assert_eq!(parse_str("monitor help").unwrap(), MonitorCommand::Help);
    }

    #[test]
    fn test_parse_rejects_all_with_class() {
        assert!(parse_str("monitor all link").unwrap_err().is_usage());
        assert!(parse_str("monitor link all").unwrap_err().is_usage());
        assert!(parse_str("monitor bogus").unwrap_err().is_usage());
        assert!(parse_str("monitor a").unwrap_err().is_usage());
    }

    #[tokio::test]
    async fn test_all_classes_are_labelled() {
        let gw = MemoryGateway::new();
        gw.push_event(Event::Link {
            deleted: true,
            link: Link {
                index: 3,
                ..Link::named("d0")
            },
        });
        let mut out = Vec::new();
        execute(parse_str("monitor").unwrap(), &opts(), &gw, &mut out)
            .await
            .unwrap();
        let out = text(out);
        assert!(out.starts_with("[LINK] Deleted 3: d0:"), "{out}");
        assert_eq!(gw.subscriptions(), EventClass::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_single_class_json() {
        let gw = MemoryGateway::new();
        gw.push_event(Event::Link {
            deleted: false,
            link: Link::named("d0"),
        });
        let mut opts = opts();
        opts.output.json = true;
        let mut out = Vec::new();
        execute(parse_str("monitor link").unwrap(), &opts, &gw, &mut out)
            .await
            .unwrap();
        let out = text(out);
        assert_eq!(out.lines().count(), 1);
        let v: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(v["ifname"], "d0");
        assert_eq!(gw.subscriptions(), vec![EventClass::Link]);
    }
}
