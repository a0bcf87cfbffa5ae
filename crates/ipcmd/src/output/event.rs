//! Monitor event lines.

use std::io::{self, Write};

use chrono::NaiveDateTime;
use serde_json::{Value, json};

use crate::options::Timestamp;
use crate::output::{AddressBlock, LinkView, OutputOptions, Printable};
use crate::types::xfrm::XfrmState;
use crate::types::{Event, XfrmEvent};

/// Write the `-t`/`-ts` prefix for an event received at `now`.
///
/// `-t` prints `[2024-01-02T03:04:05.000006] `, `-ts` only the time of day.
pub fn write_timestamp<W: Write>(w: &mut W, mode: Timestamp, now: NaiveDateTime) -> io::Result<()> {
    match mode {
        Timestamp::None => Ok(()),
        Timestamp::Long => write!(w, "[{}] ", now.format("%Y-%m-%dT%H:%M:%S%.6f")),
        Timestamp::Short => write!(w, "[{}] ", now.format("%H:%M:%S%.6f")),
    }
}

/// One rtnetlink event as the monitor prints it.
#[derive(Debug, Clone, Copy)]
pub struct EventLine<'a> {
    pub event: &'a Event,
    /// Prefix the object label (`[LINK]`, ...).
    pub label: bool,
}

impl Printable for EventLine<'_> {
    fn print_text<W: Write>(&self, w: &mut W, opts: &OutputOptions) -> io::Result<()> {
        if self.label {
            write!(w, "{} ", self.event.class().label())?;
        }
        if self.event.is_deleted() {
            write!(w, "Deleted ")?;
        }
        match self.event {
            Event::Link { link, .. } => LinkView::new(link).print_text(w, opts),
            Event::Address { address, .. } => {
                write!(w, "{}: {}", address.index, address.dev)?;
                AddressBlock(address).print_text(w, opts)
            }
            Event::Route { route, .. } => route.print_text(w, opts),
            Event::Neigh { neigh, .. } => neigh.print_text(w, opts),
        }
    }

    fn to_json(&self, opts: &OutputOptions) -> Value {
        let mut obj = match self.event {
            Event::Link { link, .. } => LinkView::new(link).to_json(opts),
            Event::Address { address, .. } => {
                let mut obj = json!({ "ifindex": address.index, "ifname": address.dev });
                obj["addr_info"] = json!([AddressBlock(address).to_json(opts)]);
                obj
            }
            Event::Route { route, .. } => route.to_json(opts),
            Event::Neigh { neigh, .. } => neigh.to_json(opts),
        };
        if self.event.is_deleted() {
            obj["deleted"] = json!(true);
        }
        obj
    }
}

/// One xfrm notification.
#[derive(Debug, Clone, Copy)]
pub struct XfrmEventLine<'a>(pub &'a XfrmEvent);

fn write_expire<W: Write>(w: &mut W, s: &XfrmState, hard: bool) -> io::Result<()> {
    let addr = |a: Option<std::net::IpAddr>| a.map_or_else(|| "any".to_string(), |a| a.to_string());
    writeln!(w, "Expired {}", if hard { "hard" } else { "soft" })?;
    writeln!(w, "src {} dst {}", addr(s.src), addr(s.dst))?;
    writeln!(
        w,
        "    proto {} spi {} reqid {} mode {}",
        s.proto.map_or("any", |p| p.name()),
        s.spi,
        s.reqid,
        s.mode.unwrap_or_default().name()
    )?;
    writeln!(w, "    replay-window {}", s.replay_window)?;
    if let Some(auth) = &s.auth {
        writeln!(
            w,
            "    auth-trunc {} 0x{} {}",
            auth.name,
            auth.key_hex(),
            auth.trunc_len.unwrap_or(0)
        )?;
    }
    if let Some(crypt) = &s.crypt {
        writeln!(w, "    enc {} 0x{}", crypt.name, crypt.key_hex())?;
    }
    writeln!(w, "    sel src {} dst {}", addr(s.src), addr(s.dst))?;
    let l = &s.limits;
    writeln!(w, "    lifetime config:")?;
    writeln!(w, "      limit: soft ({})(bytes), hard ({})(bytes)", l.byte_soft, l.byte_hard)?;
    writeln!(
        w,
        "      limit: soft ({})(packets), hard ({})(packets)",
        l.packet_soft, l.packet_hard
    )?;
    writeln!(w, "      expire add: soft {}(sec), hard {}(sec)", l.time_soft, l.time_hard)?;
    writeln!(
        w,
        "      expire use: soft {}(sec), hard {}(sec)",
        l.time_use_soft, l.time_use_hard
    )?;
    let st = &s.stats;
    writeln!(w, "    lifetime current:")?;
    writeln!(w, "      {}(bytes), {}(packets)", st.bytes, st.packets)?;
    writeln!(w, "      add {}, use {}", st.add_time, st.use_time)?;
    writeln!(w, "    stats:")?;
    writeln!(
        w,
        "      replay-window {} replay {} failed {}",
        st.replay_window, st.replay, st.failed
    )
}

impl Printable for XfrmEventLine<'_> {
    fn print_text<W: Write>(&self, w: &mut W, _opts: &OutputOptions) -> io::Result<()> {
        match self.0 {
            XfrmEvent::Expire { state, hard } => write_expire(w, state, *hard),
            XfrmEvent::Other(kind) => writeln!(w, "unsupported msg type: {kind:x}"),
        }
    }

    fn to_json(&self, opts: &OutputOptions) -> Value {
        match self.0 {
            XfrmEvent::Expire { state, hard } => {
                let mut obj = super::StateView::new(state, false).to_json(opts);
                obj["expire"] = json!(if *hard { "hard" } else { "soft" });
                obj
            }
            XfrmEvent::Other(kind) => json!({ "unsupported": kind }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::types::xfrm::{XfrmMode, XfrmProto};
    use crate::types::{Address, Link, Route};

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_micro_opt(3, 4, 5, 6))
            .unwrap()
    }

    fn text(item: &impl Printable) -> String {
        let mut out = Vec::new();
        item.print_text(&mut out, &OutputOptions::default()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_timestamps() {
        let mut out = Vec::new();
        write_timestamp(&mut out, Timestamp::Long, at()).unwrap();
        write_timestamp(&mut out, Timestamp::Short, at()).unwrap();
        write_timestamp(&mut out, Timestamp::None, at()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[2024-01-02T03:04:05.000006] [03:04:05.000006] "
        );
    }

    #[test]
    fn test_labels_and_deletions() {
        let route = Event::Route {
            deleted: true,
            route: Route {
                dst: Some("10.0.0.0/8".parse().unwrap()),
                dev: Some("eth0".into()),
                ..Default::default()
            },
        };
        let line = EventLine {
            event: &route,
            label: true,
        };
        assert_eq!(
            text(&line),
            "[ROUTE] Deleted 10.0.0.0/8 dev eth0 proto unspec scope global metric 0\n"
        );

        let link = Event::Link {
            deleted: false,
            link: Link {
                index: 3,
                name: "dummy0".into(),
                mtu: 1500,
                ..Default::default()
            },
        };
        let line = EventLine {
            event: &link,
            label: false,
        };
        assert!(text(&line).starts_with("3: dummy0: <> mtu 1500 state UNKNOWN"));
    }

    #[test]
    fn test_address_event() {
        let mut address = Address::new("10.1.1.1/24".parse().unwrap(), "eth0");
        address.index = 2;
        let event = Event::Address {
            deleted: false,
            address,
        };
        let line = EventLine {
            event: &event,
            label: false,
        };
        assert!(text(&line).starts_with("2: eth0    inet 10.1.1.1/24 scope global\n"));
        let json = line.to_json(&OutputOptions::default());
        assert_eq!(json["ifname"], "eth0");
        assert!(json.get("deleted").is_none());
    }

    #[test]
    fn test_expire() {
        let event = XfrmEvent::Expire {
            state: XfrmState {
                src: Some("10.0.0.1".parse().unwrap()),
                dst: Some("10.0.0.2".parse().unwrap()),
                proto: Some(XfrmProto::Esp),
                spi: 256,
                mode: Some(XfrmMode::Tunnel),
                reqid: 1,
                ..Default::default()
            },
            hard: true,
        };
        let out = text(&XfrmEventLine(&event));
        assert!(out.starts_with(
            "Expired hard\nsrc 10.0.0.1 dst 10.0.0.2\n    proto esp spi 256 reqid 1 mode tunnel\n"
        ));
        assert!(out.contains("    lifetime config:\n      limit: soft (0)(bytes), hard (0)(bytes)\n"));
        assert!(out.ends_with("    stats:\n      replay-window 0 replay 0 failed 0\n"));
        assert_eq!(text(&XfrmEventLine(&XfrmEvent::Other(0x1a))), "unsupported msg type: 1a\n");
    }
}
