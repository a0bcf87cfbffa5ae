//! IPsec state and policy rendering, in iproute2's tab-indented layout.

use std::io::Write;
use std::net::IpAddr;

use serde_json::{Value, json};

use crate::output::{OutputOptions, Printable};
use crate::types::IpNet;
use crate::types::xfrm::{XfrmAlgo, XfrmMark, XfrmPolicy, XfrmState};

fn addr_or_any(addr: Option<IpAddr>) -> String {
    addr.map_or_else(|| "any".to_string(), |a| a.to_string())
}

fn net_or_any(net: Option<IpNet>) -> String {
    net.map_or_else(|| "any".to_string(), |n| n.to_string())
}

fn proto_or_any<P: Copy>(proto: Option<P>, name: impl Fn(P) -> &'static str) -> &'static str {
    proto.map_or("any", name)
}

fn algo_text(algo: &XfrmAlgo, nokeys: bool) -> String {
    if nokeys {
        format!("{} {}bits", algo.name, algo.key_bits())
    } else {
        format!("{} 0x{} {}bits", algo.name, algo.key_hex(), algo.key_bits())
    }
}

fn algo_json(algo: &XfrmAlgo, nokeys: bool) -> Value {
    let mut obj = json!({ "name": algo.name, "bits": algo.key_bits() });
    if !nokeys {
        obj["key"] = json!(format!("0x{}", algo.key_hex()));
    }
    if let Some(trunc) = algo.trunc_len {
        obj["trunc_len"] = json!(trunc);
    }
    if let Some(icv) = algo.icv_len {
        obj["icv_len"] = json!(icv);
    }
    obj
}

fn mark_json(mark: &XfrmMark) -> Value {
    json!({ "value": mark.value, "mask": format!("{:x}", mark.mask) })
}

/// A security association, optionally with its keys hidden.
#[derive(Debug, Clone, Copy)]
pub struct StateView<'a> {
    pub state: &'a XfrmState,
    pub nokeys: bool,
}

impl<'a> StateView<'a> {
    pub fn new(state: &'a XfrmState, nokeys: bool) -> Self {
        Self { state, nokeys }
    }
}

impl Printable for StateView<'_> {
    fn print_text<W: Write>(&self, w: &mut W, _opts: &OutputOptions) -> std::io::Result<()> {
        let s = self.state;
        writeln!(w, "src {} dst {}", addr_or_any(s.src), addr_or_any(s.dst))?;
        writeln!(
            w,
            "\tproto {} spi 0x{:x} mode {}",
            proto_or_any(s.proto, |p| p.name()),
            s.spi,
            s.mode.unwrap_or_default().name()
        )?;

        let mut options = Vec::new();
        if s.reqid != 0 {
            options.push(format!("reqid {}", s.reqid));
        }
        if s.replay_window != 0 {
            options.push(format!("replay-window {}", s.replay_window));
        }
        if !options.is_empty() {
            writeln!(w, "\t{}", options.join(" "))?;
        }

        if let Some(auth) = &s.auth {
            match auth.trunc_len {
                Some(trunc) => writeln!(w, "\tauth-trunc {} {trunc}", algo_text(auth, self.nokeys))?,
                None => writeln!(w, "\tauth {}", algo_text(auth, self.nokeys))?,
            }
        }
        if let Some(crypt) = &s.crypt {
            writeln!(w, "\tenc {}", algo_text(crypt, self.nokeys))?;
        }
        if let Some(aead) = &s.aead {
            write!(w, "\taead {}", algo_text(aead, self.nokeys))?;
            if let Some(icv) = aead.icv_len {
                write!(w, " {icv}")?;
            }
            writeln!(w)?;
        }
        if let Some(encap) = &s.encap {
            writeln!(
                w,
                "\tencap type {} sport {} dport {} addr {}",
                encap.kind.name(),
                encap.sport,
                encap.dport,
                encap.oaddr
            )?;
        }
        if let Some(mark) = &s.mark {
            writeln!(w, "\tmark {mark}")?;
        }
        if let Some(mark) = &s.output_mark {
            writeln!(w, "\toutput-mark {mark}")?;
        }
        if s.if_id != 0 {
            writeln!(w, "\tif_id {}", s.if_id)?;
        }

        let l = &s.limits;
        if l.byte_soft != 0 || l.byte_hard != 0 {
            writeln!(w, "\tsoft-byte-limit {} hard-byte-limit {}", l.byte_soft, l.byte_hard)?;
        }
        if l.packet_soft != 0 || l.packet_hard != 0 {
            writeln!(w, "\tsoft-packet-limit {} hard-packet-limit {}", l.packet_soft, l.packet_hard)?;
        }
        if l.time_soft != 0 || l.time_hard != 0 {
            writeln!(
                w,
                "\tsoft-add-expires-seconds {} hard-add-expires-seconds {}",
                l.time_soft, l.time_hard
            )?;
        }
        if l.time_use_soft != 0 || l.time_use_hard != 0 {
            writeln!(
                w,
                "\tsoft-use-expires-seconds {} hard-use-expires-seconds {}",
                l.time_use_soft, l.time_use_hard
            )?;
        }

        let st = &s.stats;
        writeln!(
            w,
            "statistics: replay-window {} replay {} failed {} bytes {} packets {}",
            st.replay_window, st.replay, st.failed, st.bytes, st.packets
        )?;
        writeln!(w)
    }

    fn to_json(&self, _opts: &OutputOptions) -> Value {
        let s = self.state;
        let mut obj = json!({
            "src": addr_or_any(s.src),
            "dst": addr_or_any(s.dst),
            "proto": proto_or_any(s.proto, |p| p.name()),
            "spi": format!("0x{:x}", s.spi),
            "mode": s.mode.unwrap_or_default().name(),
            "reqid": s.reqid,
            "replay_window": s.replay_window,
        });
        if let Some(auth) = &s.auth {
            obj["auth"] = algo_json(auth, self.nokeys);
        }
        if let Some(crypt) = &s.crypt {
            obj["enc"] = algo_json(crypt, self.nokeys);
        }
        if let Some(aead) = &s.aead {
            obj["aead"] = algo_json(aead, self.nokeys);
        }
        if let Some(encap) = &s.encap {
            obj["encap"] = json!({
                "type": encap.kind.name(),
                "sport": encap.sport,
                "dport": encap.dport,
                "addr": encap.oaddr.to_string(),
            });
        }
        if let Some(mark) = &s.mark {
            obj["mark"] = mark_json(mark);
        }
        if let Some(mark) = &s.output_mark {
            obj["output_mark"] = mark_json(mark);
        }
        if s.if_id != 0 {
            obj["if_id"] = json!(s.if_id);
        }
        obj["stats"] = json!({
            "replay_window": s.stats.replay_window,
            "replay": s.stats.replay,
            "failed": s.stats.failed,
            "bytes": s.stats.bytes,
            "packets": s.stats.packets,
        });
        obj
    }
}

/// A security policy with its templates.
#[derive(Debug, Clone, Copy)]
pub struct PolicyView<'a>(pub &'a XfrmPolicy);

impl Printable for PolicyView<'_> {
    fn print_text<W: Write>(&self, w: &mut W, _opts: &OutputOptions) -> std::io::Result<()> {
        let p = self.0;
        writeln!(w, "src {} dst {}", net_or_any(p.src), net_or_any(p.dst))?;
        writeln!(
            w,
            "\tdir {} priority {}",
            p.dir.unwrap_or_default().name(),
            p.priority
        )?;
        writeln!(
            w,
            "\tproto {} sport {} dport {}",
            proto_or_any(p.proto, |x| x.name()),
            p.sport,
            p.dport
        )?;
        writeln!(
            w,
            "\taction {} if_id {}",
            p.action.unwrap_or_default().name(),
            p.if_id
        )?;
        if let Some(mark) = &p.mark {
            writeln!(w, "\tmark {mark}")?;
        }
        for t in &p.tmpls {
            writeln!(w, "\ttmpl src {} dst {}", addr_or_any(t.src), addr_or_any(t.dst))?;
            writeln!(
                w,
                "\t\tproto {} reqid {} mode {} spi {}",
                proto_or_any(t.proto, |x| x.name()),
                t.reqid,
                t.mode.unwrap_or_default().name(),
                t.spi
            )?;
        }
        writeln!(w)
    }

    fn to_json(&self, _opts: &OutputOptions) -> Value {
        let p = self.0;
        let mut obj = json!({
            "src": net_or_any(p.src),
            "dst": net_or_any(p.dst),
            "dir": p.dir.unwrap_or_default().name(),
            "priority": p.priority,
            "proto": proto_or_any(p.proto, |x| x.name()),
            "sport": p.sport,
            "dport": p.dport,
            "action": p.action.unwrap_or_default().name(),
            "if_id": p.if_id,
            "index": p.index,
        });
        if let Some(mark) = &p.mark {
            obj["mark"] = mark_json(mark);
        }
        let tmpls: Vec<Value> = p
            .tmpls
            .iter()
            .map(|t| {
                json!({
                    "src": addr_or_any(t.src),
                    "dst": addr_or_any(t.dst),
                    "proto": proto_or_any(t.proto, |x| x.name()),
                    "reqid": t.reqid,
                    "mode": t.mode.unwrap_or_default().name(),
                    "spi": t.spi,
                    "level": if t.optional { "use" } else { "required" },
                })
            })
            .collect();
        obj["tmpls"] = Value::Array(tmpls);
        obj
    }
}
