//! `ip tuntap show` rendering.

use std::io::Write;

use serde_json::{Value, json};

use crate::output::{OutputOptions, Printable};
use crate::types::Tuntap;
use crate::types::tuntap::tun_flags;

/// A TUN/TAP device listing entry.
#[derive(Debug, Clone, Copy)]
pub struct TuntapView<'a>(pub &'a Tuntap);

impl TuntapView<'_> {
    /// Mode, queueing words, persistence and owner, in print order.
    fn words(&self) -> Vec<String> {
        let t = self.0;
        let mut words = vec![t.mode.name().to_string()];
        for (bit, word) in [
            (tun_flags::ONE_QUEUE, "one_queue"),
            (tun_flags::MULTI_QUEUE, "multi_queue"),
            (tun_flags::VNET_HDR, "vnet_hdr"),
        ] {
            if t.flags & bit != 0 {
                words.push(word.to_string());
            }
        }
        words.push(if t.non_persist { "non-persist" } else { "persist" }.to_string());
        // Owner and group 0 are how the kernel reports "unset".
        if let Some(user) = t.owner.filter(|u| *u != 0) {
            words.push(format!("user {user}"));
        }
        if let Some(group) = t.group.filter(|g| *g != 0) {
            words.push(format!("group {group}"));
        }
        words
    }
}

impl Printable for TuntapView<'_> {
    fn print_text<W: Write>(&self, w: &mut W, _opts: &OutputOptions) -> std::io::Result<()> {
        writeln!(w, "{}: {}", self.0.name, self.words().join(" "))
    }

    fn to_json(&self, _opts: &OutputOptions) -> Value {
        json!({ "ifname": self.0.name, "flags": self.words() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::print_all;
    use crate::types::TuntapMode;

    fn render(devs: &[Tuntap], opts: OutputOptions) -> String {
        let views: Vec<_> = devs.iter().map(TuntapView).collect();
        let mut out = Vec::new();
        print_all(&mut out, &views, &opts).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn tap1() -> Tuntap {
        Tuntap {
            name: "tap1".into(),
            mode: TuntapMode::Tap,
            owner: Some(1),
            group: Some(1),
            non_persist: true,
            flags: tun_flags::ONE_QUEUE | tun_flags::VNET_HDR,
        }
    }

    #[test]
    fn test_text() {
        let tun0 = Tuntap {
            name: "tun0".into(),
            ..Default::default()
        };
        assert_eq!(render(&[tun0], OutputOptions::default()), "tun0: tun persist\n");
        assert_eq!(
            render(&[tap1()], OutputOptions::default()),
            "tap1: tap one_queue vnet_hdr non-persist user 1 group 1\n"
        );
        let mq = Tuntap {
            name: "tap1".into(),
            mode: TuntapMode::Tap,
            flags: tun_flags::MULTI_QUEUE | tun_flags::NO_PI,
            ..Default::default()
        };
        assert_eq!(render(&[mq], OutputOptions::default()), "tap1: tap multi_queue persist\n");
    }

    #[test]
    fn test_json() {
        let opts = OutputOptions {
            json: true,
            ..Default::default()
        };
        assert_eq!(
            render(&[tap1()], opts),
            "[{\"ifname\":\"tap1\",\"flags\":[\"tap\",\"one_queue\",\"vnet_hdr\",\"non-persist\",\"user 1\",\"group 1\"]}]\n"
        );
    }
}
