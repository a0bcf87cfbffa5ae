//! Global flag parsing.
//!
//! iproute2 spells long options with one dash and accepts any unique
//! prefix (`-br`, `-det`, `-family inet`). [`normalise`] rewrites the
//! leading flag section into the `--long` form clap expects and leaves
//! the object arguments alone.

use clap::{ArgAction, Parser};
use ipcmd::options::Flags;

/// Long flags, in the order prefixes are tried.
const LONG_FLAGS: &[&str] = &[
    "stats",
    "details",
    "loops",
    "human",
    "iec",
    "json",
    "pretty",
    "brief",
    "oneline",
    "resolve",
    "color",
    "rcvbuf",
    "timestamp",
    "tshort",
    "all",
    "numeric",
    "batch",
    "force",
    "netns",
    "family",
    "version",
    "help",
];

/// Short spellings that are not prefixes of their long name.
const ALIASES: &[(&str, &str)] = &[
    ("br", "brief"),
    ("rc", "rcvbuf"),
    ("ts", "tshort"),
];

/// Flags followed by a separate value.
const TAKES_VALUE: &[&str] = &[
    "--family", "--loops", "--rcvbuf", "--batch", "--netns", "-f", "-l", "-b", "-n",
];

fn long_name(word: &str) -> Option<&'static str> {
    if let Some((_, long)) = ALIASES.iter().find(|(short, _)| *short == word) {
        return Some(long);
    }
    if let Some(exact) = LONG_FLAGS.iter().find(|l| **l == word) {
        return Some(exact);
    }
    let mut matches = LONG_FLAGS.iter().filter(|l| l.starts_with(word));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Rewrite the leading flags of `args` (program name first) for clap.
pub fn normalise<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    let mut args = args.into_iter();
    let mut out: Vec<String> = args.next().into_iter().collect();
    while let Some(arg) = args.next() {
        if arg == "--" || !arg.starts_with('-') || arg == "-" {
            out.push(arg);
            break;
        }
        let rewritten = match arg.strip_prefix('-') {
            Some(word) if !word.starts_with('-') && word.len() > 1 => {
                let (word, value) = match word.split_once('=') {
                    Some((w, v)) => (w, Some(v)),
                    None => (word, None),
                };
                match long_name(word) {
                    Some(long) => match value {
                        Some(v) => format!("--{long}={v}"),
                        None => format!("--{long}"),
                    },
                    None => arg.clone(),
                }
            }
            _ => arg.clone(),
        };
        let needs_value = TAKES_VALUE.contains(&rewritten.as_str());
        out.push(rewritten);
        if needs_value && let Some(value) = args.next() {
            out.push(value);
        }
    }
    out.extend(args);
    out
}

#[derive(Parser, Debug)]
#[command(
    name = "ip",
    version,
    about = "Network configuration tool",
    disable_help_flag = true
)]
pub struct Cli {
    /// Print help. `-h` means human-readable output.
    #[allow(dead_code)]
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Use IPv4 only.
    #[arg(short = '4')]
    inet4: bool,

    /// Use IPv6 only.
    #[arg(short = '6')]
    inet6: bool,

    /// Show all families.
    #[arg(short = '0')]
    link: bool,

    /// Bridge family (not supported).
    #[arg(short = 'B')]
    bridge: bool,

    /// MPLS family (not supported).
    #[arg(short = 'M')]
    mpls: bool,

    /// Protocol family: inet, inet6, mpls or link.
    #[arg(short = 'f', long)]
    family: Option<String>,

    /// Show statistics; may be repeated.
    #[arg(short = 's', long, action = ArgAction::Count)]
    stats: u8,

    /// Show details.
    #[arg(short = 'd', long)]
    details: bool,

    /// Maximum number of flush loops.
    #[arg(short = 'l', long)]
    loops: Option<u32>,

    /// Human-readable rates.
    #[arg(short = 'h', long)]
    human: bool,

    /// Use 1024-based units.
    #[arg(long)]
    iec: bool,

    /// Output JSON.
    #[arg(short = 'j', long)]
    json: bool,

    /// Pretty print JSON.
    #[arg(short = 'p', long)]
    pretty: bool,

    /// Brief tabular output.
    #[arg(long)]
    brief: bool,

    /// One record per line.
    #[arg(short = 'o', long)]
    oneline: bool,

    /// Resolve names (not supported).
    #[arg(short = 'r', long)]
    resolve: bool,

    /// Colour output (not supported).
    #[arg(short = 'c', long, num_args = 0..=1, default_missing_value = "always")]
    color: Option<String>,

    /// Netlink receive buffer size.
    #[arg(long)]
    rcvbuf: Option<String>,

    /// Timestamp monitor output.
    #[arg(short = 't', long)]
    timestamp: bool,

    /// Short timestamps.
    #[arg(long)]
    tshort: bool,

    /// Apply to all objects.
    #[arg(short = 'a', long)]
    all: bool,

    /// Print numbers instead of names.
    #[arg(short = 'N', long)]
    numeric: bool,

    /// Read commands from a file.
    #[arg(short = 'b', long)]
    batch: Option<std::path::PathBuf>,

    /// Keep going after batch errors.
    #[arg(long)]
    force: bool,

    /// Run in the named network namespace.
    #[arg(short = 'n', long)]
    netns: Option<String>,

    /// OBJECT and its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    pub fn flags(&self) -> Flags {
        Flags {
            family: self.family.clone(),
            inet4: self.inet4,
            inet6: self.inet6,
            bridge: self.bridge,
            mpls: self.mpls,
            link: self.link,
            details: self.details,
            stats: self.stats > 0,
            loops: self.loops,
            human: self.human,
            iec: self.iec,
            json: self.json,
            pretty: self.pretty,
            brief: self.brief,
            oneline: self.oneline,
            resolve: self.resolve,
            color: self.color.clone(),
            rcvbuf: self.rcvbuf.clone(),
            timestamp: self.timestamp,
            timestamp_short: self.tshort,
            all: self.all,
            numeric: self.numeric,
            batch: self.batch.clone(),
            force: self.force,
            netns: self.netns.clone(),
        }
    }
}
