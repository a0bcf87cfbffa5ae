//! Global options resolved from command-line flags.

use std::net::IpAddr;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::types::{AF_INET, AF_INET6, AF_UNSPEC};

/// Protocol family selected with `-4`, `-6`, `-0` or `-f`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Family {
    #[default]
    All,
    V4,
    V6,
}

impl Family {
    /// `AF_*` number, with 0 for all families.
    pub fn af(&self) -> u8 {
        match self {
            Self::All => AF_UNSPEC,
            Self::V4 => AF_INET,
            Self::V6 => AF_INET6,
        }
    }

    /// Whether an object of family `af` passes this selection.
    pub fn accepts(&self, af: u8) -> bool {
        *self == Self::All || self.af() == af
    }

    pub fn accepts_addr(&self, addr: &IpAddr) -> bool {
        match self {
            Self::All => true,
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}

/// Timestamp style for monitor output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timestamp {
    #[default]
    None,
    /// `-t`: full date and time.
    Long,
    /// `-ts`: time of day only.
    Short,
}

/// Raw global flags, as parsed from the command line.
#[derive(Debug, Clone, Default)]
pub struct Flags {
    pub family: Option<String>,
    pub inet4: bool,
    pub inet6: bool,
    pub bridge: bool,
    pub mpls: bool,
    pub link: bool,
    pub details: bool,
    pub stats: bool,
    pub loops: Option<u32>,
    pub human: bool,
    pub iec: bool,
    pub json: bool,
    pub pretty: bool,
    pub brief: bool,
    pub oneline: bool,
    pub resolve: bool,
    pub color: Option<String>,
    pub rcvbuf: Option<String>,
    pub timestamp: bool,
    pub timestamp_short: bool,
    pub all: bool,
    pub numeric: bool,
    pub batch: Option<PathBuf>,
    pub force: bool,
    pub netns: Option<String>,
}

/// Validated options for one invocation.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub family: Family,
    pub output: OutputOptions,
    /// Maximum address flush attempts.
    pub loops: u32,
    pub timestamp: Timestamp,
    pub all: bool,
    pub batch: Option<PathBuf>,
    pub force: bool,
    pub netns: Option<String>,
    pub rcvbuf: Option<usize>,
}

impl Options {
    /// Validate raw flags, rejecting the combinations this tool cannot honour.
    pub fn from_flags(flags: Flags) -> Result<Self> {
        let mut family = Family::All;

        if let Some(name) = flags.family.as_deref() {
            family = match name {
                "inet" => Family::V4,
                "inet6" => Family::V6,
                "link" => Family::All,
                "mpls" => {
                    return Err(Error::unsupported(
                        "protocol family MPLS is not yet supported",
                    ));
                }
                "bridge" => {
                    return Err(Error::unsupported(
                        "protocol family bridge is not yet supported",
                    ));
                }
                other => return Err(Error::invalid(format!("invalid family {other}"))),
            };
        }
        if flags.inet4 {
            family = Family::V4;
        }
        if flags.inet6 {
            family = Family::V6;
        }
        if flags.mpls {
            return Err(Error::unsupported(
                "protocol family MPLS is not yet supported",
            ));
        }
        if flags.bridge {
            return Err(Error::unsupported(
                "protocol family bridge is not yet supported",
            ));
        }
        if flags.link {
            family = Family::All;
        }
        if flags.resolve {
            return Err(Error::unsupported("resolving DNS names is unsupported"));
        }
        if flags.color.is_some() {
            return Err(Error::unsupported("color output is unsupported"));
        }

        let rcvbuf = flags
            .rcvbuf
            .as_deref()
            .map(|s| {
                s.parse::<usize>()
                    .map_err(|e| Error::invalid(format!("failed to parse rcvbuf flag: {e}")))
            })
            .transpose()?;

        let timestamp = if flags.timestamp_short {
            Timestamp::Short
        } else if flags.timestamp {
            Timestamp::Long
        } else {
            Timestamp::None
        };

        Ok(Self {
            family,
            output: OutputOptions {
                stats: flags.stats,
                details: flags.details,
                numeric: flags.numeric,
                json: flags.json,
                pretty: flags.pretty,
                brief: flags.brief,
                oneline: flags.oneline,
                human: flags.human,
                iec: flags.iec,
            },
            loops: flags.loops.unwrap_or(1),
            timestamp,
            all: flags.all,
            batch: flags.batch,
            force: flags.force,
            netns: flags.netns,
            rcvbuf,
        })
    }
}
