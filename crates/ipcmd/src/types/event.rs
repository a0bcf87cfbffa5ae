//! Live configuration-change events.

use super::{Address, Link, Neighbor, Route, xfrm::XfrmState};

/// Event stream a monitor can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventClass {
    Link,
    Address,
    Route,
    Neigh,
}

impl EventClass {
    pub const ALL: [EventClass; 4] = [Self::Link, Self::Address, Self::Route, Self::Neigh];

    /// Label printed in front of events when every class is shown.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Link => "[LINK]",
            Self::Address => "[ADDR]",
            Self::Route => "[ROUTE]",
            Self::Neigh => "[NEIGH]",
        }
    }
}

/// A change reported by the kernel.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Link { deleted: bool, link: Link },
    Address { deleted: bool, address: Address },
    Route { deleted: bool, route: Route },
    Neigh { deleted: bool, neigh: Neighbor },
}

impl Event {
    pub fn class(&self) -> EventClass {
        match self {
            Self::Link { .. } => EventClass::Link,
            Self::Address { .. } => EventClass::Address,
            Self::Route { .. } => EventClass::Route,
            Self::Neigh { .. } => EventClass::Neigh,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            Self::Link { deleted, .. }
            | Self::Address { deleted, .. }
            | Self::Route { deleted, .. }
            | Self::Neigh { deleted, .. } => *deleted,
        }
    }
}

/// xfrm message groups a monitor can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XfrmEventClass {
    Acquire,
    Expire,
    Sa,
    Aevent,
    Policy,
    Report,
}

impl XfrmEventClass {
    pub const ALL: [XfrmEventClass; 6] = [
        Self::Acquire,
        Self::Expire,
        Self::Sa,
        Self::Aevent,
        Self::Policy,
        Self::Report,
    ];

    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "acquire" => Self::Acquire,
            "expire" => Self::Expire,
            "SA" => Self::Sa,
            "aevent" => Self::Aevent,
            "policy" => Self::Policy,
            "report" => Self::Report,
            _ => return None,
        })
    }
}

/// An xfrm notification.
#[derive(Debug, Clone, PartialEq)]
pub enum XfrmEvent {
    /// An SA reached a lifetime limit.
    Expire { state: XfrmState, hard: bool },
    /// Any other message, identified by its netlink type.
    Other(u16),
}
