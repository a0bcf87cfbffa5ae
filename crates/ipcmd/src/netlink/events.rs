//! Multicast listener turning rtnetlink notifications into [`Event`]s.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::message::{MessageIter, msg_type};
use super::route::RTM_F_CLONED;
use super::socket::{NetlinkSocket, groups};
use super::{addr, link, neigh, route};
use crate::gateway::GatewayResult;
use crate::types::{Event, EventClass};

/// Events buffered before the reader blocks the socket task.
const CHANNEL_DEPTH: usize = 256;

/// Multicast groups carrying one event class.
pub fn groups_for(class: EventClass) -> &'static [u32] {
    match class {
        EventClass::Link => &[groups::RTNLGRP_LINK],
        EventClass::Address => &[groups::RTNLGRP_IPV4_IFADDR, groups::RTNLGRP_IPV6_IFADDR],
        EventClass::Route => &[groups::RTNLGRP_IPV4_ROUTE, groups::RTNLGRP_IPV6_ROUTE],
        EventClass::Neigh => &[groups::RTNLGRP_NEIGH],
    }
}

/// Decode one notification. `names` tracks link renames and removals.
pub fn decode(
    kind: u16,
    payload: &[u8],
    names: &mut HashMap<u32, String>,
) -> GatewayResult<Option<Event>> {
    let name_of = |names: &HashMap<u32, String>, index: u32| {
        names.get(&index).cloned().unwrap_or_else(|| index.to_string())
    };
    let event = match kind {
        msg_type::RTM_NEWLINK | msg_type::RTM_DELLINK => {
            let deleted = kind == msg_type::RTM_DELLINK;
            let mut decoded = link::decode(payload)?;
            if let Some(parent) = decoded.parent {
                link::set_parent_name(&mut decoded.link.kind, name_of(names, parent));
            }
            if deleted {
                names.remove(&decoded.link.index);
            } else {
                names.insert(decoded.link.index, decoded.link.name.clone());
            }
            Event::Link {
                deleted,
                link: decoded.link,
            }
        }
        msg_type::RTM_NEWADDR | msg_type::RTM_DELADDR => {
            let mut address = addr::decode(payload)?;
            address.dev = name_of(names, address.index);
            Event::Address {
                deleted: kind == msg_type::RTM_DELADDR,
                address,
            }
        }
        msg_type::RTM_NEWROUTE | msg_type::RTM_DELROUTE => {
            let decoded = route::decode(payload, names)?;
            if decoded.flags & RTM_F_CLONED != 0 {
                return Ok(None);
            }
            Event::Route {
                deleted: kind == msg_type::RTM_DELROUTE,
                route: decoded,
            }
        }
        msg_type::RTM_NEWNEIGH | msg_type::RTM_DELNEIGH => {
            let mut entry = neigh::decode(payload)?;
            entry.dev = name_of(names, entry.index);
            Event::Neigh {
                deleted: kind == msg_type::RTM_DELNEIGH,
                neigh: entry,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}

/// Join the groups for `class` and forward decoded events until the
/// receiver is dropped or the socket fails.
pub fn spawn(
    mut socket: NetlinkSocket,
    class: EventClass,
    mut names: HashMap<u32, String>,
) -> GatewayResult<mpsc::Receiver<Event>> {
    for group in groups_for(class) {
        socket.add_membership(*group)?;
    }
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
    tokio::spawn(async move {
        debug!(?class, "listening for events");
        loop {
            let data = match socket.recv_msg().await {
                Ok(data) => data,
                Err(e) => {
                    warn!("event socket failed: {e}");
                    return;
                }
            };
            for msg in MessageIter::new(&data) {
                let (header, payload) = match msg {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("dropping malformed notification: {e}");
                        break;
                    }
                };
                match decode(header.nlmsg_type, payload, &mut names) {
                    Ok(Some(event)) if event.class() == class => {
                        if tx.send(event).await.is_err() {
                            trace!("event receiver gone");
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("dropping undecodable notification: {e}"),
                }
            }
        }
    });
    Ok(rx)
}
