//! In-memory gateway.
//!
//! Keeps every object in a mutex-guarded table, applies writes to it and
//! records each call as a short line (`add_link dummy0`), so tests can
//! check both the resulting state and what was asked for. Events are
//! queued per class with [`MemoryGateway::push_event`] and replayed to
//! the next subscriber.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::{Gateway, GatewayResult, LinkChange, RouteGet, WriteMode};
use crate::error::GatewayError;
use crate::options::Family;
use crate::types::link::iff;
use crate::types::xfrm::{XfrmDir, XfrmPolicy, XfrmProto, XfrmState};
use crate::types::{
    Address, Event, EventClass, Link, Neighbor, Route, Tuntap, XfrmEvent, XfrmEventClass,
    family_of,
};

#[derive(Debug, Default)]
struct State {
    links: Vec<Link>,
    addresses: Vec<Address>,
    routes: Vec<Route>,
    neighbors: Vec<Neighbor>,
    tuntaps: Vec<Tuntap>,
    xfrm_states: Vec<XfrmState>,
    xfrm_policies: Vec<XfrmPolicy>,
    events: HashMap<EventClass, Vec<Event>>,
    xfrm_events: Vec<XfrmEvent>,
    subscriptions: Vec<EventClass>,
    calls: Vec<String>,
    next_index: u32,
    next_spi: u32,
}

/// A [`Gateway`] backed by plain vectors.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<State>,
}

fn exists(kind: &'static str, name: impl Into<String>) -> GatewayError {
    GatewayError::Kernel {
        errno: libc::EEXIST,
        message: format!("{kind} {} already exists", name.into()),
    }
}

fn not_found(kind: &'static str, name: impl Into<String>) -> GatewayError {
    GatewayError::NotFound {
        kind,
        name: name.into(),
    }
}

/// Apply a write to `items`, keyed by `same`.
fn write_keyed<T: Clone>(
    items: &mut Vec<T>,
    item: &T,
    mode: WriteMode,
    same: impl Fn(&T) -> bool,
    kind: &'static str,
    name: String,
) -> GatewayResult<()> {
    let pos = items.iter().position(&same);
    match (mode, pos) {
        (WriteMode::Create, Some(_)) => Err(exists(kind, name)),
        (WriteMode::Change, None) => Err(not_found(kind, name)),
        (WriteMode::Replace | WriteMode::Change, Some(i)) => {
            items[i] = item.clone();
            Ok(())
        }
        _ => {
            items.push(item.clone());
            Ok(())
        }
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread poisons the lock; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: String) -> MutexGuard<'_, State> {
        let mut state = self.lock();
        state.calls.push(call);
        state
    }

    /// Seed a link, assigning the next free index when it has none.
    pub fn with_link(self, mut link: Link) -> Self {
        {
            let mut state = self.lock();
            if link.index == 0 {
                state.next_index += 1;
                link.index = state.next_index;
            }
            state.next_index = state.next_index.max(link.index);
            state.links.push(link);
        }
        self
    }

    pub fn with_address(self, addr: Address) -> Self {
        self.lock().addresses.push(addr);
        self
    }

    pub fn with_route(self, route: Route) -> Self {
        self.lock().routes.push(route);
        self
    }

    pub fn with_neighbor(self, neigh: Neighbor) -> Self {
        self.lock().neighbors.push(neigh);
        self
    }

    pub fn with_tuntap(self, dev: Tuntap) -> Self {
        self.lock().tuntaps.push(dev);
        self
    }

    pub fn with_xfrm_state(self, state: XfrmState) -> Self {
        self.lock().xfrm_states.push(state);
        self
    }

    pub fn with_xfrm_policy(self, policy: XfrmPolicy) -> Self {
        self.lock().xfrm_policies.push(policy);
        self
    }

    /// Queue an event for the next subscriber of its class.
    pub fn push_event(&self, event: Event) {
        self.lock().events.entry(event.class()).or_default().push(event);
    }

    pub fn push_xfrm_event(&self, event: XfrmEvent) {
        self.lock().xfrm_events.push(event);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Classes subscribed to so far.
    pub fn subscriptions(&self) -> Vec<EventClass> {
        self.lock().subscriptions.clone()
    }

    pub fn snapshot_links(&self) -> Vec<Link> {
        self.lock().links.clone()
    }

    pub fn snapshot_addresses(&self) -> Vec<Address> {
        self.lock().addresses.clone()
    }

    pub fn snapshot_routes(&self) -> Vec<Route> {
        self.lock().routes.clone()
    }

    pub fn snapshot_neighbors(&self) -> Vec<Neighbor> {
        self.lock().neighbors.clone()
    }

    pub fn snapshot_tuntaps(&self) -> Vec<Tuntap> {
        self.lock().tuntaps.clone()
    }

    pub fn snapshot_xfrm_states(&self) -> Vec<XfrmState> {
        self.lock().xfrm_states.clone()
    }

    pub fn snapshot_xfrm_policies(&self) -> Vec<XfrmPolicy> {
        self.lock().xfrm_policies.clone()
    }
}

fn state_family(s: &XfrmState) -> u8 {
    s.dst.or(s.src).map_or(0, |a| family_of(&a))
}

fn policy_family(p: &XfrmPolicy) -> u8 {
    p.dst.or(p.src).map_or(0, |n| n.family())
}

fn same_state(a: &XfrmState, b: &XfrmState) -> bool {
    a.src == b.src && a.dst == b.dst && a.proto == b.proto && a.spi == b.spi
}

fn same_policy(a: &XfrmPolicy, b: &XfrmPolicy) -> bool {
    if a.index != 0 && b.index != 0 {
        return a.index == b.index;
    }
    a.src == b.src && a.dst == b.dst && a.dir == b.dir && a.proto == b.proto
}

fn same_route(a: &Route, b: &Route) -> bool {
    a.dst == b.dst && a.table == b.table && a.tos == b.tos && a.metric.unwrap_or(0) == b.metric.unwrap_or(0)
}

impl Gateway for MemoryGateway {
    async fn links(&self) -> GatewayResult<Vec<Link>> {
        Ok(self.record("links".into()).links.clone())
    }

    async fn add_link(&self, link: &Link) -> GatewayResult<()> {
        let mut state = self.record(format!("add_link {} {}", link.name, link.kind.name()));
        if state.links.iter().any(|l| l.name == link.name) {
            return Err(exists("link", &link.name));
        }
        let mut link = link.clone();
        state.next_index += 1;
        link.index = state.next_index;
        state.links.push(link);
        Ok(())
    }

    async fn delete_link(&self, name: &str) -> GatewayResult<()> {
        let mut state = self.record(format!("delete_link {name}"));
        let before = state.links.len();
        state.links.retain(|l| l.name != name);
        if state.links.len() == before {
            return Err(not_found("link", name));
        }
        Ok(())
    }

    async fn apply_link_change(&self, name: &str, change: &LinkChange) -> GatewayResult<()> {
        let mut state = self.record(format!("set_link {name} {change:?}"));
        let master_index = match change {
            LinkChange::Master(master) => Some(
                state
                    .links
                    .iter()
                    .find(|l| l.name == *master)
                    .map(|l| l.index)
                    .ok_or_else(|| not_found("link", master))?,
            ),
            _ => None,
        };
        let link = state
            .links
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| not_found("link", name))?;
        let toggle = |flags: &mut u32, bit: u32, on: bool| {
            if on {
                *flags |= bit;
            } else {
                *flags &= !bit;
            }
        };
        match change {
            LinkChange::Up => toggle(&mut link.flags, iff::UP, true),
            LinkChange::Down => toggle(&mut link.flags, iff::UP, false),
            LinkChange::Address(mac) => link.address = Some(mac.clone()),
            LinkChange::Arp(on) => toggle(&mut link.flags, iff::NOARP, !on),
            LinkChange::Promisc(on) => toggle(&mut link.flags, iff::PROMISC, *on),
            LinkChange::Multicast(on) => toggle(&mut link.flags, iff::MULTICAST, *on),
            LinkChange::AllMulticast(on) => toggle(&mut link.flags, iff::ALLMULTI, *on),
            LinkChange::Mtu(mtu) => link.mtu = *mtu,
            LinkChange::Name(new) => link.name = new.clone(),
            LinkChange::Alias(alias) => link.alias = Some(alias.clone()),
            LinkChange::TxQueueLen(len) => link.txqlen = *len,
            LinkChange::Group(group) => link.group = *group,
            LinkChange::Master(_) => link.master = master_index,
            LinkChange::NoMaster => link.master = None,
            LinkChange::Netns(_) => {
                let index = link.index;
                state.links.retain(|l| l.index != index);
            }
            LinkChange::Vf { .. } => {}
        }
        Ok(())
    }

    async fn addresses(&self, family: Family) -> GatewayResult<Vec<Address>> {
        let state = self.record("addresses".into());
        Ok(state
            .addresses
            .iter()
            .filter(|a| family.accepts(a.family()))
            .cloned()
            .collect())
    }

    async fn add_address(&self, addr: &Address, mode: WriteMode) -> GatewayResult<()> {
        let mut state = self.record(format!("add_address {} {}", addr.local, addr.dev));
        if !state.links.iter().any(|l| l.name == addr.dev) {
            return Err(not_found("link", &addr.dev));
        }
        write_keyed(
            &mut state.addresses,
            addr,
            mode,
            |a| a.dev == addr.dev && a.local.addr() == addr.local.addr(),
            "address",
            addr.local.to_string(),
        )
    }

    async fn delete_address(&self, addr: &Address) -> GatewayResult<()> {
        let mut state = self.record(format!("delete_address {} {}", addr.local, addr.dev));
        let before = state.addresses.len();
        state
            .addresses
            .retain(|a| !(a.dev == addr.dev && a.local.addr() == addr.local.addr()));
        if state.addresses.len() == before {
            return Err(GatewayError::from_errno(-libc::EADDRNOTAVAIL));
        }
        Ok(())
    }

    async fn routes(&self, family: Family) -> GatewayResult<Vec<Route>> {
        let state = self.record("routes".into());
        Ok(state
            .routes
            .iter()
            .filter(|r| family.accepts(r.family()))
            .cloned()
            .collect())
    }

    async fn add_route(&self, route: &Route, mode: WriteMode) -> GatewayResult<()> {
        let mut state = self.record(format!("add_route {} {mode:?}", route.destination()));
        write_keyed(
            &mut state.routes,
            route,
            mode,
            |r| same_route(r, route),
            "route",
            route.destination(),
        )
    }

    async fn delete_route(&self, route: &Route) -> GatewayResult<()> {
        let mut state = self.record(format!("delete_route {}", route.destination()));
        let before = state.routes.len();
        state.routes.retain(|r| !same_route(r, route));
        if state.routes.len() == before {
            return Err(GatewayError::from_errno(-libc::ESRCH));
        }
        Ok(())
    }

    async fn get_route(&self, req: &RouteGet) -> GatewayResult<Vec<Route>> {
        let state = self.record(format!("get_route {}", req.dst));
        let best = state
            .routes
            .iter()
            .filter(|r| {
                r.dst.is_none_or(|d| d.contains(&req.dst))
                    && family_of(&req.dst) == r.family()
                    && req.oif.as_ref().is_none_or(|oif| r.dev.as_ref() == Some(oif))
            })
            .max_by_key(|r| r.dst.map_or(0, |d| d.prefix_len()));
        match best {
            Some(route) => Ok(vec![route.clone()]),
            None => Err(GatewayError::from_errno(-libc::ENETUNREACH)),
        }
    }

    async fn neighbors(&self, family: Family) -> GatewayResult<Vec<Neighbor>> {
        let state = self.record("neighbors".into());
        Ok(state
            .neighbors
            .iter()
            .filter(|n| family.accepts(n.family()))
            .cloned()
            .collect())
    }

    async fn add_neighbor(&self, neigh: &Neighbor, mode: WriteMode) -> GatewayResult<()> {
        let mut state = self.record(format!("add_neighbor {} {}", neigh.dst, neigh.dev));
        if !state.links.iter().any(|l| l.name == neigh.dev) {
            return Err(not_found("link", &neigh.dev));
        }
        write_keyed(
            &mut state.neighbors,
            neigh,
            mode,
            |n| n.dst == neigh.dst && n.dev == neigh.dev,
            "neighbour",
            neigh.dst.to_string(),
        )
    }

    async fn delete_neighbor(&self, neigh: &Neighbor) -> GatewayResult<()> {
        let mut state = self.record(format!("delete_neighbor {} {}", neigh.dst, neigh.dev));
        let before = state.neighbors.len();
        state
            .neighbors
            .retain(|n| !(n.dst == neigh.dst && n.dev == neigh.dev));
        if state.neighbors.len() == before {
            return Err(GatewayError::from_errno(-libc::ENOENT));
        }
        Ok(())
    }

    async fn tuntaps(&self) -> GatewayResult<Vec<Tuntap>> {
        Ok(self.record("tuntaps".into()).tuntaps.clone())
    }

    async fn add_tuntap(&self, dev: &Tuntap) -> GatewayResult<()> {
        let mut state = self.record(format!("add_tuntap {} {}", dev.name, dev.mode.name()));
        let mut dev = dev.clone();
        if dev.name.is_empty() {
            let used = state.tuntaps.iter().filter(|t| t.mode == dev.mode).count();
            dev.name = format!("{}{used}", dev.mode.name());
        }
        if state.tuntaps.iter().any(|t| t.name == dev.name) {
            return Err(exists("device", dev.name));
        }
        state.tuntaps.push(dev);
        Ok(())
    }

    async fn delete_tuntap(&self, dev: &Tuntap) -> GatewayResult<()> {
        let mut state = self.record(format!("delete_tuntap {}", dev.name));
        let before = state.tuntaps.len();
        state.tuntaps.retain(|t| t.name != dev.name);
        if state.tuntaps.len() == before {
            return Err(not_found("device", &dev.name));
        }
        Ok(())
    }

    async fn xfrm_states(&self, family: Family) -> GatewayResult<Vec<XfrmState>> {
        let state = self.record("xfrm_states".into());
        Ok(state
            .xfrm_states
            .iter()
            .filter(|s| family.accepts(state_family(s)))
            .cloned()
            .collect())
    }

    async fn add_xfrm_state(&self, xs: &XfrmState, update: bool) -> GatewayResult<()> {
        let mut state = self.record(format!("add_xfrm_state spi 0x{:x} update {update}", xs.spi));
        let mode = if update { WriteMode::Change } else { WriteMode::Create };
        write_keyed(
            &mut state.xfrm_states,
            xs,
            mode,
            |s| same_state(s, xs),
            "state",
            format!("spi 0x{:x}", xs.spi),
        )
    }

    async fn delete_xfrm_state(&self, xs: &XfrmState) -> GatewayResult<()> {
        let mut state = self.record(format!("delete_xfrm_state spi 0x{:x}", xs.spi));
        let before = state.xfrm_states.len();
        state.xfrm_states.retain(|s| !same_state(s, xs));
        if state.xfrm_states.len() == before {
            return Err(GatewayError::from_errno(-libc::ESRCH));
        }
        Ok(())
    }

    async fn flush_xfrm_states(&self, proto: Option<XfrmProto>) -> GatewayResult<()> {
        let mut state = self.record(format!("flush_xfrm_states {proto:?}"));
        state
            .xfrm_states
            .retain(|s| proto.is_some_and(|p| s.proto != Some(p)));
        Ok(())
    }

    async fn alloc_spi(&self, xs: &XfrmState, min: u32, max: u32) -> GatewayResult<XfrmState> {
        let mut state = self.record(format!("alloc_spi {min} {max}"));
        let spi = state.next_spi.max(min).max(0x100);
        if spi > max {
            return Err(GatewayError::from_errno(-libc::ENOENT));
        }
        state.next_spi = spi + 1;
        let mut allocated = xs.clone();
        allocated.spi = spi;
        state.xfrm_states.push(allocated.clone());
        Ok(allocated)
    }

    async fn xfrm_policies(&self, family: Family) -> GatewayResult<Vec<XfrmPolicy>> {
        let state = self.record("xfrm_policies".into());
        Ok(state
            .xfrm_policies
            .iter()
            .filter(|p| family.accepts(policy_family(p)))
            .cloned()
            .collect())
    }

    async fn add_xfrm_policy(&self, policy: &XfrmPolicy, update: bool) -> GatewayResult<()> {
        let mut state = self.record(format!("add_xfrm_policy update {update}"));
        let mode = if update { WriteMode::Change } else { WriteMode::Create };
        write_keyed(
            &mut state.xfrm_policies,
            policy,
            mode,
            |p| same_policy(p, policy),
            "policy",
            "selector".into(),
        )
    }

    async fn delete_xfrm_policy(&self, policy: &XfrmPolicy) -> GatewayResult<()> {
        let mut state = self.record("delete_xfrm_policy".into());
        let before = state.xfrm_policies.len();
        state.xfrm_policies.retain(|p| !same_policy(p, policy));
        if state.xfrm_policies.len() == before {
            return Err(GatewayError::from_errno(-libc::ENOENT));
        }
        Ok(())
    }

    async fn get_xfrm_policy(&self, policy: &XfrmPolicy) -> GatewayResult<XfrmPolicy> {
        let state = self.record("get_xfrm_policy".into());
        state
            .xfrm_policies
            .iter()
            .find(|p| same_policy(p, policy))
            .cloned()
            .ok_or_else(|| GatewayError::from_errno(-libc::ENOENT))
    }

    async fn flush_xfrm_policies(&self, dir: Option<XfrmDir>) -> GatewayResult<()> {
        let mut state = self.record(format!("flush_xfrm_policies {dir:?}"));
        state
            .xfrm_policies
            .retain(|p| dir.is_some_and(|d| p.dir != Some(d)));
        Ok(())
    }

    async fn subscribe(&self, class: EventClass) -> GatewayResult<mpsc::Receiver<Event>> {
        let mut state = self.record(format!("subscribe {}", class.label()));
        state.subscriptions.push(class);
        let events = state.events.remove(&class).unwrap_or_default();
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity covers every queued event.
            let _ = tx.try_send(event);
        }
        Ok(rx)
    }

    async fn subscribe_xfrm(
        &self,
        classes: &[XfrmEventClass],
    ) -> GatewayResult<mpsc::Receiver<XfrmEvent>> {
        let mut state = self.record(format!("subscribe_xfrm {classes:?}"));
        let events = std::mem::take(&mut state.xfrm_events);
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            let _ = tx.try_send(event);
        }
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LinkKind, TuntapMode};

    fn dummy(name: &str) -> Link {
        Link {
            name: name.into(),
            kind: LinkKind::Dummy,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_links_lifecycle() {
        let gw = MemoryGateway::new().with_link(dummy("lo"));
        gw.add_link(&dummy("d0")).await.unwrap();
        assert!(gw.add_link(&dummy("d0")).await.is_err());
        assert_eq!(gw.link_by_name("d0").await.unwrap().index, 2);
        gw.apply_link_change("d0", &LinkChange::Up).await.unwrap();
        assert!(gw.link_by_name("d0").await.unwrap().is_up());
        gw.delete_link("d0").await.unwrap();
        assert!(gw.link_by_name("d0").await.unwrap_err().is_not_found());
        assert_eq!(gw.calls()[0], "add_link d0 dummy");
    }

    #[tokio::test]
    async fn test_master_resolution() {
        let gw = MemoryGateway::new()
            .with_link(dummy("eth0"))
            .with_link(Link {
                name: "blue".into(),
                kind: LinkKind::Vrf { table: 10 },
                ..Default::default()
            });
        gw.apply_link_change("eth0", &LinkChange::Master("blue".into()))
            .await
            .unwrap();
        assert_eq!(gw.link_by_name("eth0").await.unwrap().master, Some(2));
        assert!(
            gw.apply_link_change("eth0", &LinkChange::Master("red".into()))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_route_modes() {
        let gw = MemoryGateway::new();
        let r = Route {
            dst: Some("10.0.0.0/8".parse().unwrap()),
            dev: Some("eth0".into()),
            ..Default::default()
        };
        gw.add_route(&r, WriteMode::Create).await.unwrap();
        assert!(gw.add_route(&r, WriteMode::Create).await.is_err());
        gw.add_route(&r, WriteMode::Replace).await.unwrap();
        gw.add_route(&r, WriteMode::Append).await.unwrap();
        assert_eq!(gw.snapshot_routes().len(), 2);
        let got = gw
            .get_route(&RouteGet::new("10.1.1.1".parse().unwrap()))
            .await
            .unwrap();
        assert_eq!(got[0].dst, r.dst);
        assert!(gw.get_route(&RouteGet::new("11.0.0.1".parse().unwrap())).await.is_err());
    }

    #[tokio::test]
    async fn test_tuntap_auto_name() {
        let gw = MemoryGateway::new();
        gw.add_tuntap(&Tuntap {
            mode: TuntapMode::Tap,
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(gw.snapshot_tuntaps()[0].name, "tap0");
    }

    #[tokio::test]
    async fn test_events_replay_then_close() {
        let gw = MemoryGateway::new();
        gw.push_event(Event::Link {
            deleted: false,
            link: dummy("d0"),
        });
        let mut rx = gw.subscribe(EventClass::Link).await.unwrap();
        assert!(matches!(rx.recv().await, Some(Event::Link { .. })));
        assert!(rx.recv().await.is_none());
        assert_eq!(gw.subscriptions(), [EventClass::Link]);
    }
}
