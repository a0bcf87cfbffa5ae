//! rtnetlink implementation of [`Gateway`].
//!
//! Requests are framed with [`MessageBuilder`](builder::MessageBuilder),
//! sent on one [`Connection`](connection::Connection) and the replies
//! decoded into the crate's object model. Every socket is opened inside
//! the `-netns` namespace when one is given.

pub mod addr;
pub mod attr;
pub mod builder;
pub mod connection;
pub mod events;
pub mod link;
pub mod message;
pub mod namespace;
pub mod neigh;
pub mod route;
pub mod socket;
pub mod tuntap;

use std::collections::HashMap;
use std::ffi::CString;
use std::os::unix::io::AsRawFd;

use tokio::sync::mpsc;
use tracing::debug;

use self::connection::{Connection, ack_request, dump_request, get_request};
use self::message::{
    IfAddrMsg, IfInfoMsg, NLM_F_APPEND, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REPLACE, NdMsg, RtMsg,
    msg_type,
};
use self::namespace::{Namespace, within};
use crate::error::GatewayError;
use crate::gateway::{Gateway, GatewayResult, LinkChange, NetnsTarget, RouteGet, WriteMode};
use crate::options::{Family, Options};
use crate::types::xfrm::{XfrmDir, XfrmPolicy, XfrmProto, XfrmState};
use crate::types::{
    Address, Event, EventClass, Link, LinkKind, Neighbor, Route, Tuntap, XfrmEvent,
    XfrmEventClass,
};

/// `NLM_F_*` bits for a write.
pub fn write_flags(mode: WriteMode) -> u16 {
    match mode {
        WriteMode::Create => NLM_F_CREATE | NLM_F_EXCL,
        WriteMode::Replace => NLM_F_CREATE | NLM_F_REPLACE,
        WriteMode::Append => NLM_F_CREATE | NLM_F_APPEND,
        WriteMode::Change => NLM_F_REPLACE,
    }
}

fn name_to_index(name: &str) -> GatewayResult<u32> {
    let not_found = || GatewayError::NotFound {
        kind: "link",
        name: name.to_string(),
    };
    let c_name = CString::new(name).map_err(|_| not_found())?;
    // SAFETY: c_name is a valid NUL-terminated string for the whole call.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(not_found());
    }
    Ok(index)
}

/// Talks to the running kernel over `NETLINK_ROUTE`.
pub struct KernelGateway {
    conn: Connection,
    ns: Option<Namespace>,
    rcvbuf: Option<usize>,
}

impl KernelGateway {
    /// Open a gateway in the current namespace.
    pub fn new() -> GatewayResult<Self> {
        Self::open(None, None)
    }

    /// Open a gateway honouring `-netns` and `-rcvbuf`.
    pub fn from_options(opts: &Options) -> GatewayResult<Self> {
        let ns = opts.netns.as_deref().map(Namespace::open).transpose()?;
        Self::open(ns, opts.rcvbuf)
    }

    fn open(ns: Option<Namespace>, rcvbuf: Option<usize>) -> GatewayResult<Self> {
        let conn = Connection::open(ns.as_ref(), rcvbuf)?;
        if let Some(ns) = &ns {
            debug!(netns = ns.name(), "gateway opened in namespace");
        }
        Ok(Self { conn, ns, rcvbuf })
    }

    /// Index of the named link.
    ///
    /// `if_nametoindex` sees the calling thread's namespace, so inside
    /// `-netns` the kernel is asked over the gateway's own socket.
    async fn index_of(&self, name: &str) -> GatewayResult<u32> {
        if self.ns.is_none() {
            return name_to_index(name);
        }
        let mut b = get_request(msg_type::RTM_GETLINK);
        b.header(&IfInfoMsg::default());
        b.attr_str(link::ifla::IFNAME, name);
        match self.conn.request_one(b).await {
            Ok(reply) => Ok(link::decode(&reply.payload)?.link.index),
            Err(e) if e.is_not_found() => Err(GatewayError::NotFound {
                kind: "link",
                name: name.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn index_of_opt(&self, name: Option<&str>) -> GatewayResult<Option<u32>> {
        match name {
            Some(name) => Ok(Some(self.index_of(name).await?)),
            None => Ok(None),
        }
    }

    /// Index of an object's link: the recorded index, or a lookup by name.
    async fn owner_index(&self, index: u32, dev: &str) -> GatewayResult<u32> {
        if index != 0 {
            return Ok(index);
        }
        self.index_of(dev).await
    }

    async fn raw_links(&self) -> GatewayResult<Vec<link::DecodedLink>> {
        let mut b = dump_request(msg_type::RTM_GETLINK);
        b.header(&IfInfoMsg::default());
        self.conn
            .dump(b)
            .await?
            .iter()
            .filter(|r| r.msg_type == msg_type::RTM_NEWLINK)
            .map(|r| link::decode(&r.payload))
            .collect()
    }

    /// Index to name map of every link.
    async fn names(&self) -> GatewayResult<HashMap<u32, String>> {
        Ok(self
            .raw_links()
            .await?
            .into_iter()
            .map(|d| (d.link.index, d.link.name))
            .collect())
    }

    fn name_or_index(names: &HashMap<u32, String>, index: u32) -> String {
        names.get(&index).cloned().unwrap_or_else(|| index.to_string())
    }

    async fn route_refs(&self, r: &Route) -> GatewayResult<route::RouteRefs> {
        let mut hops = Vec::with_capacity(r.next_hops.len());
        for hop in &r.next_hops {
            hops.push(self.index_of_opt(hop.dev.as_deref()).await?);
        }
        Ok(route::RouteRefs {
            oif: self.index_of_opt(r.dev.as_deref()).await?,
            hops,
        })
    }

    fn xfrm_unsupported<T>(operation: &str) -> GatewayResult<T> {
        Err(GatewayError::NotSupported(format!("xfrm {operation}")))
    }
}

impl Gateway for KernelGateway {
    async fn links(&self) -> GatewayResult<Vec<Link>> {
        let decoded = self.raw_links().await?;
        let names: HashMap<u32, String> = decoded
            .iter()
            .map(|d| (d.link.index, d.link.name.clone()))
            .collect();
        let mut links: Vec<Link> = decoded
            .into_iter()
            .map(|mut d| {
                if let Some(parent) = d.parent {
                    link::set_parent_name(&mut d.link.kind, Self::name_or_index(&names, parent));
                }
                d.link
            })
            .collect();
        links.sort_by_key(|l| l.index);
        Ok(links)
    }

    async fn add_link(&self, new: &Link) -> GatewayResult<()> {
        if matches!(new.kind, LinkKind::Device | LinkKind::Tun | LinkKind::Other(_)) {
            return Err(GatewayError::NotSupported(format!(
                "creating links of type {}",
                new.kind.name()
            )));
        }
        let parent = self.index_of_opt(link::parent_name(&new.kind)).await?;
        let mut b = ack_request(msg_type::RTM_NEWLINK, NLM_F_CREATE | NLM_F_EXCL);
        link::encode_add(&mut b, new, parent);
        debug!(name = %new.name, kind = new.kind.name(), "adding link");
        self.conn.request_ack(b).await
    }

    async fn delete_link(&self, name: &str) -> GatewayResult<()> {
        let index = self.index_of(name).await?;
        let mut b = ack_request(msg_type::RTM_DELLINK, 0);
        b.header(&IfInfoMsg::with_index(index));
        self.conn.request_ack(b).await
    }

    async fn apply_link_change(&self, name: &str, change: &LinkChange) -> GatewayResult<()> {
        let index = self.index_of(name).await?;
        let mut refs = link::ChangeRefs::default();
        if let LinkChange::Master(master) = change {
            refs.master = Some(self.index_of(master).await?);
        }
        // Held open until the kernel has taken its own reference.
        let target = match change {
            LinkChange::Netns(NetnsTarget::Name(ns)) => Some(Namespace::open(ns)?),
            _ => None,
        };
        refs.netns_fd = target.as_ref().map(|ns| ns.file().as_raw_fd());
        let mut b = ack_request(msg_type::RTM_NEWLINK, 0);
        link::encode_change(&mut b, index, change, refs);
        self.conn.request_ack(b).await
    }

    async fn addresses(&self, family: Family) -> GatewayResult<Vec<Address>> {
        let names = self.names().await?;
        let mut b = dump_request(msg_type::RTM_GETADDR);
        b.header(&IfAddrMsg {
            ifa_family: family.af(),
            ..Default::default()
        });
        let mut out = Vec::new();
        for reply in self.conn.dump(b).await? {
            if reply.msg_type != msg_type::RTM_NEWADDR {
                continue;
            }
            let mut a = addr::decode(&reply.payload)?;
            if !family.accepts(a.family()) {
                continue;
            }
            a.dev = Self::name_or_index(&names, a.index);
            out.push(a);
        }
        Ok(out)
    }

    async fn add_address(&self, a: &Address, mode: WriteMode) -> GatewayResult<()> {
        let index = self.owner_index(a.index, &a.dev).await?;
        let mut b = ack_request(msg_type::RTM_NEWADDR, write_flags(mode));
        addr::encode_add(&mut b, a, index);
        self.conn.request_ack(b).await
    }

    async fn delete_address(&self, a: &Address) -> GatewayResult<()> {
        let index = self.owner_index(a.index, &a.dev).await?;
        let mut b = ack_request(msg_type::RTM_DELADDR, 0);
        addr::encode_delete(&mut b, a, index);
        self.conn.request_ack(b).await
    }

    async fn routes(&self, family: Family) -> GatewayResult<Vec<Route>> {
        let names = self.names().await?;
        let mut b = dump_request(msg_type::RTM_GETROUTE);
        b.header(&RtMsg {
            rtm_family: family.af(),
            ..Default::default()
        });
        let mut out = Vec::new();
        for reply in self.conn.dump(b).await? {
            if reply.msg_type != msg_type::RTM_NEWROUTE {
                continue;
            }
            let r = route::decode(&reply.payload, &names)?;
            if r.flags & route::RTM_F_CLONED != 0 || !family.accepts(r.family) {
                continue;
            }
            out.push(r);
        }
        Ok(out)
    }

    async fn add_route(&self, r: &Route, mode: WriteMode) -> GatewayResult<()> {
        let refs = self.route_refs(r).await?;
        let mut b = ack_request(msg_type::RTM_NEWROUTE, write_flags(mode));
        route::encode_add(&mut b, r, &refs);
        self.conn.request_ack(b).await
    }

    async fn delete_route(&self, r: &Route) -> GatewayResult<()> {
        let refs = self.route_refs(r).await?;
        let mut b = ack_request(msg_type::RTM_DELROUTE, 0);
        route::encode_delete(&mut b, r, &refs);
        self.conn.request_ack(b).await
    }

    async fn get_route(&self, req: &RouteGet) -> GatewayResult<Vec<Route>> {
        let mut refs = route::GetRefs {
            iif: self.index_of_opt(req.iif.as_deref()).await?,
            oif: self.index_of_opt(req.oif.as_deref()).await?,
            table: None,
        };
        if let Some(vrf) = &req.vrf {
            let LinkKind::Vrf { table } = self.link_by_name(vrf).await?.kind else {
                return Err(GatewayError::NotFound {
                    kind: "VRF",
                    name: vrf.clone(),
                });
            };
            refs.table = Some(table);
        }
        let names = self.names().await?;
        let mut b = get_request(msg_type::RTM_GETROUTE);
        route::encode_get(&mut b, req, refs);
        let reply = self.conn.request_one(b).await?;
        Ok(vec![route::decode(&reply.payload, &names)?])
    }

    async fn neighbors(&self, family: Family) -> GatewayResult<Vec<Neighbor>> {
        let names = self.names().await?;
        let mut b = dump_request(msg_type::RTM_GETNEIGH);
        b.header(&NdMsg {
            ndm_family: family.af(),
            ..Default::default()
        });
        let mut out = Vec::new();
        for reply in self.conn.dump(b).await? {
            if reply.msg_type != msg_type::RTM_NEWNEIGH {
                continue;
            }
            let mut n = neigh::decode(&reply.payload)?;
            if !family.accepts(n.family()) {
                continue;
            }
            n.dev = Self::name_or_index(&names, n.index);
            out.push(n);
        }
        Ok(out)
    }

    async fn add_neighbor(&self, n: &Neighbor, mode: WriteMode) -> GatewayResult<()> {
        let index = self.owner_index(n.index, &n.dev).await?;
        let mut b = ack_request(msg_type::RTM_NEWNEIGH, write_flags(mode));
        neigh::encode(&mut b, n, index);
        self.conn.request_ack(b).await
    }

    async fn delete_neighbor(&self, n: &Neighbor) -> GatewayResult<()> {
        let index = self.owner_index(n.index, &n.dev).await?;
        let mut b = ack_request(msg_type::RTM_DELNEIGH, 0);
        neigh::encode(&mut b, n, index);
        self.conn.request_ack(b).await
    }

    async fn tuntaps(&self) -> GatewayResult<Vec<Tuntap>> {
        tuntap::list()
    }

    async fn add_tuntap(&self, dev: &Tuntap) -> GatewayResult<()> {
        within(self.ns.as_ref(), || tuntap::create(dev)).map(drop)
    }

    async fn delete_tuntap(&self, dev: &Tuntap) -> GatewayResult<()> {
        within(self.ns.as_ref(), || tuntap::remove(dev))
    }

    async fn xfrm_states(&self, _family: Family) -> GatewayResult<Vec<XfrmState>> {
        Self::xfrm_unsupported("state list")
    }

    async fn add_xfrm_state(&self, _state: &XfrmState, update: bool) -> GatewayResult<()> {
        Self::xfrm_unsupported(if update { "state update" } else { "state add" })
    }

    async fn delete_xfrm_state(&self, _state: &XfrmState) -> GatewayResult<()> {
        Self::xfrm_unsupported("state delete")
    }

    async fn flush_xfrm_states(&self, _proto: Option<XfrmProto>) -> GatewayResult<()> {
        Self::xfrm_unsupported("state flush")
    }

    async fn alloc_spi(&self, _state: &XfrmState, _min: u32, _max: u32) -> GatewayResult<XfrmState> {
        Self::xfrm_unsupported("state allocspi")
    }

    async fn xfrm_policies(&self, _family: Family) -> GatewayResult<Vec<XfrmPolicy>> {
        Self::xfrm_unsupported("policy list")
    }

    async fn add_xfrm_policy(&self, _policy: &XfrmPolicy, update: bool) -> GatewayResult<()> {
        Self::xfrm_unsupported(if update { "policy update" } else { "policy add" })
    }

    async fn delete_xfrm_policy(&self, _policy: &XfrmPolicy) -> GatewayResult<()> {
        Self::xfrm_unsupported("policy delete")
    }

    async fn get_xfrm_policy(&self, _policy: &XfrmPolicy) -> GatewayResult<XfrmPolicy> {
        Self::xfrm_unsupported("policy get")
    }

    async fn flush_xfrm_policies(&self, _dir: Option<XfrmDir>) -> GatewayResult<()> {
        Self::xfrm_unsupported("policy flush")
    }

    async fn subscribe(&self, class: EventClass) -> GatewayResult<mpsc::Receiver<Event>> {
        let names = self.names().await?;
        let socket = Connection::open(self.ns.as_ref(), self.rcvbuf)?.into_socket();
        events::spawn(socket, class, names)
    }

    async fn subscribe_xfrm(
        &self,
        _classes: &[XfrmEventClass],
    ) -> GatewayResult<mpsc::Receiver<XfrmEvent>> {
        Self::xfrm_unsupported("monitor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_flags() {
        assert_eq!(write_flags(WriteMode::Create), NLM_F_CREATE | NLM_F_EXCL);
        assert_eq!(write_flags(WriteMode::Replace), NLM_F_CREATE | NLM_F_REPLACE);
        assert_eq!(write_flags(WriteMode::Append), NLM_F_CREATE | NLM_F_APPEND);
        assert_eq!(write_flags(WriteMode::Change), NLM_F_REPLACE);
    }

    #[test]
    fn test_unknown_name() {
        assert!(name_to_index("ipcmd-nope0").unwrap_err().is_not_found());
        assert!(name_to_index("bad\0name").unwrap_err().is_not_found());
    }

    #[test]
    fn test_xfrm_reports_operation() {
        let err = KernelGateway::xfrm_unsupported::<()>("state list").unwrap_err();
        assert_eq!(err.to_string(), "xfrm state list is not supported by this gateway");
    }
}
