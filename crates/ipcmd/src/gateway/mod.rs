//! The seam between command execution and the kernel.
//!
//! Commands build typed requests and hand them to a [`Gateway`]. The
//! [`KernelGateway`](crate::netlink::KernelGateway) speaks rtnetlink; the
//! [`MemoryGateway`](memory::MemoryGateway) keeps everything in a mutex so
//! commands can be exercised without privileges.

pub mod memory;

pub use memory::MemoryGateway;

use std::net::IpAddr;

use tokio::sync::mpsc;

use crate::error::GatewayError;
use crate::filter::RouteFilter;
use crate::options::Family;
use crate::types::xfrm::{XfrmDir, XfrmPolicy, XfrmProto, XfrmState};
use crate::types::{
    Address, Event, EventClass, HardwareAddr, Link, Neighbor, Route, Tuntap, XfrmEvent,
    XfrmEventClass,
};

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// How a write treats an existing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Fail if it exists.
    #[default]
    Create,
    /// Create or overwrite.
    Replace,
    /// Add alongside existing objects with the same key.
    Append,
    /// Modify; fail if it does not exist.
    Change,
}

/// Network namespace a link is moved into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetnsTarget {
    Pid(u32),
    Name(String),
}

/// VF link state for `vf N state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfLinkState {
    Auto,
    Enable,
    Disable,
}

impl VfLinkState {
    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "auto" => Self::Auto,
            "enable" => Self::Enable,
            "disable" => Self::Disable,
            _ => return None,
        })
    }

    /// `IFLA_VF_LINK_STATE_*` value.
    pub fn value(&self) -> u32 {
        match self {
            Self::Auto => 0,
            Self::Enable => 1,
            Self::Disable => 2,
        }
    }
}

/// A change to one SR-IOV virtual function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VfChange {
    Mac(HardwareAddr),
    Vlan { vlan: u16, qos: u8 },
    /// Legacy `rate`, same as `max_tx_rate`.
    Rate(u32),
    MaxTxRate(u32),
    MinTxRate(u32),
    State(VfLinkState),
    SpoofCheck(bool),
    Trust(bool),
    NodeGuid(u64),
    PortGuid(u64),
}

/// One modification applied by `ip link set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkChange {
    Up,
    Down,
    Address(HardwareAddr),
    Arp(bool),
    Promisc(bool),
    Multicast(bool),
    AllMulticast(bool),
    Mtu(u32),
    Name(String),
    Alias(String),
    TxQueueLen(u32),
    Group(u32),
    Master(String),
    NoMaster,
    Netns(NetnsTarget),
    Vf { index: u32, change: VfChange },
}

/// `ip route get` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGet {
    pub dst: IpAddr,
    pub src: Option<IpAddr>,
    pub iif: Option<String>,
    pub oif: Option<String>,
    pub vrf: Option<String>,
}

impl RouteGet {
    pub fn new(dst: IpAddr) -> Self {
        Self {
            dst,
            src: None,
            iif: None,
            oif: None,
            vrf: None,
        }
    }
}

/// Operations the commands need from the network stack.
///
/// Names (links, VRFs, masters) are resolved by the gateway, so requests
/// carry what the user typed.
#[allow(async_fn_in_trait)]
pub trait Gateway {
    // Links

    async fn links(&self) -> GatewayResult<Vec<Link>>;

    async fn link_by_name(&self, name: &str) -> GatewayResult<Link> {
        self.links()
            .await?
            .into_iter()
            .find(|l| l.name == name)
            .ok_or_else(|| GatewayError::NotFound {
                kind: "link",
                name: name.to_string(),
            })
    }

    async fn link_by_index(&self, index: u32) -> GatewayResult<Link> {
        self.links()
            .await?
            .into_iter()
            .find(|l| l.index == index)
            .ok_or_else(|| GatewayError::NotFound {
                kind: "link",
                name: index.to_string(),
            })
    }

    /// Create a link of `link.kind`, with the attributes set on `link`.
    async fn add_link(&self, link: &Link) -> GatewayResult<()>;

    async fn delete_link(&self, name: &str) -> GatewayResult<()>;

    async fn apply_link_change(&self, name: &str, change: &LinkChange) -> GatewayResult<()>;

    // Addresses

    async fn addresses(&self, family: Family) -> GatewayResult<Vec<Address>>;

    async fn add_address(&self, addr: &Address, mode: WriteMode) -> GatewayResult<()>;

    async fn delete_address(&self, addr: &Address) -> GatewayResult<()>;

    // Routes

    async fn routes(&self, family: Family) -> GatewayResult<Vec<Route>>;

    /// Routes passing `filter`.
    async fn routes_filtered(&self, family: Family, filter: &RouteFilter) -> GatewayResult<Vec<Route>> {
        let routes = self.routes(family).await?;
        Ok(routes.into_iter().filter(|r| filter.matches(r)).collect())
    }

    async fn add_route(&self, route: &Route, mode: WriteMode) -> GatewayResult<()>;

    async fn delete_route(&self, route: &Route) -> GatewayResult<()>;

    async fn get_route(&self, req: &RouteGet) -> GatewayResult<Vec<Route>>;

    // Neighbours

    async fn neighbors(&self, family: Family) -> GatewayResult<Vec<Neighbor>>;

    async fn add_neighbor(&self, neigh: &Neighbor, mode: WriteMode) -> GatewayResult<()>;

    async fn delete_neighbor(&self, neigh: &Neighbor) -> GatewayResult<()>;

    // TUN/TAP

    async fn tuntaps(&self) -> GatewayResult<Vec<Tuntap>>;

    async fn add_tuntap(&self, dev: &Tuntap) -> GatewayResult<()>;

    async fn delete_tuntap(&self, dev: &Tuntap) -> GatewayResult<()>;

    // IPsec states

    async fn xfrm_states(&self, family: Family) -> GatewayResult<Vec<XfrmState>>;

    /// Install a state; `update` replaces an existing one.
    async fn add_xfrm_state(&self, state: &XfrmState, update: bool) -> GatewayResult<()>;

    async fn delete_xfrm_state(&self, state: &XfrmState) -> GatewayResult<()>;

    async fn flush_xfrm_states(&self, proto: Option<XfrmProto>) -> GatewayResult<()>;

    /// Reserve an SPI in `[min, max]` for the state's id, returning the new state.
    async fn alloc_spi(&self, state: &XfrmState, min: u32, max: u32) -> GatewayResult<XfrmState>;

    // IPsec policies

    async fn xfrm_policies(&self, family: Family) -> GatewayResult<Vec<XfrmPolicy>>;

    async fn add_xfrm_policy(&self, policy: &XfrmPolicy, update: bool) -> GatewayResult<()>;

    async fn delete_xfrm_policy(&self, policy: &XfrmPolicy) -> GatewayResult<()>;

    async fn get_xfrm_policy(&self, policy: &XfrmPolicy) -> GatewayResult<XfrmPolicy>;

    async fn flush_xfrm_policies(&self, dir: Option<XfrmDir>) -> GatewayResult<()>;

    // Events

    /// Start receiving events of one class.
    ///
    /// The stream ends when the sender side goes away.
    async fn subscribe(&self, class: EventClass) -> GatewayResult<mpsc::Receiver<Event>>;

    async fn subscribe_xfrm(
        &self,
        classes: &[XfrmEventClass],
    ) -> GatewayResult<mpsc::Receiver<XfrmEvent>>;
}
