//! `RTM_*NEIGH` encoding and decoding.

use super::attr::{attrs, get};
use super::builder::MessageBuilder;
use super::message::{NdMsg, read_header};
use crate::error::GatewayError;
use crate::gateway::GatewayResult;
use crate::types::{HardwareAddr, Neighbor};

const NDA_DST: u16 = 1;
const NDA_LLADDR: u16 = 2;

/// Decode one neighbour message. `dev` is left empty for the caller to name.
pub fn decode(payload: &[u8]) -> GatewayResult<Neighbor> {
    let hdr: NdMsg = read_header(payload)?;
    let mut dst = None;
    let mut lladdr = None;
    for (kind, data) in attrs(&payload[NdMsg::SIZE..]) {
        match kind {
            NDA_DST => dst = Some(get::ip(data)?),
            NDA_LLADDR if !data.is_empty() => lladdr = Some(HardwareAddr(data.to_vec())),
            _ => {}
        }
    }
    let dst = dst.ok_or_else(|| GatewayError::Malformed("neighbour without NDA_DST".into()))?;
    let mut neigh = Neighbor::new(dst, "");
    neigh.index = hdr.ndm_ifindex as u32;
    neigh.lladdr = lladdr;
    neigh.state = hdr.ndm_state;
    neigh.flags = hdr.ndm_flags;
    Ok(neigh)
}

/// Encode an `RTM_NEWNEIGH` or `RTM_DELNEIGH` body for link `index`.
pub fn encode(b: &mut MessageBuilder, neigh: &Neighbor, index: u32) {
    b.header(&NdMsg {
        ndm_family: neigh.family(),
        ndm_ifindex: index as i32,
        ndm_state: neigh.state,
        ndm_flags: neigh.flags,
        ..Default::default()
    });
    b.attr_ip(NDA_DST, &neigh.dst);
    if let Some(mac) = &neigh.lladdr {
        b.attr(NDA_LLADDR, mac.as_bytes());
    }
}
