//! Request/response exchanges over one socket.

use tracing::trace;

use super::builder::MessageBuilder;
use super::message::{
    MessageIter, NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, error_code, msg_type,
};
use super::namespace::{Namespace, within};
use super::socket::NetlinkSocket;
use crate::error::GatewayError;
use crate::gateway::GatewayResult;

/// One reply message: its type and the payload after the header.
#[derive(Debug, Clone)]
pub struct Reply {
    pub msg_type: u16,
    pub payload: Vec<u8>,
}

/// One netlink socket with sequence tracking.
pub struct Connection {
    socket: NetlinkSocket,
}

impl Connection {
    /// Open a connection, inside `ns` when given.
    pub fn open(ns: Option<&Namespace>, rcvbuf: Option<usize>) -> GatewayResult<Self> {
        let socket = within(ns, || NetlinkSocket::new(rcvbuf))?;
        Ok(Self { socket })
    }

    pub fn into_socket(self) -> NetlinkSocket {
        self.socket
    }

    async fn send(&self, mut builder: MessageBuilder) -> GatewayResult<u32> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());
        let msg = builder.finish();
        trace!(seq, len = msg.len(), "netlink send");
        self.socket.send(&msg).await?;
        Ok(seq)
    }

    /// Send a request that only expects an ACK.
    pub async fn request_ack(&self, builder: MessageBuilder) -> GatewayResult<()> {
        let seq = self.send(builder).await?;
        loop {
            let data = self.socket.recv_msg().await?;
            for msg in MessageIter::new(&data) {
                let (header, payload) = msg?;
                if header.nlmsg_seq != seq || !header.is_error() {
                    continue;
                }
                return check(error_code(payload)?);
            }
        }
    }

    /// Send a request answered by a single message, e.g. `RTM_GETROUTE`
    /// for one destination.
    pub async fn request_one(&self, builder: MessageBuilder) -> GatewayResult<Reply> {
        let seq = self.send(builder).await?;
        loop {
            let data = self.socket.recv_msg().await?;
            for msg in MessageIter::new(&data) {
                let (header, payload) = msg?;
                if header.nlmsg_seq != seq {
                    continue;
                }
                if header.is_error() {
                    check(error_code(payload)?)?;
                    return Err(GatewayError::Malformed("ACK without a reply".into()));
                }
                return Ok(Reply {
                    msg_type: header.nlmsg_type,
                    payload: payload.to_vec(),
                });
            }
        }
    }

    /// Send a dump request and collect every reply up to `NLMSG_DONE`.
    pub async fn dump(&self, builder: MessageBuilder) -> GatewayResult<Vec<Reply>> {
        let seq = self.send(builder).await?;
        let mut replies = Vec::new();
        loop {
            let data = self.socket.recv_msg().await?;
            for msg in MessageIter::new(&data) {
                let (header, payload) = msg?;
                if header.nlmsg_seq != seq {
                    continue;
                }
                if header.is_done() {
                    trace!(seq, count = replies.len(), "dump complete");
                    return Ok(replies);
                }
                if header.is_error() {
                    check(error_code(payload)?)?;
                    continue;
                }
                replies.push(Reply {
                    msg_type: header.nlmsg_type,
                    payload: payload.to_vec(),
                });
            }
        }
    }
}

fn check(code: i32) -> GatewayResult<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(GatewayError::from_errno(code))
    }
}

/// Start a dump request.
pub fn dump_request(kind: u16) -> MessageBuilder {
    MessageBuilder::new(kind, NLM_F_REQUEST | NLM_F_DUMP)
}

/// Start a request that expects an ACK, with extra `NLM_F_*` bits.
pub fn ack_request(kind: u16, flags: u16) -> MessageBuilder {
    MessageBuilder::new(kind, NLM_F_REQUEST | NLM_F_ACK | flags)
}

/// Start a request answered by one message.
pub fn get_request(kind: u16) -> MessageBuilder {
    MessageBuilder::new(kind, NLM_F_REQUEST)
}

/// Whether a message type announces a deletion.
pub fn is_delete(kind: u16) -> bool {
    matches!(
        kind,
        msg_type::RTM_DELLINK | msg_type::RTM_DELADDR | msg_type::RTM_DELROUTE | msg_type::RTM_DELNEIGH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check() {
        assert!(check(0).is_ok());
        assert_eq!(check(-libc::EEXIST).unwrap_err().errno(), Some(libc::EEXIST));
    }

    #[test]
    fn test_is_delete() {
        assert!(is_delete(msg_type::RTM_DELROUTE));
        assert!(!is_delete(msg_type::RTM_NEWLINK));
    }
}
