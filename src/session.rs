//! A single request/reply exchange multiplexed over a connection (spec §3,
//! §4.3).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex, RwLock};

use crate::connection::{Assembled, ConnWriter, SlotState};
use crate::error::ScampError;
use crate::header::Envelope;
use crate::packet::write_packet;
use crate::reply::Reply;
use crate::request::Request;

/// A live exchange identified by its message number. On the client side,
/// created by [`crate::connection::Connection::call`] (fire the request,
/// await the reply). On the service side, handed out by
/// [`crate::connection::Connection::accept_session`] already carrying the
/// inbound request.
pub struct Session {
    msg_no: i64,
    writer: Arc<Mutex<ConnWriter>>,
    sessions: Arc<RwLock<HashMap<i64, SlotState>>>,
    inbound: Mutex<Option<oneshot::Receiver<Result<Assembled, ScampError>>>>,
}

impl Session {
    pub(crate) fn new(
        msg_no: i64,
        writer: Arc<Mutex<ConnWriter>>,
        sessions: Arc<RwLock<HashMap<i64, SlotState>>>,
        inbound: oneshot::Receiver<Result<Assembled, ScampError>>,
    ) -> Self {
        Session {
            msg_no,
            writer,
            sessions,
            inbound: Mutex::new(Some(inbound)),
        }
    }

    pub fn msg_no(&self) -> i64 {
        self.msg_no
    }

    /// Await the reply to a request this session was opened for.
    pub async fn recv_reply(&self) -> Result<Reply, ScampError> {
        let assembled = self.take_inbound().await?;
        Ok(Reply {
            blob: assembled.body,
            is_error: assembled.is_error,
        })
    }

    /// Await the request this session was created to carry.
    pub async fn recv_request(&self) -> Result<Request, ScampError> {
        let assembled = self.take_inbound().await?;
        let header = assembled
            .header
            .ok_or_else(|| ScampError::BadHeader("request had no header packet".to_owned()))?;
        let action = header
            .action
            .ok_or_else(|| ScampError::BadHeader("request header missing action".to_owned()))?;
        Ok(Request {
            request_id: header.request_id,
            action,
            envelope: header.envelope.unwrap_or(Envelope::Json),
            version: header.version.unwrap_or(1),
        })
    }

    /// Send a reply on this session, terminating it.
    pub async fn reply(&self, reply: &Reply) -> Result<(), ScampError> {
        let mut writer = self.writer.lock().await;
        for pkt in reply.to_packets(self.msg_no) {
            write_packet(&mut writer.writer, &pkt).await?;
        }
        Ok(())
    }

    /// Release this session's slot. Required by the client workflow after
    /// `recv_reply` returns (spec: send → recv_reply → free); also used to
    /// give up on a session early, e.g. a caller-side timeout abandoning a
    /// reply that never arrives. After this call, packets still arriving
    /// for this message number are treated as unknown (routed nowhere,
    /// dropped by the router) rather than delivered here.
    pub async fn free(&self) {
        self.sessions.write().await.remove(&self.msg_no);
    }

    async fn take_inbound(&self) -> Result<Assembled, ScampError> {
        let receiver = self
            .inbound
            .lock()
            .await
            .take()
            .ok_or_else(|| ScampError::ChannelClosed)?;
        receiver.await.map_err(|_| ScampError::ChannelClosed)?
    }
}
