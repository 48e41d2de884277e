//! One TLS stream carrying many multiplexed sessions (spec §4.4, §5).

use std::collections::HashMap;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::error::ScampError;
use crate::header::PacketHeader;
use crate::packet::{read_packet, write_packet, Packet, PacketType};
use crate::request::Request;
use crate::session::Session;

/// Which side of the handshake a [`Connection`] plays. Governs the one
/// behavioral fork in the router: whether a packet for an unseen message
/// number starts a new session (a service receiving a request) or is
/// logged and dropped (a client, which only ever expects replies to
/// numbers it allocated itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Service,
}

impl Role {
    fn creates_session_on_unknown_msgno(self) -> bool {
        matches!(self, Role::Service)
    }
}

type DynReader = Box<dyn AsyncRead + Send + Unpin>;
type DynWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// The write half plus the monotonic message-number counter, held behind
/// one lock so the counter is never observed or advanced outside the
/// critical section that also performs the write (spec §5).
pub(crate) struct ConnWriter {
    pub(crate) writer: DynWriter,
    next_msg_no: i64,
}

impl ConnWriter {
    fn next_msg_no(&mut self) -> i64 {
        let msg_no = self.next_msg_no;
        self.next_msg_no += 1;
        msg_no
    }
}

#[derive(Default)]
struct PendingAssembly {
    header: Option<PacketHeader>,
    body: Vec<u8>,
}

/// The header plus concatenated body bytes of one fully terminated
/// exchange (a request or a reply), handed to whichever side was waiting
/// on it.
pub(crate) struct Assembled {
    pub(crate) header: Option<PacketHeader>,
    pub(crate) body: Vec<u8>,
    pub(crate) is_error: bool,
}

pub(crate) struct SlotState {
    tx: oneshot::Sender<Result<Assembled, ScampError>>,
    assembly: PendingAssembly,
}

/// One persistent, mutually-authenticated stream multiplexing many
/// sessions. Not `Clone`; share it behind an `Arc` if multiple tasks need
/// to originate calls on it.
pub struct Connection {
    role: Role,
    writer: Arc<Mutex<ConnWriter>>,
    sessions: Arc<RwLock<HashMap<i64, SlotState>>>,
    peer_fingerprint: String,
    new_sessions: Mutex<Option<mpsc::Receiver<Session>>>,
    router: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.router.abort();
    }
}

impl Connection {
    /// Dial `addr`, complete a mutually-authenticated TLS handshake
    /// presenting `identity`, and wrap the resulting stream as a
    /// client-role connection.
    pub async fn connect(
        addr: &str,
        server_name: ServerName<'static>,
        connector: TlsConnector,
    ) -> Result<Connection, ScampError> {
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|e| ScampError::TlsDialFailed(e.to_string()))?;
        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| ScampError::TlsDialFailed(e.to_string()))?;
        let fingerprint = crate::fingerprint::peer_fingerprint_client(&tls)?;
        Ok(Self::wrap(tls, Role::Client, fingerprint))
    }

    /// Accept one connection on an already-bound `TcpStream`, complete a
    /// mutually-authenticated TLS handshake, and wrap it as a
    /// service-role connection.
    pub async fn accept(tcp: TcpStream, acceptor: TlsAcceptor) -> Result<Connection, ScampError> {
        let tls = acceptor
            .accept(tcp)
            .await
            .map_err(|e| ScampError::TlsAcceptFailed(e.to_string()))?;
        let fingerprint = crate::fingerprint::peer_fingerprint_server(&tls)?;
        Ok(Self::wrap(tls, Role::Service, fingerprint))
    }

    /// Wrap any already-established duplex stream, splitting it into
    /// independent read/write halves and spawning the router task that
    /// demultiplexes inbound packets for the lifetime of the connection.
    pub fn wrap<S>(stream: S, role: Role, peer_fingerprint: String) -> Connection
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let writer = Arc::new(Mutex::new(ConnWriter {
            writer: Box::new(write_half) as DynWriter,
            next_msg_no: 0,
        }));
        let sessions: Arc<RwLock<HashMap<i64, SlotState>>> = Arc::new(RwLock::new(HashMap::new()));
        let (new_session_tx, new_session_rx) = mpsc::channel(32);
        let new_session_tx = matches!(role, Role::Service).then_some(new_session_tx);

        let router = tokio::spawn(router_loop(
            BufReader::new(Box::new(read_half) as DynReader),
            sessions.clone(),
            writer.clone(),
            role,
            new_session_tx,
        ));

        Connection {
            role,
            writer,
            sessions,
            peer_fingerprint,
            new_sessions: Mutex::new(Some(new_session_rx)),
            router,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer_fingerprint(&self) -> &str {
        &self.peer_fingerprint
    }

    /// Send `request` on a freshly allocated message number and return the
    /// session handle to await its reply on.
    pub async fn call(&self, request: &Request) -> Result<Session, ScampError> {
        let (tx, rx) = oneshot::channel();
        let mut writer = self.writer.lock().await;
        let msg_no = writer.next_msg_no();
        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                msg_no,
                SlotState {
                    tx,
                    assembly: PendingAssembly::default(),
                },
            );
        }
        for pkt in request.to_packets(msg_no) {
            write_packet(&mut writer.writer, &pkt).await?;
        }
        drop(writer);
        Ok(Session::new(msg_no, self.writer.clone(), self.sessions.clone(), rx))
    }

    /// Wait for the next inbound session started by a peer (service role
    /// only).
    pub async fn accept_session(&self) -> Option<Session> {
        let mut guard = self.new_sessions.lock().await;
        guard.as_mut()?.recv().await
    }
}

async fn router_loop(
    mut reader: BufReader<DynReader>,
    sessions: Arc<RwLock<HashMap<i64, SlotState>>>,
    writer: Arc<Mutex<ConnWriter>>,
    role: Role,
    new_session_tx: Option<mpsc::Sender<Session>>,
) {
    loop {
        let pkt = match read_packet(&mut reader).await {
            Ok(pkt) => pkt,
            Err(err) => {
                tracing::debug!(error = %err, "router shutting down");
                fail_all(&sessions, err).await;
                return;
            }
        };
        route_packet(pkt, &sessions, &writer, role, &new_session_tx).await;
    }
}

async fn fail_all(sessions: &Arc<RwLock<HashMap<i64, SlotState>>>, _err: ScampError) {
    let mut map = sessions.write().await;
    for (_, slot) in map.drain() {
        let _ = slot.tx.send(Err(ScampError::ChannelClosed));
    }
}

async fn route_packet(
    pkt: Packet,
    sessions: &Arc<RwLock<HashMap<i64, SlotState>>>,
    writer: &Arc<Mutex<ConnWriter>>,
    role: Role,
    new_session_tx: &Option<mpsc::Sender<Session>>,
) {
    let msg_no = pkt.msg_no;
    let mut map = sessions.write().await;

    if !map.contains_key(&msg_no) {
        if pkt.packet_type == PacketType::Header && role.creates_session_on_unknown_msgno() {
            let (tx, rx) = oneshot::channel();
            map.insert(
                msg_no,
                SlotState {
                    tx,
                    assembly: PendingAssembly::default(),
                },
            );
            drop(map);
            let session = Session::new(msg_no, writer.clone(), sessions.clone(), rx);
            if let Some(new_session_tx) = new_session_tx {
                if new_session_tx.send(session).await.is_err() {
                    tracing::warn!(msg_no, "no listener for new session, dropping it");
                }
            }
            map = sessions.write().await;
        } else {
            let err = ScampError::UnknownMsgNo(msg_no);
            tracing::warn!(error = %err, "dropping packet");
            return;
        }
    }

    match pkt.packet_type {
        PacketType::Header => {
            if let Some(slot) = map.get_mut(&msg_no) {
                slot.assembly.header = pkt.header;
            }
        }
        PacketType::Data => {
            if let Some(slot) = map.get_mut(&msg_no) {
                slot.assembly.body.extend_from_slice(&pkt.body);
            }
        }
        PacketType::Ack => {}
        PacketType::Eof | PacketType::Txerr => {
            if let Some(slot) = map.remove(&msg_no) {
                let assembled = Assembled {
                    header: slot.assembly.header,
                    body: slot.assembly.body,
                    is_error: pkt.packet_type == PacketType::Txerr,
                };
                let _ = slot.tx.send(Ok(assembled));
            }
        }
    }
}
