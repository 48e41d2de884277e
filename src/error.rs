//! Error taxonomy for the transport, mirroring spec §7 one variant per row.

use thiserror::Error;

/// Everything that can go wrong dialing, framing, routing, or dispatching
/// on a SCAMP connection.
#[derive(Debug, Error)]
pub enum ScampError {
    #[error("TLS dial failed: {0}")]
    TlsDialFailed(String),

    #[error("TLS accept failed: {0}")]
    TlsAcceptFailed(String),

    #[error("packet body truncated before {expected} byte(s) were read")]
    TruncatedBody { expected: usize },

    #[error("packet trailer was not `END\\r\\n`")]
    MissingTrailer,

    #[error("unknown packet type `{0}`")]
    UnknownPacketType(String),

    #[error("malformed packet prefix line: {0}")]
    MalformedPrefix(String),

    #[error("bad packet header: {0}")]
    BadHeader(String),

    #[error("packet for unknown message number {0}")]
    UnknownMsgNo(i64),

    #[error("connection closed")]
    ChannelClosed,

    #[error("tls configuration error: {0}")]
    Tls(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
