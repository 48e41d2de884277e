//! SCAMP: a multiplexed request/reply transport over a persistent,
//! mutually-authenticated TLS stream.

mod connection;
mod error;
mod fingerprint;
mod header;
mod packet;
mod reply;
mod request;
mod session;
pub mod tls;

pub use connection::{Connection, Role};
pub use error::ScampError;
pub use fingerprint::fingerprint_der;
pub use header::{Envelope, MessageType, PacketHeader};
pub use packet::{read_packet, write_packet, Packet, PacketType};
pub use reply::Reply;
pub use request::{generate_request_id, Request};
pub use session::Session;
