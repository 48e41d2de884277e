//! Outbound request value object (spec §3, §6.3).

use rand::Rng;

use crate::header::{Envelope, MessageType, PacketHeader};
use crate::packet::{Packet, PacketType};

const REQUEST_ID_LEN: usize = 18;
const REQUEST_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// A single outbound call. Carries no body: per `request.go`, a request's
/// wire form is a HEADER packet followed directly by EOF.
#[derive(Debug, Clone)]
pub struct Request {
    pub request_id: String,
    pub action: String,
    pub envelope: Envelope,
    pub version: i64,
}

impl Request {
    pub fn new(action: impl Into<String>) -> Self {
        Request {
            request_id: generate_request_id(),
            action: action.into(),
            envelope: Envelope::Json,
            version: 1,
        }
    }

    /// Convert to the `[HEADER, EOF]` packet pair that makes up this
    /// request's wire representation, tagged with `msg_no`.
    pub fn to_packets(&self, msg_no: i64) -> [Packet; 2] {
        let header = PacketHeader {
            message_type: Some(MessageType::Request),
            request_id: self.request_id.clone(),
            action: Some(self.action.clone()),
            envelope: Some(self.envelope),
            version: Some(self.version),
        };
        [
            Packet {
                packet_type: PacketType::Header,
                msg_no,
                header: Some(header),
                body: Vec::new(),
            },
            Packet::terminator(PacketType::Eof, msg_no),
        ]
    }
}

/// Draw an 18-character `[A-Za-z]` request id, matching spec.md §6.3.
pub fn generate_request_id() -> String {
    let mut rng = rand::thread_rng();
    (0..REQUEST_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..REQUEST_ID_ALPHABET.len());
            REQUEST_ID_ALPHABET[idx] as char
        })
        .collect()
}
