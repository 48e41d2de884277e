//! Inbound reply value object (spec §3, §9 decision 2).

use crate::header::{MessageType, PacketHeader};
use crate::packet::{Packet, PacketType};

/// A single reply. `is_error` selects whether the terminator packet is EOF
/// (normal completion) or TXERR (the service reported a failure); either
/// way `blob` carries the payload bytes, recovered from `reply.go`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub blob: Vec<u8>,
    pub is_error: bool,
}

impl Reply {
    pub fn ok(blob: impl Into<Vec<u8>>) -> Self {
        Reply {
            blob: blob.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Reply {
            blob: message.into().into_bytes(),
            is_error: true,
        }
    }

    /// Convert to `[HEADER, DATA, EOF|TXERR]`, tagged with `msg_no`.
    pub fn to_packets(&self, msg_no: i64) -> [Packet; 3] {
        let header = PacketHeader {
            message_type: Some(MessageType::Reply),
            request_id: String::new(),
            action: None,
            envelope: None,
            version: None,
        };
        let terminator_type = if self.is_error {
            PacketType::Txerr
        } else {
            PacketType::Eof
        };
        [
            Packet {
                packet_type: PacketType::Header,
                msg_no,
                header: Some(header),
                body: Vec::new(),
            },
            Packet {
                packet_type: PacketType::Data,
                msg_no,
                header: None,
                body: self.blob.clone(),
            },
            Packet::terminator(terminator_type, msg_no),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_reply_terminates_with_eof() {
        let reply = Reply::ok(b"pong".to_vec());
        let [_, data, terminator] = reply.to_packets(5);
        assert_eq!(data.packet_type, PacketType::Data);
        assert_eq!(data.body, b"pong");
        assert_eq!(terminator.packet_type, PacketType::Eof);
    }

    #[test]
    fn error_reply_terminates_with_txerr() {
        let reply = Reply::error("unknown action foo.bar");
        let [_, data, terminator] = reply.to_packets(5);
        assert_eq!(data.body, b"unknown action foo.bar");
        assert_eq!(terminator.packet_type, PacketType::Txerr);
        assert!(reply.is_error);
    }
}
