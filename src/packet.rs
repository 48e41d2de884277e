//! Wire framing for one packet (spec §4.1):
//!
//! ```text
//! <TYPE> <MSGNO> <BODYLEN>\r\n
//! <BODY bytes exactly BODYLEN>
//! END\r\n
//! ```

use crate::error::ScampError;
use crate::header::PacketHeader;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const TRAILER: &[u8; 5] = b"END\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Header,
    Data,
    Eof,
    Txerr,
    Ack,
}

impl PacketType {
    fn as_token(self) -> &'static str {
        match self {
            PacketType::Header => "HEADER",
            PacketType::Data => "DATA",
            PacketType::Eof => "EOF",
            PacketType::Txerr => "TXERR",
            PacketType::Ack => "ACK",
        }
    }

    fn from_token(token: &str) -> Result<Self, ScampError> {
        match token {
            "HEADER" => Ok(PacketType::Header),
            "DATA" => Ok(PacketType::Data),
            "EOF" => Ok(PacketType::Eof),
            "TXERR" => Ok(PacketType::Txerr),
            "ACK" => Ok(PacketType::Ack),
            other => Err(ScampError::UnknownPacketType(other.to_owned())),
        }
    }
}

/// The atomic unit on the wire. Owns its body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub msg_no: i64,
    pub header: Option<PacketHeader>,
    pub body: Vec<u8>,
}

impl Packet {
    pub fn terminator(packet_type: PacketType, msg_no: i64) -> Self {
        Packet {
            packet_type,
            msg_no,
            header: None,
            body: Vec::new(),
        }
    }
}

/// Read one packet from `reader`.
///
/// `reader` must be a single [`tokio::io::BufReader`] attached to the
/// stream for the connection's whole lifetime — see spec §4.1/§9 on why a
/// fresh buffered reader per call is incorrect (it can read-ahead past the
/// trailer and swallow the next packet's prefix).
pub async fn read_packet<R>(reader: &mut R) -> Result<Packet, ScampError>
where
    R: AsyncBufRead + AsyncRead + Unpin,
{
    let mut line = Vec::new();
    let bytes_read = reader
        .read_until(b'\n', &mut line)
        .await
        .map_err(ScampError::Io)?;
    if bytes_read == 0 {
        return Err(ScampError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed before a packet prefix arrived",
        )));
    }

    // Tolerate either "\r\n" or a bare "\n" terminating the prefix line.
    while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
        line.pop();
    }
    let line = String::from_utf8(line)
        .map_err(|e| ScampError::MalformedPrefix(format!("prefix line was not UTF-8: {e}")))?;

    let mut fields = line.split_whitespace();
    let type_token = fields
        .next()
        .ok_or_else(|| ScampError::MalformedPrefix("missing packet type".to_owned()))?;
    let msg_no: i64 = fields
        .next()
        .ok_or_else(|| ScampError::MalformedPrefix("missing message number".to_owned()))?
        .parse()
        .map_err(|e| ScampError::MalformedPrefix(format!("bad message number: {e}")))?;
    let body_len: usize = fields
        .next()
        .ok_or_else(|| ScampError::MalformedPrefix("missing body length".to_owned()))?
        .parse()
        .map_err(|e| ScampError::MalformedPrefix(format!("bad body length: {e}")))?;
    if fields.next().is_some() {
        return Err(ScampError::MalformedPrefix(
            "too many fields in prefix line".to_owned(),
        ));
    }

    let packet_type = PacketType::from_token(type_token)?;

    let mut body = vec![0u8; body_len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|_| ScampError::TruncatedBody { expected: body_len })?;

    let mut trailer = [0u8; 5];
    reader
        .read_exact(&mut trailer)
        .await
        .map_err(|_| ScampError::MissingTrailer)?;
    if &trailer != TRAILER {
        return Err(ScampError::MissingTrailer);
    }

    let header = if packet_type == PacketType::Header {
        Some(PacketHeader::decode(&body)?)
    } else {
        None
    };

    Ok(Packet {
        packet_type,
        msg_no,
        header,
        body,
    })
}

/// Write one packet to `writer`. The caller is responsible for holding a
/// connection-wide send lock across every packet of one request/reply so
/// that writes from concurrent senders never interleave (spec §5).
pub async fn write_packet<W>(writer: &mut W, pkt: &Packet) -> Result<(), ScampError>
where
    W: AsyncWrite + Unpin,
{
    let encoded_header;
    let body: &[u8] = if pkt.packet_type == PacketType::Header {
        encoded_header = pkt
            .header
            .as_ref()
            .map(PacketHeader::encode)
            .unwrap_or_default();
        &encoded_header
    } else {
        &pkt.body
    };

    let prefix = format!("{} {} {}\r\n", pkt.packet_type.as_token(), pkt.msg_no, body.len());
    writer.write_all(prefix.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.write_all(TRAILER).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Envelope, MessageType};
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn spec_worked_header_example_round_trips() {
        let wire = b"HEADER 1 46\r\n{\"action\":\"foo\",\"version\":1,\"envelope\":\"json\"}END\r\n";
        let mut reader = BufReader::new(Cursor::new(wire.to_vec()));
        let pkt = read_packet(&mut reader).await.unwrap();
        assert_eq!(pkt.packet_type, PacketType::Header);
        assert_eq!(pkt.msg_no, 1);
        let header = pkt.header.unwrap();
        assert_eq!(header.action.as_deref(), Some("foo"));
        assert_eq!(header.version, Some(1));
        assert_eq!(header.envelope, Some(Envelope::Json));
    }

    #[tokio::test]
    async fn truncated_body_is_reported() {
        let wire = b"DATA 0 10\r\nabc";
        let mut reader = BufReader::new(Cursor::new(wire.to_vec()));
        let err = read_packet(&mut reader).await.unwrap_err();
        assert!(matches!(err, ScampError::TruncatedBody { expected: 10 }));
    }

    #[tokio::test]
    async fn wrong_trailer_is_reported() {
        let wire = b"DATA 0 3\r\nabcNOPE";
        let mut reader = BufReader::new(Cursor::new(wire.to_vec()));
        let err = read_packet(&mut reader).await.unwrap_err();
        assert!(matches!(err, ScampError::MissingTrailer));
    }

    #[tokio::test]
    async fn unknown_type_is_reported() {
        let wire = b"NOPE 0 0\r\nEND\r\n";
        let mut reader = BufReader::new(Cursor::new(wire.to_vec()));
        let err = read_packet(&mut reader).await.unwrap_err();
        assert!(matches!(err, ScampError::UnknownPacketType(_)));
    }

    #[tokio::test]
    async fn missing_prefix_field_is_reported() {
        let wire = b"HEADER 1\r\n";
        let mut reader = BufReader::new(Cursor::new(wire.to_vec()));
        let err = read_packet(&mut reader).await.unwrap_err();
        assert!(matches!(err, ScampError::MalformedPrefix(_)));
    }

    #[tokio::test]
    async fn bad_envelope_fails_with_bad_header() {
        let wire = b"HEADER 0 45\r\n{\"action\":\"a\",\"version\":1,\"envelope\":\"xml\"}END\r\n";
        let mut reader = BufReader::new(Cursor::new(wire.to_vec()));
        let err = read_packet(&mut reader).await.unwrap_err();
        assert!(matches!(err, ScampError::BadHeader(_)));
    }

    #[tokio::test]
    async fn write_then_read_round_trips_a_data_packet() {
        let pkt = Packet {
            packet_type: PacketType::Data,
            msg_no: 7,
            header: None,
            body: b"hello world".to_vec(),
        };
        let mut buf = Vec::new();
        write_packet(&mut buf, &pkt).await.unwrap();
        let mut reader = BufReader::new(Cursor::new(buf));
        let read_back = read_packet(&mut reader).await.unwrap();
        assert_eq!(read_back, pkt);
    }

    #[tokio::test]
    async fn write_then_read_round_trips_a_header_packet() {
        let header = PacketHeader {
            message_type: Some(MessageType::Request),
            request_id: "0123456789012345".to_owned(),
            action: Some("hello.helloworld".to_owned()),
            envelope: Some(Envelope::Json),
            version: Some(1),
        };
        let pkt = Packet {
            packet_type: PacketType::Header,
            msg_no: 0,
            header: Some(header.clone()),
            body: Vec::new(),
        };
        let mut buf = Vec::new();
        write_packet(&mut buf, &pkt).await.unwrap();
        let mut reader = BufReader::new(Cursor::new(buf));
        let read_back = read_packet(&mut reader).await.unwrap();
        assert_eq!(read_back.header.unwrap(), header);
    }

    #[tokio::test]
    async fn sequential_reads_see_consecutive_packets_without_readahead() {
        let mut buf = Vec::new();
        write_packet(&mut buf, &Packet::terminator(PacketType::Eof, 1))
            .await
            .unwrap();
        write_packet(&mut buf, &Packet::terminator(PacketType::Eof, 2))
            .await
            .unwrap();
        let mut reader = BufReader::new(Cursor::new(buf));
        let first = read_packet(&mut reader).await.unwrap();
        let second = read_packet(&mut reader).await.unwrap();
        assert_eq!(first.msg_no, 1);
        assert_eq!(second.msg_no, 2);
    }
}
