//! Packet framing and header-codec properties.

use scamp::{read_packet, write_packet, Envelope, Packet, PacketType};
use std::io::Cursor;
use tokio::io::BufReader;

#[tokio::test]
async fn worked_header_example_decodes_as_specified() {
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
async fn every_packet_type_round_trips_through_the_wire() {
    for packet_type in [
        PacketType::Data,
        PacketType::Eof,
        PacketType::Txerr,
        PacketType::Ack,
    ] {
        let pkt = Packet {
            packet_type,
            msg_no: 42,
            header: None,
            body: b"payload".to_vec(),
        };
        let mut buf = Vec::new();
        write_packet(&mut buf, &pkt).await.unwrap();
        let mut reader = BufReader::new(Cursor::new(buf));
        let read_back = read_packet(&mut reader).await.unwrap();
        assert_eq!(read_back, pkt);
    }
}

#[tokio::test]
async fn truncated_body_fails_without_panicking() {
    let wire = b"DATA 0 20\r\ntoo short";
    let mut reader = BufReader::new(Cursor::new(wire.to_vec()));
    assert!(read_packet(&mut reader).await.is_err());
}

#[tokio::test]
async fn wrong_trailer_is_rejected() {
    let wire = b"DATA 0 3\r\nabcWRONGTRAILER";
    let mut reader = BufReader::new(Cursor::new(wire.to_vec()));
    assert!(read_packet(&mut reader).await.is_err());
}

#[tokio::test]
async fn bare_newline_prefix_is_tolerated() {
    let wire = b"EOF 9 0\nEND\r\n";
    let mut reader = BufReader::new(Cursor::new(wire.to_vec()));
    let pkt = read_packet(&mut reader).await.unwrap();
    assert_eq!(pkt.packet_type, PacketType::Eof);
    assert_eq!(pkt.msg_no, 9);
}

#[tokio::test]
async fn invalid_envelope_token_is_rejected() {
    let wire = b"HEADER 0 45\r\n{\"action\":\"a\",\"version\":1,\"envelope\":\"xml\"}END\r\n";
    let mut reader = BufReader::new(Cursor::new(wire.to_vec()));
    assert!(read_packet(&mut reader).await.is_err());
}
