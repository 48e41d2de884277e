//! Peer-certificate fingerprinting used for trust pinning (spec §6.2).
//!
//! SHA-1 over the raw DER bytes, rendered as uppercase hex pairs joined by
//! colons. Matches `util_cert.go`'s `CertFingerprint` bit for bit.

use sha1::{Digest, Sha1};
use tokio::net::TcpStream;

use crate::error::ScampError;

/// Render a DER-encoded certificate's SHA-1 fingerprint.
pub fn fingerprint_der(der: &[u8]) -> String {
    let digest = Sha1::digest(der);
    let mut out = String::with_capacity(digest.len() * 3 - 1);
    for (i, byte) in digest.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

/// Fingerprint the leaf certificate the peer presented during a client-side
/// handshake.
pub fn peer_fingerprint_client(
    stream: &tokio_rustls::client::TlsStream<TcpStream>,
) -> Result<String, ScampError> {
    let (_, conn) = stream.get_ref();
    let leaf = conn
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or_else(|| ScampError::Tls("peer presented no certificate".to_owned()))?;
    Ok(fingerprint_der(leaf))
}

/// Fingerprint the leaf certificate the peer presented during a server-side
/// handshake (i.e. the connecting client's certificate).
pub fn peer_fingerprint_server(
    stream: &tokio_rustls::server::TlsStream<TcpStream>,
) -> Result<String, ScampError> {
    let (_, conn) = stream.get_ref();
    let leaf = conn
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or_else(|| ScampError::Tls("peer presented no certificate".to_owned()))?;
    Ok(fingerprint_der(leaf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector_matches_published_fingerprint() {
        // A 1-byte "certificate" whose SHA-1 digest is well known, used only
        // to pin the hex/colon rendering; real certs are exercised in
        // tests/end_to_end.rs against scamp-testkit's generated CA.
        let der = b"";
        let fp = fingerprint_der(der);
        assert_eq!(fp, "DA:39:A3:EE:5E:6B:4B:0D:32:55:BF:EF:95:60:18:90:AF:D8:07:09");
    }

    #[test]
    fn fingerprint_has_nineteen_colons() {
        let fp = fingerprint_der(b"some der bytes");
        assert_eq!(fp.matches(':').count(), 19);
    }
}
