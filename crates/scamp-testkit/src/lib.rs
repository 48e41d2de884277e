//! In-process mutually-authenticated TLS pair for integration tests.
//!
//! Mints ephemeral certificates, binds a loopback `TcpListener`, and hands
//! back one connected [`scamp::Connection`] per side of the handshake.

use rcgen::generate_simple_self_signed;
use rustls::pki_types::ServerName;
use tokio::net::TcpListener;

use scamp::tls::{client_connector, identity_from_der, server_acceptor};
use scamp::{Connection, Role};

/// A fully handshaken side of a test pair, alongside the fingerprint its
/// peer presented, so tests can assert on pinning without re-deriving it.
pub struct Peer {
    pub connection: Connection,
    pub peer_fingerprint: String,
}

/// Stand up a loopback TLS pair: a service bound on `127.0.0.1` and a
/// client dialed straight into it. Each side presents its own ephemeral,
/// self-signed certificate — trust is never chain-validated, matching
/// production, so the two certs need no shared issuer.
pub async fn connected_pair() -> (Peer, Peer) {
    let server_cert = generate_simple_self_signed(vec!["localhost".to_owned()])
        .expect("self-signed certificate generation cannot fail for a loopback host name");
    let client_cert = generate_simple_self_signed(vec!["localhost".to_owned()])
        .expect("self-signed certificate generation cannot fail for a loopback host name");

    let server_fingerprint = scamp::fingerprint_der(server_cert.cert.der());
    let client_fingerprint = scamp::fingerprint_der(client_cert.cert.der());

    let server_identity = identity_from_der(
        vec![server_cert.cert.der().clone()],
        server_cert
            .key_pair
            .serialize_der()
            .try_into()
            .expect("rcgen emits a PKCS#8 key"),
    );
    let client_identity = identity_from_der(
        vec![client_cert.cert.der().clone()],
        client_cert
            .key_pair
            .serialize_der()
            .try_into()
            .expect("rcgen emits a PKCS#8 key"),
    );

    let acceptor = server_acceptor(server_identity).expect("valid server identity");
    let connector = client_connector(client_identity).expect("valid client identity");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("loopback listener binds");
    let addr = listener.local_addr().expect("bound listener has an address");

    let accept_task = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.expect("client dials in");
        Connection::accept(tcp, acceptor)
            .await
            .expect("service-side handshake succeeds")
    });

    let server_name = ServerName::try_from("localhost")
        .expect("\"localhost\" is a valid server name")
        .to_owned();
    let client_connection = Connection::connect(&addr.to_string(), server_name, connector)
        .await
        .expect("client-side handshake succeeds");
    let service_connection = accept_task.await.expect("accept task does not panic");

    assert_eq!(client_connection.role(), Role::Client);
    assert_eq!(service_connection.role(), Role::Service);

    (
        Peer {
            connection: client_connection,
            peer_fingerprint: server_fingerprint,
        },
        Peer {
            connection: service_connection,
            peer_fingerprint: client_fingerprint,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connected_pair_pins_each_others_fingerprint() {
        let (client, service) = connected_pair().await;
        assert_eq!(client.connection.peer_fingerprint(), client.peer_fingerprint);
        assert_eq!(service.connection.peer_fingerprint(), service.peer_fingerprint);
    }
}
