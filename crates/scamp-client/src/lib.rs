//! Thin client surface over [`scamp::Connection`] (spec §4.5).

use rustls::pki_types::ServerName;

use scamp::tls::{client_connector, load_identity};
use scamp::{Connection, Reply, Request, ScampError};

/// Everything needed to dial a service: where it is, and the identity this
/// client presents during the mutual-TLS handshake.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub addr: String,
    pub server_name: String,
    pub cert_path: String,
    pub key_path: String,
}

impl ClientConfig {
    /// Read `SCAMP_ADDR` / `SCAMP_SERVER_NAME` / `SCAMP_CLIENT_CERT` /
    /// `SCAMP_CLIENT_KEY` from the environment, the way the forwarding
    /// stack's binaries read their connection settings.
    pub fn from_env() -> Result<Self, ScampError> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| ScampError::Tls(format!("{name} must be set")))
        };
        Ok(ClientConfig {
            addr: var("SCAMP_ADDR")?,
            server_name: var("SCAMP_SERVER_NAME")?,
            cert_path: var("SCAMP_CLIENT_CERT")?,
            key_path: var("SCAMP_CLIENT_KEY")?,
        })
    }
}

/// One dialed connection, used to fire requests at a service.
pub struct Client {
    connection: Connection,
}

impl Client {
    pub async fn dial(config: &ClientConfig) -> Result<Self, ScampError> {
        let identity = load_identity(&config.cert_path, &config.key_path)?;
        let connector = client_connector(identity)?;
        let server_name = ServerName::try_from(config.server_name.clone())
            .map_err(|e| ScampError::TlsDialFailed(e.to_string()))?;
        let connection = Connection::connect(&config.addr, server_name, connector).await?;
        tracing::info!(addr = %config.addr, fingerprint = connection.peer_fingerprint(), "connected");
        Ok(Client { connection })
    }

    /// Fingerprint the peer presented during the handshake, for callers
    /// that pin trust after the fact rather than via a CA bundle.
    pub fn peer_fingerprint(&self) -> &str {
        self.connection.peer_fingerprint()
    }

    /// Fire `action` and await its reply. Frees the session once the reply
    /// (or a failure to get one) has been observed, per the client
    /// workflow of send, `recv_reply`, free.
    pub async fn call(&self, action: &str) -> Result<Reply, ScampError> {
        let request = Request::new(action);
        let session = self.connection.call(&request).await?;
        let result = session.recv_reply().await;
        session.free().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn call_round_trips_through_an_in_process_pair() {
        let (client_peer, service_peer) = scamp_testkit::connected_pair().await;

        tokio::spawn(async move {
            let session = service_peer
                .connection
                .accept_session()
                .await
                .expect("a session arrives");
            let request = session.recv_request().await.expect("request decodes");
            assert_eq!(request.action, "echo.ping");
            session
                .reply(&scamp::Reply::ok(b"pong".to_vec()))
                .await
                .expect("reply sends");
        });

        let client = Client {
            connection: client_peer.connection,
        };
        let reply = client.call("echo.ping").await.expect("reply arrives");
        assert!(!reply.is_error);
        assert_eq!(reply.blob, b"pong");
    }
}
