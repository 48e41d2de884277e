//! Action-dispatching service surface over [`scamp::Connection`] (spec
//! §4.5, §4.4's accept-loop shape).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use scamp::tls::{load_identity, server_acceptor};
use scamp::{Connection, Reply, ScampError, Session};

type BoxFuture = Pin<Box<dyn Future<Output = Reply> + Send>>;
type HandlerFn = Box<dyn Fn(scamp::Request) -> BoxFuture + Send + Sync>;

/// Where to bind, and the identity this service presents during the
/// mutual-TLS handshake.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub cert_path: String,
    pub key_path: String,
}

impl ServiceConfig {
    /// Read `SCAMP_BIND_ADDR` / `SCAMP_SERVICE_CERT` / `SCAMP_SERVICE_KEY`
    /// from the environment.
    pub fn from_env() -> Result<Self, ScampError> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| ScampError::Tls(format!("{name} must be set")))
        };
        Ok(ServiceConfig {
            bind_addr: var("SCAMP_BIND_ADDR")?,
            cert_path: var("SCAMP_SERVICE_CERT")?,
            key_path: var("SCAMP_SERVICE_KEY")?,
        })
    }
}

/// Binds one listener and dispatches inbound requests to registered action
/// handlers. One session per request, one task per session, mirroring the
/// accept-loop shape of the original dispatcher.
pub struct Service {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    handlers: HashMap<String, HandlerFn>,
}

impl Service {
    pub async fn bind(config: &ServiceConfig) -> Result<Self, ScampError> {
        let identity = load_identity(&config.cert_path, &config.key_path)?;
        let acceptor = server_acceptor(identity)?;
        let listener = tokio::net::TcpListener::bind(&config.bind_addr)
            .await
            .map_err(ScampError::Io)?;
        tracing::info!(addr = %config.bind_addr, "service listening");
        Ok(Service {
            listener,
            acceptor,
            handlers: HashMap::new(),
        })
    }

    /// Register a handler for `action`. Later registrations for the same
    /// action replace earlier ones.
    pub fn register<F, Fut>(&mut self, action: impl Into<String>, handler: F)
    where
        F: Fn(scamp::Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Reply> + Send + 'static,
    {
        self.handlers
            .insert(action.into(), Box::new(move |req| Box::pin(handler(req))));
    }

    /// Accept connections until the process is stopped, dispatching every
    /// inbound session to its registered handler.
    pub async fn run(self) -> ! {
        let handlers = Arc::new(self.handlers);
        loop {
            let (tcp, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                    continue;
                }
            };
            let acceptor = self.acceptor.clone();
            let handlers = handlers.clone();
            tokio::spawn(async move {
                match Connection::accept(tcp, acceptor).await {
                    Ok(connection) => {
                        tracing::debug!(%peer_addr, fingerprint = connection.peer_fingerprint(), "accepted");
                        serve_connection(connection, handlers).await;
                    }
                    Err(err) => tracing::warn!(%peer_addr, error = %err, "handshake failed"),
                }
            });
        }
    }
}

async fn serve_connection(connection: Connection, handlers: Arc<HashMap<String, HandlerFn>>) {
    let connection = Arc::new(connection);
    while let Some(session) = connection.accept_session().await {
        let handlers = handlers.clone();
        tokio::spawn(async move {
            if let Err(err) = dispatch(&session, &handlers).await {
                tracing::warn!(msg_no = session.msg_no(), error = %err, "session failed");
            }
        });
    }
}

async fn dispatch(
    session: &Session,
    handlers: &HashMap<String, HandlerFn>,
) -> Result<(), ScampError> {
    let request = session.recv_request().await?;
    let reply = match handlers.get(&request.action) {
        Some(handler) => handler(request).await,
        None => {
            let action = request.action.clone();
            tracing::warn!(action, "unknown action");
            Reply::error(format!("unknown action {action}"))
        }
    };
    session.reply(&reply).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use scamp::Request;

    #[tokio::test]
    async fn dispatches_registered_action_and_replies() {
        let (client_peer, service_peer) = scamp_testkit::connected_pair().await;

        let mut handlers: HashMap<String, HandlerFn> = HashMap::new();
        handlers.insert(
            "echo.ping".to_owned(),
            Box::new(|_req| Box::pin(async { Reply::ok(b"pong".to_vec()) })),
        );
        let handlers = Arc::new(handlers);

        tokio::spawn(serve_connection(service_peer.connection, handlers));

        let session = client_peer
            .connection
            .call(&Request::new("echo.ping"))
            .await
            .expect("request sends");
        let reply = session.recv_reply().await.expect("reply arrives");
        assert!(!reply.is_error);
        assert_eq!(reply.blob, b"pong");
    }

    #[tokio::test]
    async fn unknown_action_surfaces_as_txerr() {
        let (client_peer, service_peer) = scamp_testkit::connected_pair().await;
        let handlers: Arc<HashMap<String, HandlerFn>> = Arc::new(HashMap::new());

        tokio::spawn(serve_connection(service_peer.connection, handlers));

        let session = client_peer
            .connection
            .call(&Request::new("nonexistent.action"))
            .await
            .expect("request sends");
        let reply = session.recv_reply().await.expect("reply arrives");
        assert!(reply.is_error);
    }
}
