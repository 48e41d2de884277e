use std::env;

use scamp_client::{Client, ClientConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let config = ClientConfig::from_env()
        .expect("SCAMP_ADDR/SCAMP_SERVER_NAME/SCAMP_CLIENT_CERT/SCAMP_CLIENT_KEY must be set");
    let client = Client::dial(&config).await.expect("failed to dial");
    info!(fingerprint = client.peer_fingerprint(), "connected");

    let reply = client.call("echo.echo").await.expect("call failed");
    if reply.is_error {
        eprintln!("echo.echo failed: {}", String::from_utf8_lossy(&reply.blob));
        std::process::exit(1);
    }
    println!("echo reply: {}", String::from_utf8_lossy(&reply.blob));
}
