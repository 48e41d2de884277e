use std::env;

use scamp::Reply;
use scamp_service::{Service, ServiceConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let config = ServiceConfig::from_env().expect("SCAMP_BIND_ADDR/SCAMP_SERVICE_CERT/SCAMP_SERVICE_KEY must be set");
    let mut service = Service::bind(&config).await.expect("failed to bind");

    service.register("echo.echo", |request| async move {
        info!(action = %request.action, request_id = %request.request_id, "echoing");
        Reply::ok(request.request_id.into_bytes())
    });

    service.run().await
}
