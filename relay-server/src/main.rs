use std::net::SocketAddr;

use relay_server::config::RelayConfig;
use relay_server::{router, RelayState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let config = RelayConfig::from_env()?;
    info!(
        model = %config.model,
        streaming = config.streaming,
        "starting chat relay"
    );

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let app = router(RelayState::new(config));

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
