use anyhow::Context;
use roomcast::{info, router, AppState, Config, HubHandle};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("roomcast=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let (hub, _hub_task) = HubHandle::spawn(config.chat.clone());

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;

    tracing::info!("local:  http://localhost:{}", config.port);
    match info::lan_addrs() {
        Ok(addrs) if addrs.is_empty() => tracing::info!("lan:    no external IPv4 interfaces"),
        Ok(addrs) => {
            for addr in addrs {
                tracing::info!("lan ({}): http://{}:{}", addr.iface, addr.ip, config.port);
            }
        }
        Err(err) => tracing::warn!(%err, "could not list network interfaces"),
    }
    tracing::info!("health: GET /health, info: GET /info");

    let app = router(AppState::new(hub, config));
    axum::serve(listener, app).await?;
    Ok(())
}
