use std::net::SocketAddr;

use mcp_auth_bridge_core::app::initialize_app_state;
use mcp_auth_bridge_core::app_config::AppConfig;
use mcp_auth_bridge_core::services::background_tasks::start_cleanup_task;
use mcp_auth_bridge_core::build_router;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("mcp-auth-bridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        storage_driver = ?config.storage_driver,
        issuer = %config.issuer_url,
        "loaded configuration"
    );

    let bind_address: SocketAddr = config.bind_address.parse()?;
    let state = initialize_app_state(config).await?;

    let _cleanup_handle = start_cleanup_task(state.clone());

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!(address = %bind_address, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
