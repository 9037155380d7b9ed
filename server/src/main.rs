use std::sync::Arc;

use anyhow::Context;
use api::Backend;
use server::router;
use server::settings::Settings;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tokio::runtime::Runtime::new()?.block_on(launch_server())
}

async fn launch_server() -> anyhow::Result<()> {
    let settings = Settings::new().context("failed to load settings")?;
    let backend = Backend::new(settings.backend_config()?)?;
    let app = router(Arc::new(backend), &settings.allowed_origin)
        .context("ALLOWED_ORIGIN is not a valid header value")?;

    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_address))?;
    tracing::info!("Server listening on {}", settings.bind_address);
    axum::serve(listener, app).await?;
    Ok(())
}
