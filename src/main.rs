use std::sync::Arc;

use anyhow::Context;
use stylefinder::{create_router, init, AppState, Catalog, Config, ImageEncoder, ResnetEncoder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize the application
    init()?;

    let config = Config::from_env().context("invalid configuration")?;
    log::debug!("Configuration: {:?}", config);

    // The catalog must load before any query is accepted
    let catalog = Catalog::load(&config.catalog_path).context("failed to load catalog")?;

    let vision = config.vision.clone();
    let encoder = tokio::task::spawn_blocking(move || ResnetEncoder::load(&vision))
        .await?
        .context("failed to load image encoder")?;
    let encoder: Arc<dyn ImageEncoder> = Arc::new(encoder);

    // Initialize application state
    let state = AppState::new(config, catalog, encoder).context("failed to set up generation client")?;

    let addr = state.config.bind_addr;
    let app = create_router(&state.config).with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    log::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
