mod configuration;
mod error;
mod routes;
mod state;
mod uploads;

use raznet::coordinator::Coordinator;
use raznet::providers::ollama::OllamaProvider;
use raznet::tools::WebTools;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = configuration::Settings::new()?;
    let addr = settings.server.socket_addr()?;

    let provider_config = settings.provider.into_config();
    info!(
        host = %provider_config.host,
        chat = %provider_config.chat_model,
        tools = %provider_config.tool_model,
        vision = %provider_config.vision_model,
        "using ollama"
    );
    let provider = OllamaProvider::new(provider_config)?;
    let tools = WebTools::new(settings.tools.into_config());
    let coordinator = Coordinator::new(Arc::new(provider), Arc::new(tools))?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads = uploads::UploadDir::open(&settings.uploads.dir)?;
    info!(dir = %uploads.root().display(), "accepting attachments");

    let app = routes::configure(state::AppState::new(coordinator, uploads)).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
