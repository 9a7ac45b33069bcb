use std::sync::Arc;

use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use news_desk::config::Config;
use news_desk::fetcher::Fetcher;
use news_desk::routes::{self, AppState};
use news_desk::speech::{CommandBackend, SpeechController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_desk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("NEWS_DESK_CONFIG").unwrap_or_else(|_| "news.toml".to_string());
    let config = Config::load_or_default(&config_path)?
        .with_backend_url(std::env::var("NEWS_BACKEND_URL").ok());
    info!("Using news backend at {}", config.backend_url);

    let fetcher = Fetcher::new(&config.backend_url)?;

    // Fall back to silence when the synthesizer isn't installed
    let speech = if config.speech.enabled {
        match CommandBackend::detect(&config.speech).await {
            Ok(backend) => SpeechController::new(Arc::new(backend)),
            Err(e) => {
                warn!("Speech unavailable, continuing without it: {}", e);
                SpeechController::silent()
            }
        }
    } else {
        info!("Speech disabled in configuration");
        SpeechController::silent()
    };

    let state = Arc::new(AppState::new(fetcher, speech));

    // Build router
    let app = routes::app(state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Server starting on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
