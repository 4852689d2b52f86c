use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use sewna_requests::brief::{BriefGenerator, FallbackBriefGenerator};
use sewna_requests::config::{AppConfig, API_KEY_VAR};
use sewna_requests::designers;
use sewna_requests::gemini::{CredentialSource, EnvCredential, GeminiBriefGenerator};
use sewna_requests::mock::MockBriefGenerator;
use sewna_requests::routes::{router, AppState};
use sewna_requests::submitter::{HttpSubmitter, LogSubmitter, RequestSubmitter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;

    let credentials: Arc<dyn CredentialSource> = Arc::new(EnvCredential::new(API_KEY_VAR));
    let live = GeminiBriefGenerator::new(config.gemini.clone(), credentials.clone());
    if live.is_configured() {
        tracing::info!("Gemini brief generation enabled (model {})", config.gemini.model);
    } else {
        tracing::warn!("{} is not set; design briefs will come from the mock generator", API_KEY_VAR);
    }
    let generator: Arc<dyn BriefGenerator> = Arc::new(FallbackBriefGenerator::new(
        Arc::new(live),
        Arc::new(MockBriefGenerator::with_delay(config.mock_delay)),
    ));

    let submitter: Arc<dyn RequestSubmitter> = match &config.submission_url {
        Some(url) => {
            tracing::info!("Submitting custom requests to {}", url);
            Arc::new(HttpSubmitter::new(url.clone(), config.generation_timeout)?)
        }
        None => Arc::new(LogSubmitter),
    };

    let state = AppState {
        store: Arc::default(),
        generator,
        submitter,
        credentials,
        designers: Arc::new(designers::catalogue()),
        preference_seed_count: config.preference_seed_count,
        generation_timeout: config.generation_timeout,
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
