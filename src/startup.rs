use crate::shutdown;
use elphi_calendar::components::{CalendarBuilder, UpstreamGateway};
use elphi_calendar::config::Config;
use elphi_calendar::error::Error;
use elphi_calendar::server::{build_router, AppState};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Server(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Build the calendar service and serve it until shutdown
pub async fn start_server(config: Config) -> miette::Result<()> {
    let gateway = UpstreamGateway::new(&config)?;
    let builder = CalendarBuilder::new(&config, gateway);
    let app = build_router(AppState::new(builder)?);

    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .map_err(Error::from)?;
    info!(
        address = %config.bind_address,
        cache_ttl_secs = config.cache_ttl.as_secs(),
        concurrency = config.fetch_concurrency,
        "Listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await
        .map_err(|e| Error::Server(format!("Server error: {}", e)))?;

    info!("Server shut down");
    Ok(())
}
