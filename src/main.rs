use jobboard::app::{AppServices, router};
use jobboard::core::auth::PasswordHasher;
use jobboard::core::bootstrap;
use jobboard::core::config::Config;
use jobboard::core::db::{DbConfig, Stores, connect};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: database={}, prefix={}, init={}, admin_email={}",
        config.has_database(),
        config.api_prefix,
        config.should_init,
        config.admin_email.is_some()
    );

    let stores = match &config.database_url {
        Some(url) => Stores::postgres(connect(&DbConfig::new(url.as_str())).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            Stores::in_memory()
        }
    };

    let hasher = PasswordHasher::default();

    if config.should_init {
        bootstrap::seed(
            &stores,
            &hasher,
            &config.api_prefix,
            config.admin_account().as_ref(),
        )
        .await?;
    }

    let services = AppServices::new(&config, &stores, hasher);
    let app = router(&config, &services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on http://{}{}", config.bind_addr, config.api_prefix);

    axum::serve(listener, app).await?;

    Ok(())
}
