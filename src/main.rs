use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use medhelp_core::constants::DEFAULT_DATA_DIR;
use medhelp_core::{CoreConfig, SigningKey, token_ttl_hours_from_env_value};

/// Main entry point for the MedHelp application
///
/// Resolves configuration once, opens the record and file stores under the data directory
/// and serves the REST API with Swagger UI at `/swagger-ui`.
///
/// # Environment Variables
/// - `MEDHELP_REST_ADDR`: REST server address (default: "0.0.0.0:8080")
/// - `MEDHELP_DATA_DIR`: Directory for records and uploaded files (default: "medhelp_data")
/// - `MEDHELP_SIGNING_KEY`: Token signing key, at least 32 bytes (required)
/// - `MEDHELP_TOKEN_TTL_HOURS`: Token lifetime in hours (default: 24)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration is invalid or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medhelp=info".parse()?)
                .add_directive("medhelp_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("MEDHELP_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());

    let data_dir = PathBuf::from(
        std::env::var("MEDHELP_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into()),
    );
    std::fs::create_dir_all(&data_dir)?;

    let signing_key = std::env::var("MEDHELP_SIGNING_KEY")
        .map_err(|_| anyhow::anyhow!("MEDHELP_SIGNING_KEY must be set"))?;
    let ttl_hours =
        token_ttl_hours_from_env_value(std::env::var("MEDHELP_TOKEN_TTL_HOURS").ok())?;

    let cfg = Arc::new(CoreConfig::new(
        data_dir,
        SigningKey::new(signing_key.into_bytes())?,
        ttl_hours,
    )?);

    tracing::info!("++ MedHelp data directory: {}", cfg.data_dir().display());
    tracing::info!("++ Starting MedHelp REST on {}", rest_addr);

    let state = AppState::open(cfg)?;
    api_rest::serve(&rest_addr, state).await
}
