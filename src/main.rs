use std::net::SocketAddr;

use anyhow::anyhow;
use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use callscribe_gateway::{ServerConfig, routes, state::AppState};

/// Callscribe Gateway - Telephony speech-to-text server
#[derive(Parser, Debug)]
#[command(name = "callscribe-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Override the configured bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from the environment, with CLI overrides
    let mut config = ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let address = config.address();
    let cors_layer = build_cors_layer(config.cors_allowed_origins.as_deref());
    let default_size_class = config.default_size_class;
    let preload = config.preload_model;

    // Create application state
    let app_state = AppState::new(config);

    // Warm up the default engine so the first request does not pay the model
    // load. Failure is non-fatal: the registry retries on first use.
    if preload {
        info!(size_class = %default_size_class, "preloading default transcription engine");
        if let Err(e) = app_state.transcriber.preload(default_size_class).await {
            warn!(error = %e, "engine preload failed, will retry on first request");
        }
    }

    let app = routes::api::create_api_router()
        .with_state(app_state)
        .layer(cors_layer);

    // Parse socket address
    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    info!("Server listening on http://{}", socket_addr);

    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Configure CORS: `*` allows every origin, a comma-separated list allows
/// exactly those, absence means same-origin only.
fn build_cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    match allowed_origins {
        Some("*") => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers([CONTENT_TYPE]),
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(methods)
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(true)
        }
        // No CORS configured - same-origin only
        None => CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([CONTENT_TYPE]),
    }
}
