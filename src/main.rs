use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use sekolah_portal::api::PortalClient;
use sekolah_portal::config::{self, DEVELOPMENT_AUTH_SECRET};
use sekolah_portal::handlers::{self, AppState};
use sekolah_portal::is_development;
use sekolah_portal::middleware::SessionGuard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up API_URL, AUTH_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = config::config();

    let default_filter = if config.server.enable_request_logging {
        "sekolah_portal=debug,tower_http=debug"
    } else {
        "sekolah_portal=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    tracing::info!("Starting sekolah-portal in {:?} mode", config.environment);

    let guard = SessionGuard::from_config();
    if !guard.keys().is_configured() {
        tracing::error!("AUTH_SECRET is not set; every guarded page will redirect to login");
    } else if !is_development!() && config.security.auth_secret == DEVELOPMENT_AUTH_SECRET {
        tracing::warn!("AUTH_SECRET is the development default outside development mode");
    }

    let client = PortalClient::from_config()?;
    tracing::info!("Backend API at {}", client.base_url());

    let state = AppState::new(client, guard);

    let mut app = handlers::router(state);
    if config.security.enable_cors {
        app = app.layer(cors_layer(&config.security.cors_origins));
    }

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Portal listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_credentials(true);

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}
