use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_relay::{config::RelayConfig, metrics::register_metrics, routes, state::AppState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    let port = config.port;
    let allowed_origins = config.allowed_origins.clone();
    let rate_limit_rpm = config.rate_limit_rpm;
    let static_dir = config.static_dir.clone();

    tracing::info!("Starting checkout-relay on port {}", port);
    tracing::info!("Upstream API: {}", config.api_base);
    tracing::info!("Client id: {}", config.credentials.masked_client_id());
    tracing::info!(
        "Token cache: {}",
        if config.token_cache { "enabled" } else { "disabled" }
    );
    tracing::info!("Upstream timeout: {:?}", config.upstream_timeout);

    register_metrics();

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize relay: {e}");
            std::process::exit(1);
        }
    };
    let state_data = web::Data::new(state);

    let governor_conf = match GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm as u64)
        .finish()
    {
        Some(conf) => conf,
        None => {
            tracing::error!("Invalid rate limit: {rate_limit_rpm} requests per minute");
            std::process::exit(1);
        }
    };

    if let Some(ref dir) = static_dir {
        tracing::info!("Serving browser client from: {}", dir);
    }

    HttpServer::new(move || {
        let cors = checkout_relay::cors::build_cors(&allowed_origins);

        let mut app = App::new()
            .app_data(state_data.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Governor::new(&governor_conf))
            .configure(routes::configure);

        // Static client last, as the catch-all
        if let Some(ref dir) = static_dir {
            app = app.service(actix_files::Files::new("/", dir).index_file("checkout.html"));
        }

        app
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
