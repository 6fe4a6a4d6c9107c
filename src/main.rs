use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::io;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth_service::app_state::AppState;
use auth_service::background;
use auth_service::config::Config;
use auth_service::routes::configure_routes;
use auth_service::services::email::{spawn_dispatcher, EmailTransport};

#[actix_web::main]
async fn main() -> io::Result<()> {
    if cfg!(debug_assertions) {
        dotenvy::dotenv().ok();
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    tracing::info!("Starting auth-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let (state, outbox_rx) =
        AppState::initialize(config).await.map_err(|e| {
            io::Error::new(io::ErrorKind::Other, format!("initialization failed: {e:#}"))
        })?;

    // Outbound email dispatcher: flows enqueue, this task sends.
    let transport = EmailTransport::new(&state.config.email)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("email transport: {e}")))?;
    let _dispatcher = spawn_dispatcher(outbox_rx, transport);

    // Hourly verification expiry sweep.
    let _sweeper = background::spawn_verification_sweeper(state.db.clone());

    let bind_addr = (state.config.app.host.clone(), state.config.app.port);
    tracing::info!("Listening on {}:{}", bind_addr.0, bind_addr.1);

    let app_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
