//! Central application state management
//!
//! The single place where dependencies are wired: database pool, Redis
//! connection, outbound mail queue and the auth service composed from them.

use crate::config::Config;
use crate::db;
use crate::services::email::{Mailer, OutboundEmail};
use crate::services::AuthService;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: ConnectionManager,
    pub config: Arc<Config>,
    pub auth: AuthService,
}

impl AppState {
    /// Initialize all application state.
    ///
    /// Returns the state plus the receiving end of the outbound email queue;
    /// the caller decides where the dispatcher runs.
    pub async fn initialize(
        config: Config,
    ) -> anyhow::Result<(Self, mpsc::Receiver<OutboundEmail>)> {
        tracing::info!("Initializing application state...");

        let db = db::create_pool(&config.database.url, config.database.max_connections).await?;

        if !config.is_production() {
            tracing::info!("Running database migrations...");
            match db::run_migrations(&db).await {
                Ok(_) => tracing::info!("Migrations completed"),
                Err(e) => {
                    // Tolerate migration errors in dev (may have version mismatches)
                    tracing::warn!("Migration error (tolerated in non-prod): {:#}", e);
                }
            }
        }

        let redis_client = redis::Client::open(config.redis.url.as_str())?;
        let redis = redis_client.get_connection_manager().await?;
        tracing::info!("Redis connection established");

        let (mailer, outbox_rx) = Mailer::channel();

        let config = Arc::new(config);
        let auth = AuthService::new(db.clone(), redis.clone(), mailer, config.clone());

        Ok((
            Self {
                db,
                redis,
                config,
                auth,
            },
            outbox_rx,
        ))
    }
}
