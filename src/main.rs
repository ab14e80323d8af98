use audiorooms::{
    build_router, db, room, session, shared::AppState, telephony, websockets::InMemoryConnectionManager,
    AppConfig, Stores,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audiorooms=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    info!(config = ?config, "Starting audio room server");

    let stores = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await?;
            db::init_schema(&pool).await?;
            info!("Using PostgreSQL stores");
            Stores::postgres(pool)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory stores");
            Stores::in_memory()
        }
    };

    let telephony = telephony::from_config(config.telephony.as_ref());
    let app_state = AppState::new(
        &config,
        stores,
        telephony,
        Arc::new(InMemoryConnectionManager::new()),
    );

    tokio::spawn(session::start_session_purge_task(
        Arc::clone(&app_state.session_service),
        session::DEFAULT_PURGE_INTERVAL,
    ));
    tokio::spawn(room::start_room_cleanup_task(
        Arc::clone(&app_state.room_service),
        room::DEFAULT_RELEASE_INTERVAL,
    ));

    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
