use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skyfare_api::{app, state::AuthConfig, AppState};
use skyfare_booking::{BookingService, FlightService, IdentityService, PaymentService};
use skyfare_store::{
    DbClient, FlightFeed, PgAuthBackend, PgBookingRepository, PgFlightRepository,
    PgPaymentRepository, PgUserRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyfare_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = skyfare_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!("Starting Skyfare API on port {}", config.server.port);

    // Backend Connection
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to the database backend")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Flight change feed for the status streams
    let feed = FlightFeed::new(100);

    let flight_repo = Arc::new(PgFlightRepository::new(db.pool.clone()));
    let booking_repo = Arc::new(PgBookingRepository::new(db.pool.clone()));
    let payment_repo = Arc::new(PgPaymentRepository::new(db.pool.clone()));
    let user_repo = Arc::new(PgUserRepository::new(db.pool.clone()));
    let auth_backend = Arc::new(PgAuthBackend::new(db.pool.clone(), &config.auth));

    let app_state = AppState {
        flights: FlightService::new(flight_repo.clone(), feed.clone()),
        bookings: BookingService::new(
            flight_repo,
            booking_repo,
            payment_repo.clone(),
            feed.clone(),
            config.business_rules.strict_status_transitions,
        ),
        payments: PaymentService::new(payment_repo),
        identity: IdentityService::new(user_repo, auth_backend.clone()),
        auth_backend,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listener")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
