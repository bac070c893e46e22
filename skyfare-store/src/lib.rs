pub mod app_config;
pub mod auth_backend;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod flight_repo;
pub mod payment_repo;
pub mod user_repo;

pub use auth_backend::PgAuthBackend;
pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use events::FlightFeed;
pub use flight_repo::PgFlightRepository;
pub use payment_repo::PgPaymentRepository;
pub use user_repo::PgUserRepository;
