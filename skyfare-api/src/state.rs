use std::sync::Arc;

use skyfare_booking::{BookingService, FlightService, IdentityService, PaymentService};
use skyfare_core::repository::AuthBackend;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub flights: FlightService,
    pub bookings: BookingService,
    pub payments: PaymentService,
    pub identity: IdentityService,
    pub auth_backend: Arc<dyn AuthBackend>,
    pub auth: AuthConfig,
}
