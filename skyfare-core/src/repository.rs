use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus, BookingWithFlight, NewBooking};
use crate::flight::{Flight, FlightSearchParams, FlightStatus};
use crate::identity::{AuthIdentity, AuthUser, Session};
use crate::payment::{Payment, PaymentStatus};
use crate::user::User;

pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Repository trait for the flight catalog.
#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn search(&self, params: &FlightSearchParams) -> Result<Vec<Flight>, BackendError>;

    async fn get(&self, id: Uuid) -> Result<Option<Flight>, BackendError>;

    /// Single conditional decrement of `available_seats`. Returns the
    /// updated row, or `None` when fewer than `seats` are available.
    async fn reserve_seats(&self, id: Uuid, seats: i32) -> Result<Option<Flight>, BackendError>;

    /// Puts seats back after a failed booking attempt.
    async fn release_seats(&self, id: Uuid, seats: i32) -> Result<Option<Flight>, BackendError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: FlightStatus,
    ) -> Result<Option<Flight>, BackendError>;
}

/// Repository trait for booking rows.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create(&self, booking: &NewBooking) -> Result<Booking, BackendError>;

    /// Bookings with joined flight detail, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<BookingWithFlight>, BackendError>;

    async fn get_with_flight(&self, id: Uuid) -> Result<Option<BookingWithFlight>, BackendError>;

    /// Unconditional status flip; returns the number of rows touched.
    async fn set_status(&self, id: Uuid, status: BookingStatus) -> Result<u64, BackendError>;
}

/// Repository trait for payment rows.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(
        &self,
        booking_id: Uuid,
        amount: f64,
        payment_method: &str,
    ) -> Result<Payment, BackendError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>, BackendError>;

    async fn get_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>, BackendError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, BackendError>;

    /// Marks the payment completed and stamps the transaction id in one
    /// update.
    async fn complete(
        &self,
        id: Uuid,
        transaction_id: &str,
    ) -> Result<Option<Payment>, BackendError>;
}

/// Repository trait for user profile rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, BackendError>;

    async fn get(&self, id: Uuid) -> Result<Option<User>, BackendError>;

    async fn insert(&self, user: &User) -> Result<(), BackendError>;
}

/// Seam to the managed backend's auth layer: identity provisioning,
/// credential checks and token verification all round-trip through it.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Administrative identity creation, bypassing signup friction such as
    /// email confirmation.
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthIdentity, BackendError>;

    /// `Ok(None)` means the credentials were rejected; `Err` means the
    /// backend itself failed.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Option<Session>, BackendError>;

    /// Resolves the user behind a raw access token. `Ok(None)` means the
    /// token did not verify or the identity no longer exists.
    async fn get_user(&self, token: &str) -> Result<Option<AuthUser>, BackendError>;
}
