use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flight::Flight;
use crate::ParseStatusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub booking_reference: String,
    pub number_of_seats: i32,
    pub total_amount: f64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A booking with its flight joined in, as returned by the list/detail
/// operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingWithFlight {
    #[serde(flatten)]
    pub booking: Booking,
    pub flight: Flight,
}

/// Booking creation request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBooking {
    pub flight_id: Uuid,
    pub number_of_seats: i32,
    pub payment_method: String,
}

/// Fields the workflow supplies when inserting a booking row; the store
/// assigns the id and timestamps and sets the status to pending.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub booking_reference: String,
    pub number_of_seats: i32,
    pub total_amount: f64,
}
