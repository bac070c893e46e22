use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use skyfare_core::booking::{Booking, BookingStatus, BookingWithFlight, NewBooking};
use skyfare_core::flight::{Flight, FlightStatus};
use skyfare_core::repository::{BackendError, BookingRepository};

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const JOINED_SQL: &str = r#"
SELECT b.id, b.user_id, b.flight_id, b.booking_reference, b.number_of_seats,
       b.total_amount, b.status, b.created_at, b.updated_at,
       f.id AS f_id, f.flight_number AS f_flight_number, f.airline AS f_airline,
       f.origin AS f_origin, f.destination AS f_destination,
       f.departure_time AS f_departure_time, f.arrival_time AS f_arrival_time,
       f.price AS f_price, f.total_seats AS f_total_seats,
       f.available_seats AS f_available_seats, f.status AS f_status,
       f.created_at AS f_created_at, f.updated_at AS f_updated_at
FROM bookings b
JOIN flights f ON b.flight_id = f.id
"#;

#[derive(sqlx::FromRow)]
struct BookingFlightRow {
    id: Uuid,
    user_id: Uuid,
    flight_id: Uuid,
    booking_reference: String,
    number_of_seats: i32,
    total_amount: f64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    f_id: Uuid,
    f_flight_number: String,
    f_airline: String,
    f_origin: String,
    f_destination: String,
    f_departure_time: DateTime<Utc>,
    f_arrival_time: DateTime<Utc>,
    f_price: f64,
    f_total_seats: i32,
    f_available_seats: i32,
    f_status: String,
    f_created_at: DateTime<Utc>,
    f_updated_at: DateTime<Utc>,
}

impl TryFrom<BookingFlightRow> for BookingWithFlight {
    type Error = BackendError;

    fn try_from(row: BookingFlightRow) -> Result<Self, Self::Error> {
        Ok(BookingWithFlight {
            booking: Booking {
                id: row.id,
                user_id: row.user_id,
                flight_id: row.flight_id,
                booking_reference: row.booking_reference,
                number_of_seats: row.number_of_seats,
                total_amount: row.total_amount,
                status: row.status.parse::<BookingStatus>()?,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            flight: Flight {
                id: row.f_id,
                flight_number: row.f_flight_number,
                airline: row.f_airline,
                origin: row.f_origin,
                destination: row.f_destination,
                departure_time: row.f_departure_time,
                arrival_time: row.f_arrival_time,
                price: row.f_price,
                total_seats: row.f_total_seats,
                available_seats: row.f_available_seats,
                status: row.f_status.parse::<FlightStatus>()?,
                created_at: row.f_created_at,
                updated_at: row.f_updated_at,
            },
        })
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create(&self, new_booking: &NewBooking) -> Result<Booking, BackendError> {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: new_booking.user_id,
            flight_id: new_booking.flight_id,
            booking_reference: new_booking.booking_reference.clone(),
            number_of_seats: new_booking.number_of_seats,
            total_amount: new_booking.total_amount,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, flight_id, booking_reference, number_of_seats,
                                  total_amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.flight_id)
        .bind(&booking.booking_reference)
        .bind(booking.number_of_seats)
        .bind(booking.total_amount)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(booking)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<BookingWithFlight>, BackendError> {
        let sql = format!("{JOINED_SQL} WHERE b.user_id = $1 ORDER BY b.created_at DESC");
        let rows: Vec<BookingFlightRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(BookingWithFlight::try_from).collect()
    }

    async fn get_with_flight(&self, id: Uuid) -> Result<Option<BookingWithFlight>, BackendError> {
        let sql = format!("{JOINED_SQL} WHERE b.id = $1");
        let row: Option<BookingFlightRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(BookingWithFlight::try_from).transpose()
    }

    async fn set_status(&self, id: Uuid, status: BookingStatus) -> Result<u64, BackendError> {
        let result = sqlx::query("UPDATE bookings SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
