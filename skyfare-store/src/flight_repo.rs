use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use skyfare_core::flight::{Flight, FlightSearchParams, FlightStatus};
use skyfare_core::repository::{BackendError, FlightRepository};

pub struct PgFlightRepository {
    pool: PgPool,
}

impl PgFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FLIGHT_COLUMNS: &str = "id, flight_number, airline, origin, destination, departure_time, \
     arrival_time, price, total_seats, available_seats, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    flight_number: String,
    airline: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    price: f64,
    total_seats: i32,
    available_seats: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FlightRow> for Flight {
    type Error = BackendError;

    fn try_from(row: FlightRow) -> Result<Self, Self::Error> {
        Ok(Flight {
            id: row.id,
            flight_number: row.flight_number,
            airline: row.airline,
            origin: row.origin,
            destination: row.destination,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            price: row.price,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            status: row.status.parse::<FlightStatus>()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl FlightRepository for PgFlightRepository {
    async fn search(&self, params: &FlightSearchParams) -> Result<Vec<Flight>, BackendError> {
        // Mirrors FlightSearchParams::matches: NULL filters impose no
        // constraint. Result order is storage order, not guaranteed.
        let sql = format!(
            r#"
            SELECT {FLIGHT_COLUMNS}
            FROM flights
            WHERE status = 'scheduled'
              AND ($1::text IS NULL OR origin ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR destination ILIKE '%' || $2 || '%')
              AND ($3::timestamptz IS NULL OR (departure_time >= $3 AND departure_time < $4))
              AND ($5::double precision IS NULL OR price >= $5)
              AND ($6::double precision IS NULL OR price <= $6)
              AND ($7::integer IS NULL OR available_seats >= $7)
            "#
        );

        let (window_start, window_end) = match params.departure_window() {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };

        let rows: Vec<FlightRow> = sqlx::query_as(&sql)
            .bind(params.origin.as_deref())
            .bind(params.destination.as_deref())
            .bind(window_start)
            .bind(window_end)
            .bind(params.min_price)
            .bind(params.max_price)
            .bind(params.available_seats)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Flight::try_from).collect()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Flight>, BackendError> {
        let sql = format!("SELECT {FLIGHT_COLUMNS} FROM flights WHERE id = $1");
        let row: Option<FlightRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Flight::try_from).transpose()
    }

    async fn reserve_seats(&self, id: Uuid, seats: i32) -> Result<Option<Flight>, BackendError> {
        // Availability check and decrement in one conditional update; two
        // concurrent reservations can never both pass against the same
        // seat count.
        let sql = format!(
            r#"
            UPDATE flights
            SET available_seats = available_seats - $2, updated_at = now()
            WHERE id = $1 AND available_seats >= $2
            RETURNING {FLIGHT_COLUMNS}
            "#
        );
        let row: Option<FlightRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(seats)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Flight::try_from).transpose()
    }

    async fn release_seats(&self, id: Uuid, seats: i32) -> Result<Option<Flight>, BackendError> {
        let sql = format!(
            r#"
            UPDATE flights
            SET available_seats = available_seats + $2, updated_at = now()
            WHERE id = $1
            RETURNING {FLIGHT_COLUMNS}
            "#
        );
        let row: Option<FlightRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(seats)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Flight::try_from).transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: FlightStatus,
    ) -> Result<Option<Flight>, BackendError> {
        let sql = format!(
            r#"
            UPDATE flights
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {FLIGHT_COLUMNS}
            "#
        );
        let row: Option<FlightRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Flight::try_from).transpose()
    }
}
