use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use skyfare_core::payment::{Payment, PaymentStatus};
use skyfare_core::repository::{BackendError, PaymentRepository};

pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PAYMENT_COLUMNS: &str =
    "id, booking_id, amount, payment_method, transaction_id, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    amount: f64,
    payment_method: String,
    transaction_id: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = BackendError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            booking_id: row.booking_id,
            amount: row.amount,
            payment_method: row.payment_method,
            transaction_id: row.transaction_id,
            status: row.status.parse::<PaymentStatus>()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn create(
        &self,
        booking_id: Uuid,
        amount: f64,
        payment_method: &str,
    ) -> Result<Payment, BackendError> {
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id,
            amount,
            payment_method: payment_method.to_string(),
            transaction_id: None,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, amount, payment_method, transaction_id,
                                  status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.amount)
        .bind(&payment.payment_method)
        .bind(payment.transaction_id.as_deref())
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>, BackendError> {
        let sql = r#"
            SELECT p.id, p.booking_id, p.amount, p.payment_method, p.transaction_id,
                   p.status, p.created_at, p.updated_at
            FROM payments p
            JOIN bookings b ON p.booking_id = b.id
            WHERE b.user_id = $1
            "#;
        let rows: Vec<PaymentRow> = sqlx::query_as(sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn get_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>, BackendError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = $1");
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Payment::try_from).transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, BackendError> {
        let sql = format!(
            r#"
            UPDATE payments
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Payment::try_from).transpose()
    }

    async fn complete(
        &self,
        id: Uuid,
        transaction_id: &str,
    ) -> Result<Option<Payment>, BackendError> {
        let sql = format!(
            r#"
            UPDATE payments
            SET status = 'completed', transaction_id = $2, updated_at = now()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Payment::try_from).transpose()
    }
}
