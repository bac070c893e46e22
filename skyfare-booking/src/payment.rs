use std::sync::Arc;

use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use skyfare_core::payment::{Payment, PaymentStatus};
use skyfare_core::repository::PaymentRepository;
use skyfare_core::{DomainError, DomainResult};

/// Payment queries plus the simulated process/refund operations. A real
/// deployment would replace both mutations with a payment-gateway call
/// carrying its own idempotency-key discipline.
#[derive(Clone)]
pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
}

impl PaymentService {
    pub fn new(payments: Arc<dyn PaymentRepository>) -> Self {
        Self { payments }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> DomainResult<Vec<Payment>> {
        self.payments
            .list_for_user(user_id)
            .await
            .map_err(DomainError::backend)
    }

    pub async fn get_by_booking(&self, booking_id: Uuid) -> DomainResult<Payment> {
        self.payments
            .get_by_booking(booking_id)
            .await
            .map_err(DomainError::backend)?
            .ok_or_else(|| DomainError::NotFound("Payment not found".to_string()))
    }

    /// Marks the payment completed and stamps a synthetic transaction id.
    /// No guard against double-processing an already-completed payment.
    pub async fn process(&self, id: Uuid) -> DomainResult<Payment> {
        let transaction_id = format!("txn_{}", random_reference(13));
        self.payments
            .complete(id, &transaction_id)
            .await
            .map_err(DomainError::backend)?
            .ok_or_else(|| DomainError::NotFound("Payment not found".to_string()))
    }

    /// Flips the payment to refunded without checking its current status;
    /// refunding a pending payment goes through.
    pub async fn refund(&self, id: Uuid) -> DomainResult<Payment> {
        self.payments
            .update_status(id, PaymentStatus::Refunded)
            .await
            .map_err(DomainError::backend)?
            .ok_or_else(|| DomainError::NotFound("Payment not found".to_string()))
    }
}

fn random_reference(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{flight_fixture, InMemoryBookings, InMemoryFlights, InMemoryPayments};

    struct Setup {
        bookings: Arc<InMemoryBookings>,
        payments: Arc<InMemoryPayments>,
        service: PaymentService,
    }

    fn setup() -> Setup {
        let flights = InMemoryFlights::with(vec![flight_fixture(100.0, 50)]);
        let bookings = InMemoryBookings::new(flights);
        let payments = InMemoryPayments::new(bookings.clone());
        let service = PaymentService::new(payments.clone());
        Setup {
            bookings,
            payments,
            service,
        }
    }

    #[tokio::test]
    async fn process_marks_completed_and_stamps_transaction_id() {
        let s = setup();
        let payment = s.payments.insert_direct(Uuid::new_v4(), 250.0);

        let processed = s.service.process(payment.id).await.unwrap();
        assert_eq!(processed.status, PaymentStatus::Completed);
        let transaction_id = processed.transaction_id.expect("transaction id stamped");
        assert!(transaction_id.starts_with("txn_"));
        assert_eq!(transaction_id.len(), "txn_".len() + 13);
    }

    #[tokio::test]
    async fn refund_flips_even_a_pending_payment() {
        let s = setup();
        let payment = s.payments.insert_direct(Uuid::new_v4(), 250.0);
        assert_eq!(payment.status, PaymentStatus::Pending);

        let refunded = s.service.refund(payment.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn process_unknown_payment_is_not_found() {
        let s = setup();
        let err = s.service.process(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_by_booking_surfaces_not_found() {
        let s = setup();
        let err = s.service.get_by_booking(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_for_user_joins_through_bookings() {
        let s = setup();
        let user_id = Uuid::new_v4();
        let flight_id = s.bookings.any_flight_id();
        let booking_id = s.bookings.insert_direct(user_id, flight_id, 0);
        s.payments.insert_direct(booking_id, 99.0);

        let other_booking = s.bookings.insert_direct(Uuid::new_v4(), flight_id, 0);
        s.payments.insert_direct(other_booking, 11.0);

        let mine = s.service.list_for_user(user_id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].amount, 99.0);
    }
}
