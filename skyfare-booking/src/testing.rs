//! In-memory fakes for the repository and auth-backend traits, shared by
//! the service test modules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use skyfare_core::booking::{Booking, BookingStatus, BookingWithFlight, NewBooking};
use skyfare_core::flight::{Flight, FlightSearchParams, FlightStatus};
use skyfare_core::identity::{AuthIdentity, AuthUser, Session};
use skyfare_core::payment::{Payment, PaymentStatus};
use skyfare_core::repository::{
    AuthBackend, BackendError, BookingRepository, FlightRepository, PaymentRepository,
    UserRepository,
};
use skyfare_core::user::User;

pub fn flight_fixture(price: f64, available_seats: i32) -> Flight {
    let now = Utc::now();
    Flight {
        id: Uuid::new_v4(),
        flight_number: "SF101".to_string(),
        airline: "Skyfare".to_string(),
        origin: "Amsterdam (AMS)".to_string(),
        destination: "Lisbon (LIS)".to_string(),
        departure_time: now + Duration::days(7),
        arrival_time: now + Duration::days(7) + Duration::hours(3),
        price,
        total_seats: 180,
        available_seats,
        status: FlightStatus::Scheduled,
        created_at: now,
        updated_at: now,
    }
}

pub struct InMemoryFlights {
    flights: Mutex<HashMap<Uuid, Flight>>,
}

impl InMemoryFlights {
    pub fn with(flights: Vec<Flight>) -> Arc<Self> {
        Arc::new(Self {
            flights: Mutex::new(flights.into_iter().map(|f| (f.id, f)).collect()),
        })
    }

    pub fn seats(&self, id: Uuid) -> i32 {
        self.flights.lock().unwrap()[&id].available_seats
    }

    fn snapshot(&self) -> HashMap<Uuid, Flight> {
        self.flights.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlightRepository for InMemoryFlights {
    async fn search(&self, params: &FlightSearchParams) -> Result<Vec<Flight>, BackendError> {
        Ok(self
            .flights
            .lock()
            .unwrap()
            .values()
            .filter(|f| params.matches(f))
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Flight>, BackendError> {
        Ok(self.flights.lock().unwrap().get(&id).cloned())
    }

    async fn reserve_seats(&self, id: Uuid, seats: i32) -> Result<Option<Flight>, BackendError> {
        let mut flights = self.flights.lock().unwrap();
        match flights.get_mut(&id) {
            Some(flight) if flight.available_seats >= seats => {
                flight.available_seats -= seats;
                flight.updated_at = Utc::now();
                Ok(Some(flight.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release_seats(&self, id: Uuid, seats: i32) -> Result<Option<Flight>, BackendError> {
        let mut flights = self.flights.lock().unwrap();
        match flights.get_mut(&id) {
            Some(flight) => {
                flight.available_seats += seats;
                flight.updated_at = Utc::now();
                Ok(Some(flight.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: FlightStatus,
    ) -> Result<Option<Flight>, BackendError> {
        let mut flights = self.flights.lock().unwrap();
        match flights.get_mut(&id) {
            Some(flight) => {
                flight.status = status;
                flight.updated_at = Utc::now();
                Ok(Some(flight.clone()))
            }
            None => Ok(None),
        }
    }
}

pub struct InMemoryBookings {
    bookings: Mutex<HashMap<Uuid, Booking>>,
    flights: Arc<InMemoryFlights>,
    pub fail_create: AtomicBool,
    pub fail_set_status: AtomicBool,
}

impl InMemoryBookings {
    pub fn new(flights: Arc<InMemoryFlights>) -> Arc<Self> {
        Arc::new(Self {
            bookings: Mutex::new(HashMap::new()),
            flights,
            fail_create: AtomicBool::new(false),
            fail_set_status: AtomicBool::new(false),
        })
    }

    pub fn get(&self, id: Uuid) -> Option<Booking> {
        self.bookings.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.bookings.lock().unwrap().len()
    }

    pub fn single(&self) -> Option<Booking> {
        let bookings = self.bookings.lock().unwrap();
        assert!(bookings.len() <= 1, "expected at most one booking");
        bookings.values().next().cloned()
    }

    pub fn any_flight_id(&self) -> Uuid {
        *self.flights.snapshot().keys().next().expect("a flight")
    }

    /// Inserts a booking row directly, backdated by `minutes_ago` so tests
    /// can pin ordering.
    pub fn insert_direct(&self, user_id: Uuid, flight_id: Uuid, minutes_ago: i64) -> Uuid {
        let created_at = Utc::now() - Duration::minutes(minutes_ago);
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id,
            flight_id,
            booking_reference: format!("BK{}", created_at.timestamp_millis()),
            number_of_seats: 1,
            total_amount: 100.0,
            status: BookingStatus::Pending,
            created_at,
            updated_at: created_at,
        };
        let id = booking.id;
        self.bookings.lock().unwrap().insert(id, booking);
        id
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookings {
    async fn create(&self, new_booking: &NewBooking) -> Result<Booking, BackendError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err("booking insert failed".into());
        }
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
        self.bookings
            .lock()
            .unwrap()
            .insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<BookingWithFlight>, BackendError> {
        let flights = self.flights.snapshot();
        let mut rows: Vec<BookingWithFlight> = self
            .bookings
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.user_id == user_id)
            .filter_map(|b| {
                flights.get(&b.flight_id).map(|f| BookingWithFlight {
                    booking: b.clone(),
                    flight: f.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.booking.created_at.cmp(&a.booking.created_at));
        Ok(rows)
    }

    async fn get_with_flight(&self, id: Uuid) -> Result<Option<BookingWithFlight>, BackendError> {
        let flights = self.flights.snapshot();
        Ok(self.bookings.lock().unwrap().get(&id).and_then(|b| {
            flights.get(&b.flight_id).map(|f| BookingWithFlight {
                booking: b.clone(),
                flight: f.clone(),
            })
        }))
    }

    async fn set_status(&self, id: Uuid, status: BookingStatus) -> Result<u64, BackendError> {
        if self.fail_set_status.load(Ordering::SeqCst) {
            return Err("status update failed".into());
        }
        let mut bookings = self.bookings.lock().unwrap();
        match bookings.get_mut(&id) {
            Some(booking) => {
                booking.status = status;
                booking.updated_at = Utc::now();
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

pub struct InMemoryPayments {
    payments: Mutex<HashMap<Uuid, Payment>>,
    bookings: Arc<InMemoryBookings>,
    pub fail_create: AtomicBool,
}

impl InMemoryPayments {
    pub fn new(bookings: Arc<InMemoryBookings>) -> Arc<Self> {
        Arc::new(Self {
            payments: Mutex::new(HashMap::new()),
            bookings,
            fail_create: AtomicBool::new(false),
        })
    }

    pub fn count(&self) -> usize {
        self.payments.lock().unwrap().len()
    }

    pub fn by_booking(&self, booking_id: Uuid) -> Option<Payment> {
        self.payments
            .lock()
            .unwrap()
            .values()
            .find(|p| p.booking_id == booking_id)
            .cloned()
    }

    pub fn insert_direct(&self, booking_id: Uuid, amount: f64) -> Payment {
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id,
            amount,
            payment_method: "credit_card".to_string(),
            transaction_id: None,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id, payment.clone());
        payment
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPayments {
    async fn create(
        &self,
        booking_id: Uuid,
        amount: f64,
        payment_method: &str,
    ) -> Result<Payment, BackendError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err("payment insert failed".into());
        }
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
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Payment>, BackendError> {
        let owned: Vec<Uuid> = {
            let bookings = self.bookings.bookings.lock().unwrap();
            bookings
                .values()
                .filter(|b| b.user_id == user_id)
                .map(|b| b.id)
                .collect()
        };
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|p| owned.contains(&p.booking_id))
            .cloned()
            .collect())
    }

    async fn get_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>, BackendError> {
        Ok(self.by_booking(booking_id))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
    ) -> Result<Option<Payment>, BackendError> {
        let mut payments = self.payments.lock().unwrap();
        match payments.get_mut(&id) {
            Some(payment) => {
                payment.status = status;
                payment.updated_at = Utc::now();
                Ok(Some(payment.clone()))
            }
            None => Ok(None),
        }
    }

    async fn complete(
        &self,
        id: Uuid,
        transaction_id: &str,
    ) -> Result<Option<Payment>, BackendError> {
        let mut payments = self.payments.lock().unwrap();
        match payments.get_mut(&id) {
            Some(payment) => {
                payment.status = PaymentStatus::Completed;
                payment.transaction_id = Some(transaction_id.to_string());
                payment.updated_at = Utc::now();
                Ok(Some(payment.clone()))
            }
            None => Ok(None),
        }
    }
}

pub struct InMemoryUsers {
    users: Mutex<HashMap<Uuid, User>>,
    pub fail_insert: AtomicBool,
}

impl InMemoryUsers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            users: Mutex::new(HashMap::new()),
            fail_insert: AtomicBool::new(false),
        })
    }

    pub fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, BackendError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, BackendError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), BackendError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err("profile insert failed".into());
        }
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(())
    }
}

pub struct FakeAuthBackend {
    identities: Mutex<Vec<(Uuid, String, String)>>,
}

impl FakeAuthBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            identities: Mutex::new(Vec::new()),
        })
    }

    pub fn has_identity(&self, email: &str) -> bool {
        self.identities
            .lock()
            .unwrap()
            .iter()
            .any(|(_, e, _)| e == email)
    }

    pub fn identity_count(&self) -> usize {
        self.identities.lock().unwrap().len()
    }
}

#[async_trait]
impl AuthBackend for FakeAuthBackend {
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthIdentity, BackendError> {
        let id = Uuid::new_v4();
        self.identities
            .lock()
            .unwrap()
            .push((id, email.to_string(), password.to_string()));
        Ok(AuthIdentity {
            id,
            email: email.to_string(),
            created_at: Utc::now(),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Option<Session>, BackendError> {
        let identities = self.identities.lock().unwrap();
        let matched = identities
            .iter()
            .find(|(_, e, p)| e == email && p == password);
        Ok(matched.map(|(id, email, _)| Session {
            access_token: format!("token-{id}"),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            user: AuthUser {
                id: *id,
                email: email.clone(),
                role: "user".to_string(),
            },
        }))
    }

    async fn get_user(&self, token: &str) -> Result<Option<AuthUser>, BackendError> {
        let Some(id_str) = token.strip_prefix("token-") else {
            return Ok(None);
        };
        let Ok(id) = Uuid::parse_str(id_str) else {
            return Ok(None);
        };
        let identities = self.identities.lock().unwrap();
        Ok(identities
            .iter()
            .find(|(identity_id, _, _)| *identity_id == id)
            .map(|(id, email, _)| AuthUser {
                id: *id,
                email: email.clone(),
                role: "user".to_string(),
            }))
    }
}
