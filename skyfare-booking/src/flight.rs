use std::sync::Arc;

use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use uuid::Uuid;

use skyfare_core::flight::{Flight, FlightSearchParams, FlightStatus};
use skyfare_core::repository::FlightRepository;
use skyfare_core::{DomainError, DomainResult};
use skyfare_store::FlightFeed;

/// Flight catalog queries plus the per-flight change subscription.
#[derive(Clone)]
pub struct FlightService {
    flights: Arc<dyn FlightRepository>,
    feed: FlightFeed,
}

impl FlightService {
    pub fn new(flights: Arc<dyn FlightRepository>, feed: FlightFeed) -> Self {
        Self { flights, feed }
    }

    pub async fn search(&self, params: &FlightSearchParams) -> DomainResult<Vec<Flight>> {
        self.flights
            .search(params)
            .await
            .map_err(DomainError::backend)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Flight> {
        self.flights
            .get(id)
            .await
            .map_err(DomainError::backend)?
            .ok_or_else(|| DomainError::NotFound("Flight not found".to_string()))
    }

    pub async fn update_status(&self, id: Uuid, status: FlightStatus) -> DomainResult<Flight> {
        let flight = self
            .flights
            .update_status(id, status)
            .await
            .map_err(DomainError::backend)?
            .ok_or_else(|| DomainError::NotFound("Flight not found".to_string()))?;

        self.feed.publish(flight.clone());
        Ok(flight)
    }

    /// Stream of row states for one flight. Dropping the stream detaches
    /// the underlying channel receiver; a lagged receiver skips the
    /// updates it missed rather than erroring out.
    pub fn watch(&self, flight_id: Uuid) -> impl Stream<Item = Flight> + Send + 'static {
        let rx = self.feed.subscribe();
        BroadcastStream::new(rx).filter_map(move |event| match event {
            Ok(change) if change.flight.id == flight_id => Some(change.flight),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{flight_fixture, InMemoryFlights};
    use std::time::Duration;
    use tokio::time::timeout;

    fn service(flights: Arc<InMemoryFlights>) -> FlightService {
        FlightService::new(flights, FlightFeed::new(16))
    }

    #[tokio::test]
    async fn get_unknown_flight_is_not_found() {
        let svc = service(InMemoryFlights::with(vec![]));
        let err = svc.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn search_returns_only_matching_scheduled_flights() {
        let mut cheap = flight_fixture(120.0, 10);
        cheap.origin = "Paris (CDG)".to_string();
        let mut pricey = flight_fixture(800.0, 10);
        pricey.origin = "Paris (CDG)".to_string();
        let mut grounded = flight_fixture(100.0, 10);
        grounded.origin = "Paris (CDG)".to_string();
        grounded.status = FlightStatus::Cancelled;

        let svc = service(InMemoryFlights::with(vec![cheap.clone(), pricey, grounded]));

        let params = FlightSearchParams {
            origin: Some("paris".to_string()),
            max_price: Some(300.0),
            ..Default::default()
        };
        let results = svc.search(&params).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, cheap.id);
    }

    #[tokio::test]
    async fn update_status_publishes_on_the_change_feed() {
        let flight = flight_fixture(200.0, 50);
        let flights = InMemoryFlights::with(vec![flight.clone()]);
        let svc = service(flights);

        let mut stream = Box::pin(svc.watch(flight.id));

        let updated = svc
            .update_status(flight.id, FlightStatus::Delayed)
            .await
            .unwrap();
        assert_eq!(updated.status, FlightStatus::Delayed);

        let seen = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("change event should arrive")
            .expect("stream should stay open");
        assert_eq!(seen.id, flight.id);
        assert_eq!(seen.status, FlightStatus::Delayed);
    }

    #[tokio::test]
    async fn watch_ignores_updates_for_other_flights() {
        let watched = flight_fixture(200.0, 50);
        let other = flight_fixture(300.0, 20);
        let flights = InMemoryFlights::with(vec![watched.clone(), other.clone()]);
        let svc = service(flights);

        let mut stream = Box::pin(svc.watch(watched.id));

        svc.update_status(other.id, FlightStatus::Cancelled)
            .await
            .unwrap();
        svc.update_status(watched.id, FlightStatus::Delayed)
            .await
            .unwrap();

        // The first event on the stream is already the watched flight's;
        // the other flight's update was filtered out.
        let seen = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("change event should arrive")
            .expect("stream should stay open");
        assert_eq!(seen.id, watched.id);
    }

    #[tokio::test]
    async fn update_status_of_unknown_flight_is_not_found() {
        let svc = service(InMemoryFlights::with(vec![]));
        let err = svc
            .update_status(Uuid::new_v4(), FlightStatus::Delayed)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
