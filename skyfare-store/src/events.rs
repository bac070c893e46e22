use tokio::sync::broadcast;

use skyfare_core::events::FlightChanged;
use skyfare_core::flight::Flight;

/// In-process stand-in for the backend's realtime change feed. Services
/// publish the new row state after every flight mutation; each streaming
/// client holds one receiver for the lifetime of its connection, and
/// dropping the receiver detaches it from the channel.
#[derive(Clone)]
pub struct FlightFeed {
    tx: broadcast::Sender<FlightChanged>,
}

impl FlightFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, flight: Flight) {
        // Send only fails when nobody is subscribed, which is not an error.
        let _ = self.tx.send(FlightChanged { flight });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlightChanged> {
        self.tx.subscribe()
    }
}
