use serde::{Deserialize, Serialize};

use crate::flight::Flight;

/// Row-level change notification for a flight, carrying the new row state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightChanged {
    pub flight: Flight,
}
