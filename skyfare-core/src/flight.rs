use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ParseStatusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightStatus {
    Scheduled,
    Delayed,
    Cancelled,
    Completed,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::Scheduled => "scheduled",
            FlightStatus::Delayed => "delayed",
            FlightStatus::Cancelled => "cancelled",
            FlightStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FlightStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(FlightStatus::Scheduled),
            "delayed" => Ok(FlightStatus::Delayed),
            "cancelled" => Ok(FlightStatus::Cancelled),
            "completed" => Ok(FlightStatus::Completed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: f64,
    pub total_seats: i32,
    pub available_seats: i32,
    pub status: FlightStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional search filters, AND-composed on top of the base
/// `status = scheduled` predicate. Omitted fields impose no constraint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightSearchParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub available_seats: Option<i32>,
}

impl FlightSearchParams {
    /// Half-open day window `[date 00:00, date+1 00:00)` in UTC derived from
    /// the date-only filter.
    pub fn departure_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.departure_date.map(|date| {
            let start = date.and_time(NaiveTime::MIN).and_utc();
            (start, start + Duration::days(1))
        })
    }

    /// Reference semantics for the search predicate. The SQL issued by the
    /// store mirrors this exactly.
    pub fn matches(&self, flight: &Flight) -> bool {
        if flight.status != FlightStatus::Scheduled {
            return false;
        }
        if let Some(origin) = &self.origin {
            if !contains_ignore_case(&flight.origin, origin) {
                return false;
            }
        }
        if let Some(destination) = &self.destination {
            if !contains_ignore_case(&flight.destination, destination) {
                return false;
            }
        }
        if let Some((start, end)) = self.departure_window() {
            if flight.departure_time < start || flight.departure_time >= end {
                return false;
            }
        }
        if let Some(min_price) = self.min_price {
            if flight.price < min_price {
                return false;
            }
        }
        if let Some(max_price) = self.max_price {
            if flight.price > max_price {
                return false;
            }
        }
        if let Some(seats) = self.available_seats {
            if flight.available_seats < seats {
                return false;
            }
        }
        true
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flight() -> Flight {
        let departure = "2026-03-14T09:30:00Z".parse().unwrap();
        let arrival = "2026-03-14T12:45:00Z".parse().unwrap();
        let now = Utc::now();
        Flight {
            id: Uuid::new_v4(),
            flight_number: "SF204".to_string(),
            airline: "Skyfare".to_string(),
            origin: "New York (JFK)".to_string(),
            destination: "London (LHR)".to_string(),
            departure_time: departure,
            arrival_time: arrival,
            price: 450.0,
            total_seats: 180,
            available_seats: 42,
            status: FlightStatus::Scheduled,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_params_match_any_scheduled_flight() {
        assert!(FlightSearchParams::default().matches(&flight()));
    }

    #[test]
    fn non_scheduled_flights_never_match() {
        let mut delayed = flight();
        delayed.status = FlightStatus::Delayed;
        assert!(!FlightSearchParams::default().matches(&delayed));
    }

    #[test]
    fn origin_match_is_case_insensitive_substring() {
        let params = FlightSearchParams {
            origin: Some("jfk".to_string()),
            ..Default::default()
        };
        assert!(params.matches(&flight()));

        let params = FlightSearchParams {
            origin: Some("LAX".to_string()),
            ..Default::default()
        };
        assert!(!params.matches(&flight()));
    }

    #[test]
    fn departure_date_window_is_half_open() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let params = FlightSearchParams {
            departure_date: Some(date),
            ..Default::default()
        };
        assert!(params.matches(&flight()));

        // Exactly midnight of the following day falls outside the window.
        let mut late = flight();
        late.departure_time = "2026-03-15T00:00:00Z".parse().unwrap();
        assert!(!params.matches(&late));

        let mut start_of_day = flight();
        start_of_day.departure_time = "2026-03-14T00:00:00Z".parse().unwrap();
        assert!(params.matches(&start_of_day));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let params = FlightSearchParams {
            min_price: Some(450.0),
            max_price: Some(450.0),
            ..Default::default()
        };
        assert!(params.matches(&flight()));

        let params = FlightSearchParams {
            max_price: Some(449.99),
            ..Default::default()
        };
        assert!(!params.matches(&flight()));
    }

    #[test]
    fn seat_floor_is_inclusive() {
        let params = FlightSearchParams {
            available_seats: Some(42),
            ..Default::default()
        };
        assert!(params.matches(&flight()));

        let params = FlightSearchParams {
            available_seats: Some(43),
            ..Default::default()
        };
        assert!(!params.matches(&flight()));
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!("delayed".parse::<FlightStatus>().unwrap(), FlightStatus::Delayed);
        assert_eq!(FlightStatus::Completed.to_string(), "completed");
        assert!("boarding".parse::<FlightStatus>().is_err());
    }
}
