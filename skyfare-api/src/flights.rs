use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use skyfare_core::flight::{Flight, FlightSearchParams, FlightStatus};
use skyfare_core::identity::Claims;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct UpdateFlightStatusRequest {
    status: FlightStatus,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/flights", get(search_flights))
        .route("/flights/{id}", get(get_flight))
        .route(
            "/flights/{id}/status",
            get(stream_flight_status).put(update_flight_status),
        )
}

async fn search_flights(
    State(state): State<AppState>,
    Query(params): Query<FlightSearchParams>,
) -> Result<Json<Vec<Flight>>, AppError> {
    let flights = state.flights.search(&params).await?;
    Ok(Json(flights))
}

async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Flight>, AppError> {
    let flight = state.flights.get(id).await?;
    Ok(Json(flight))
}

/// Server-push stream of row states for one flight. The subscription is
/// released when the client disconnects and the stream is dropped.
async fn stream_flight_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = state
        .flights
        .watch(id)
        .map(|flight| Event::default().event("flight_update").json_data(&flight));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Admin-only status flip; every accepted update is fanned out to the
/// status stream subscribers.
async fn update_flight_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<UpdateFlightStatusRequest>,
) -> Result<Json<Flight>, AppError> {
    // Decode the token manually; this route shares its path with the
    // public SSE stream, so the shared middleware stack does not apply.
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Authentication("Malformed authorization header".to_string()))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Authentication("Invalid token".to_string()))?;

    if token_data.claims.role != "admin" {
        return Err(AppError::Authorization(
            "Admin role required".to_string(),
        ));
    }

    let flight = state.flights.update_status(id, req.status).await?;
    Ok(Json(flight))
}
