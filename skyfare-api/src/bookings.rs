use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use skyfare_core::booking::{Booking, BookingWithFlight, CreateBooking};
use skyfare_core::identity::AuthUser;

use crate::error::AppError;
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/cancel", put(cancel_booking))
        .route("/bookings/{id}/confirm", put(confirm_booking))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.create(user.id, &req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<BookingWithFlight>>, AppError> {
    let bookings = state.bookings.list_for_user(user.id).await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingWithFlight>, AppError> {
    let booking = state.bookings.get(id).await?;
    Ok(Json(booking))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.bookings.cancel(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.bookings.confirm(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
