use axum::{
    extract::{Path, State},
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use skyfare_core::identity::AuthUser;
use skyfare_core::payment::Payment;

use crate::error::AppError;
use crate::middleware::backend_auth_middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/payments", get(list_payments))
        .route("/payments/booking/{booking_id}", get(get_payment_by_booking))
        .route("/payments/{id}/process", post(process_payment))
        .route("/payments/{id}/refund", post(refund_payment))
        .route_layer(from_fn_with_state(state, backend_auth_middleware))
}

async fn list_payments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state.payments.list_for_user(user.id).await?;
    Ok(Json(payments))
}

async fn get_payment_by_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let payment = state.payments.get_by_booking(booking_id).await?;
    Ok(Json(payment))
}

async fn process_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let payment = state.payments.process(id).await?;
    Ok(Json(payment))
}

async fn refund_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let payment = state.payments.refund(id).await?;
    Ok(Json(payment))
}
