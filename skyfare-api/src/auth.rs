use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use skyfare_core::identity::{AuthUser, NewProfile, Session};
use skyfare_core::user::User;

use crate::error::AppError;
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SignUpRequest {
    email: String,
    password: String,
    full_name: Option<String>,
    phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
struct SignUpResponse {
    id: Uuid,
    email: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SignInRequest {
    email: String,
    password: String,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/profile", get(get_profile))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware));

    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .merge(protected)
}

async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SignUpResponse>), AppError> {
    let profile = NewProfile {
        full_name: req.full_name,
        phone_number: req.phone_number,
    };
    let identity = state
        .identity
        .sign_up(&req.email, &req.password, &profile)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            id: identity.id,
            email: identity.email,
            created_at: identity.created_at,
        }),
    ))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<Session>, AppError> {
    let session = state.identity.sign_in(&req.email, &req.password).await?;
    Ok(Json(session))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    let profile = state.identity.profile(user.id).await?;
    Ok(Json(profile))
}
