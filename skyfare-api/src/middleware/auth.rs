use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use skyfare_core::identity::{AuthUser, Claims};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Strategy (a): local verification of the signed claims
// ============================================================================

pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract token from Authorization header
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Authentication("Malformed authorization header".to_string()))?;

    // 2. Decode and validate the JWT (signature and expiry)
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Authentication("Invalid token".to_string()))?;

    let id = Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| AppError::Authentication("Invalid token".to_string()))?;

    // 3. Inject the resolved identity into request extensions
    req.extensions_mut().insert(AuthUser {
        id,
        email: token_data.claims.email,
        role: token_data.claims.role,
    });

    Ok(next.run(req).await)
}

// ============================================================================
// Strategy (b): round-trip the raw token to the backend's auth layer
// ============================================================================

pub async fn backend_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer
        .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

    let user = state
        .auth_backend
        .get_user(bearer.token())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "token verification against the backend failed");
            AppError::Authentication("Invalid token".to_string())
        })?
        .ok_or_else(|| AppError::Authentication("Invalid token".to_string()))?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
