use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity resolved from a verified bearer token, attached to the request
/// for downstream handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

/// Claims carried by the backend-issued access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// Auth identity provisioned in the backend's identity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Session payload returned on a successful sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: AuthUser,
}

/// Optional profile fields supplied at sign-up.
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
}
