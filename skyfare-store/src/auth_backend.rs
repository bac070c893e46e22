use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use skyfare_core::identity::{AuthIdentity, AuthUser, Claims, Session};
use skyfare_core::repository::{AuthBackend, BackendError};

use crate::app_config::AuthConfig;

/// Postgres-backed stand-in for the managed backend's auth layer: it owns
/// the identity store, checks credentials and issues/verifies the signed
/// access tokens.
pub struct PgAuthBackend {
    pool: PgPool,
    jwt_secret: String,
    jwt_expiration: u64,
}

impl PgAuthBackend {
    pub fn new(pool: PgPool, auth: &AuthConfig) -> Self {
        Self {
            pool,
            jwt_secret: auth.jwt_secret.clone(),
            jwt_expiration: auth.jwt_expiration_seconds,
        }
    }

    fn issue_token(&self, user: &AuthUser) -> Result<String, BackendError> {
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            exp: (Utc::now() + Duration::seconds(self.jwt_expiration as i64)).timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;
        Ok(token)
    }
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    email: String,
    password_hash: String,
}

#[async_trait]
impl AuthBackend for PgAuthBackend {
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthIdentity, BackendError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| format!("password hashing failed: {e}"))?
            .to_string();

        let id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query(
            "INSERT INTO auth_identities (id, email, password_hash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(email)
        .bind(&password_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(AuthIdentity {
            id,
            email: email.to_string(),
            created_at,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Option<Session>, BackendError> {
        let row: Option<IdentityRow> = sqlx::query_as(
            "SELECT id, email, password_hash FROM auth_identities WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let parsed = PasswordHash::new(&row.password_hash)
            .map_err(|e| format!("stored password hash is invalid: {e}"))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return Ok(None);
        }

        // The role lives on the profile row; identities without one default
        // to "user".
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(row.id)
            .fetch_optional(&self.pool)
            .await?;

        let user = AuthUser {
            id: row.id,
            email: row.email,
            role: role.unwrap_or_else(|| "user".to_string()),
        };
        let access_token = self.issue_token(&user)?;

        Ok(Some(Session {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.jwt_expiration,
            user,
        }))
    }

    async fn get_user(&self, token: &str) -> Result<Option<AuthUser>, BackendError> {
        let data = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => data,
            Err(_) => return Ok(None),
        };

        let id = match Uuid::parse_str(&data.claims.sub) {
            Ok(id) => id,
            Err(_) => return Ok(None),
        };

        // A token only counts as valid while its identity still exists.
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM auth_identities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        Ok(Some(AuthUser {
            id,
            email: data.claims.email,
            role: data.claims.role,
        }))
    }
}
