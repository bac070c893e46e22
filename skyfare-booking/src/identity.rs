use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use skyfare_core::identity::{AuthIdentity, NewProfile, Session};
use skyfare_core::repository::{AuthBackend, UserRepository};
use skyfare_core::user::{User, UserRole};
use skyfare_core::{DomainError, DomainResult};

/// Account creation, sign-in and profile lookups, delegating credential
/// handling to the backend's auth layer.
#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    auth: Arc<dyn AuthBackend>,
}

impl IdentityService {
    pub fn new(users: Arc<dyn UserRepository>, auth: Arc<dyn AuthBackend>) -> Self {
        Self { users, auth }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &NewProfile,
    ) -> DomainResult<AuthIdentity> {
        if !email.contains('@') {
            return Err(DomainError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if password.chars().count() < 6 {
            return Err(DomainError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        let existing = self
            .users
            .find_by_email(email)
            .await
            .map_err(DomainError::backend)?;
        if existing.is_some() {
            return Err(DomainError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let identity = self
            .auth
            .create_identity(email, password)
            .await
            .map_err(DomainError::backend)?;

        let now = Utc::now();
        let user = User {
            id: identity.id,
            email: email.to_string(),
            full_name: profile.full_name.clone(),
            phone_number: profile.phone_number.clone(),
            // Role is forced to "user"; admins are provisioned out of band.
            role: UserRole::User,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.users.insert(&user).await {
            // Known gap: the identity provisioned above is left orphaned.
            // The backend exposes no admin delete here, so reconciliation
            // is manual.
            tracing::error!(
                identity_id = %identity.id,
                error = %err,
                "profile insert failed after identity creation; auth identity orphaned"
            );
            return Err(DomainError::backend(err));
        }

        Ok(identity)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> DomainResult<Session> {
        self.auth
            .sign_in(email, password)
            .await
            .map_err(DomainError::backend)?
            .ok_or_else(|| DomainError::Unauthorized("Invalid credentials".to_string()))
    }

    pub async fn profile(&self, id: Uuid) -> DomainResult<User> {
        self.users
            .get(id)
            .await
            .map_err(DomainError::backend)?
            .ok_or_else(|| DomainError::NotFound("User profile not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAuthBackend, InMemoryUsers};
    use std::sync::atomic::Ordering;

    struct Setup {
        users: Arc<InMemoryUsers>,
        auth: Arc<FakeAuthBackend>,
        service: IdentityService,
    }

    fn setup() -> Setup {
        let users = InMemoryUsers::new();
        let auth = FakeAuthBackend::new();
        let service = IdentityService::new(users.clone(), auth.clone());
        Setup {
            users,
            auth,
            service,
        }
    }

    fn profile() -> NewProfile {
        NewProfile {
            full_name: Some("Ada Lovelace".to_string()),
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn sign_up_creates_identity_and_profile_with_user_role() {
        let s = setup();
        let identity = s
            .service
            .sign_up("ada@example.com", "hunter42", &profile())
            .await
            .unwrap();

        assert!(s.auth.has_identity("ada@example.com"));
        let user = s.users.get_by_id(identity.id).expect("profile row");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.full_name.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn sign_up_rejects_duplicate_email() {
        let s = setup();
        s.service
            .sign_up("dup@example.com", "hunter42", &profile())
            .await
            .unwrap();

        let err = s
            .service
            .sign_up("dup@example.com", "other-password", &profile())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        // The second attempt provisioned nothing.
        assert_eq!(s.auth.identity_count(), 1);
        assert_eq!(s.users.count(), 1);
    }

    #[tokio::test]
    async fn sign_up_rejects_invalid_email_and_short_password() {
        let s = setup();

        let err = s
            .service
            .sign_up("not-an-email", "hunter42", &profile())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = s
            .service
            .sign_up("ada@example.com", "short", &profile())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        assert_eq!(s.auth.identity_count(), 0);
    }

    #[tokio::test]
    async fn failed_profile_insert_leaves_identity_orphaned() {
        let s = setup();
        s.users.fail_insert.store(true, Ordering::SeqCst);

        let err = s
            .service
            .sign_up("ada@example.com", "hunter42", &profile())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Backend(_)));

        // Known gap, pinned: the auth identity exists with no profile row.
        assert!(s.auth.has_identity("ada@example.com"));
        assert_eq!(s.users.count(), 0);
    }

    #[tokio::test]
    async fn sign_in_returns_session_for_valid_credentials() {
        let s = setup();
        s.service
            .sign_up("ada@example.com", "hunter42", &profile())
            .await
            .unwrap();

        let session = s
            .service
            .sign_in("ada@example.com", "hunter42")
            .await
            .unwrap();
        assert_eq!(session.token_type, "bearer");
        assert_eq!(session.user.email, "ada@example.com");
        assert!(!session.access_token.is_empty());
    }

    #[tokio::test]
    async fn sign_in_rejects_bad_credentials() {
        let s = setup();
        s.service
            .sign_up("ada@example.com", "hunter42", &profile())
            .await
            .unwrap();

        let err = s
            .service
            .sign_in("ada@example.com", "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        let err = s
            .service
            .sign_in("nobody@example.com", "hunter42")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn profile_of_unknown_user_is_not_found() {
        let s = setup();
        let err = s.service.profile(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
