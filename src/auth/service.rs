//! Account flows: register, login, refresh, forgot/reset password.
//!
//! `AuthService` owns no state besides its collaborators. Each call performs
//! at most one read-then-write against the credential store; duplicate
//! registrations racing each other are settled by the store's unique email
//! constraint and surface here as [`AuthError::Conflict`].

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::password::PasswordHasher;
use super::store::CredentialStore;
use super::token::{TokenKind, TokenService};
use super::AuthError;
use crate::db::{NewUser, User, UserResponse, UserRole};

/// Successful authentication: the user plus a fresh token pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires
    pub expires_in: i64,
}

/// A freshly issued password reset token and who it was issued for
#[derive(Debug, Clone)]
pub struct PasswordResetTicket {
    pub user_id: String,
    pub email: String,
    pub token: String,
    pub expires_in: i64,
}

/// Canonical form used for storage and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
    hasher: PasswordHasher,
    default_role: UserRole,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: TokenService,
        hasher: PasswordHasher,
        default_role: UserRole,
    ) -> Self {
        Self {
            store,
            tokens,
            hasher,
            default_role,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn default_role(&self) -> UserRole {
        self.default_role
    }

    /// Create an account with the configured default role and log it in
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<AuthResult, AuthError> {
        let user = self
            .create_account(email, password, self.default_role, first_name, last_name)
            .await?;
        self.issue_pair(&user)
    }

    /// Create an account with an explicit role without issuing tokens
    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email);

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict);
        }

        let password_hash = self.hash_password(password).await?;

        // StoreError::DuplicateEmail converts to Conflict for the race loser
        let user = self
            .store
            .create(NewUser {
                email,
                password_hash,
                role,
                first_name,
                last_name,
            })
            .await?;

        info!(user_id = %user.id, role = %user.role, "Account created");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResult, AuthError> {
        let email = normalize_email(email);
        let user = self.store.find_by_email(&email).await?;

        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let password_ok = self.verify_password(password, stored_hash).await?;

        match user {
            Some(user) if password_ok => {
                debug!(user_id = %user.id, "Login succeeded");
                self.issue_pair(&user)
            }
            _ => {
                debug!("Login rejected: invalid credentials");
                Err(AuthError::Authentication)
            }
        }
    }

    /// Exchange a refresh token for a new token pair. The presented refresh
    /// token stays valid until it expires.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResult, AuthError> {
        let claims = self
            .tokens
            .verify(TokenKind::Refresh, refresh_token)
            .map_err(|_| AuthError::Authentication)?;

        let user = self
            .store
            .find_by_id(&claims.user_id)
            .await?
            .ok_or_else(|| {
                debug!(user_id = %claims.user_id, "Refresh rejected: user no longer exists");
                AuthError::Authentication
            })?;

        self.issue_pair(&user)
    }

    /// Issue a reset token. Returns `NotFound` for unknown emails; the HTTP
    /// layer must not let that difference reach the client.
    pub async fn forgot_password(&self, email: &str) -> Result<PasswordResetTicket, AuthError> {
        let email = normalize_email(email);
        let user = self
            .store
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::NotFound)?;

        let token = self.tokens.issue(TokenKind::Reset, &user)?;
        info!(user_id = %user.id, "Password reset token issued");

        Ok(PasswordResetTicket {
            user_id: user.id,
            email: user.email,
            token,
            expires_in: self.tokens.expires_in(TokenKind::Reset),
        })
    }

    /// Set a new password using a reset token. Does not log the user in.
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<(), AuthError> {
        let claims = self.tokens.verify(TokenKind::Reset, reset_token)?;

        let user = self
            .store
            .find_by_id(&claims.user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        let password_hash = self.hash_password(new_password).await?;
        self.store.update_password(&user.id, &password_hash).await?;

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// Resolve an access token to its user
    pub async fn authenticate(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self
            .tokens
            .verify(TokenKind::Access, access_token)
            .map_err(|_| AuthError::Authentication)?;

        self.store
            .find_by_id(&claims.user_id)
            .await?
            .ok_or(AuthError::Authentication)
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, AuthError> {
        Ok(self
            .store
            .update_profile(user_id, first_name, last_name)
            .await?)
    }

    fn issue_pair(&self, user: &User) -> Result<AuthResult, AuthError> {
        Ok(AuthResult {
            access_token: self.tokens.issue(TokenKind::Access, user)?,
            refresh_token: self.tokens.issue(TokenKind::Refresh, user)?,
            expires_in: self.tokens.expires_in(TokenKind::Access),
            user: UserResponse::from(user),
        })
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
    }

    /// Compare against the stored hash, or against a dummy hash when there is
    /// no user so both paths cost one verification.
    async fn verify_password(&self, password: &str, hash: Option<String>) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => hasher.compare(&password, &hash),
            None => hasher.compare_dummy(&password),
        })
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryCredentialStore;
    use crate::auth::token::{ManualClock, SystemClock, TokenSettings};
    use crate::auth::Clock;
    use chrono::Duration;

    fn settings() -> TokenSettings {
        TokenSettings {
            access_secret: "test-access".to_string(),
            refresh_secret: "test-refresh".to_string(),
            reset_secret: "test-reset".to_string(),
            issuer: "atelier".to_string(),
            audience: "atelier-web".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            reset_ttl: Duration::hours(1),
        }
    }

    fn service_with(store: Arc<MemoryCredentialStore>, clock: Arc<dyn Clock>) -> AuthService {
        AuthService::new(
            store,
            TokenService::new(settings(), clock),
            PasswordHasher::insecure_for_tests(),
            UserRole::User,
        )
    }

    fn service() -> (AuthService, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        (service_with(store.clone(), Arc::new(SystemClock)), store)
    }

    #[tokio::test]
    async fn test_register_returns_verifiable_tokens() {
        let (auth, _) = service();
        let result = auth
            .register("a@example.com", "Passw0rd!", Some("Ada".into()), None)
            .await
            .unwrap();

        assert_eq!(result.user.email, "a@example.com");
        assert_eq!(result.user.first_name.as_deref(), Some("Ada"));
        assert_eq!(result.expires_in, 900);

        let access = auth.tokens().verify(TokenKind::Access, &result.access_token).unwrap();
        assert_eq!(access.user_id, result.user.id);
        let refresh = auth.tokens().verify(TokenKind::Refresh, &result.refresh_token).unwrap();
        assert_eq!(refresh.user_id, result.user.id);
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let (auth, store) = service();
        auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();

        let err = auth
            .register("  A@Example.COM ", "Other1234!", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_register_uses_default_role() {
        let store = Arc::new(MemoryCredentialStore::new());
        let auth = AuthService::new(
            store,
            TokenService::new(settings(), Arc::new(SystemClock)),
            PasswordHasher::insecure_for_tests(),
            UserRole::Admin,
        );
        let result = auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();
        assert_eq!(result.user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_concurrent_registration_has_one_winner() {
        let (auth, store) = service();
        let auth = Arc::new(auth);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let auth = auth.clone();
                tokio::spawn(async move {
                    auth.register("race@example.com", "Passw0rd!", None, None).await
                })
            })
            .collect();

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(AuthError::Conflict) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (auth, _) = service();
        auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();

        let unknown = auth.login("nobody@example.com", "Passw0rd!").await.unwrap_err();
        let wrong = auth.login("a@example.com", "wrong-password").await.unwrap_err();

        assert!(matches!(unknown, AuthError::Authentication));
        assert!(matches!(wrong, AuthError::Authentication));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_login_normalizes_email() {
        let (auth, _) = service();
        auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();
        assert!(auth.login(" A@EXAMPLE.com", "Passw0rd!").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_login_refresh_scenario() {
        let (auth, _) = service();
        let registered = auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();
        let logged_in = auth.login("a@example.com", "Passw0rd!").await.unwrap();
        let refreshed = auth.refresh(&logged_in.refresh_token).await.unwrap();

        let payload = auth
            .tokens()
            .verify(TokenKind::Access, &refreshed.access_token)
            .unwrap();
        assert_eq!(payload.user_id, registered.user.id);
        assert_eq!(payload.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let (auth, _) = service();
        let result = auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();

        let err = auth.refresh(&result.access_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Authentication));
    }

    #[tokio::test]
    async fn test_refresh_after_user_removed() {
        let (auth, store) = service();
        let result = auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();
        store.remove(&result.user.id);

        let err = auth.refresh(&result.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Authentication));
    }

    #[tokio::test]
    async fn test_old_refresh_token_still_usable_after_rotation() {
        let (auth, _) = service();
        let first = auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();
        let _second = auth.refresh(&first.refresh_token).await.unwrap();

        assert!(auth.refresh(&first.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let (auth, _) = service();
        let err = auth.forgot_password("nobody@example.com").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let (auth, _) = service();
        auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();

        let ticket = auth.forgot_password("a@example.com").await.unwrap();
        assert_eq!(ticket.expires_in, 3600);
        assert_eq!(
            auth.tokens().verify(TokenKind::Reset, &ticket.token).unwrap().kind,
            TokenKind::Reset
        );

        auth.reset_password(&ticket.token, "N3wPassw0rd!").await.unwrap();

        assert!(matches!(
            auth.login("a@example.com", "Passw0rd!").await,
            Err(AuthError::Authentication)
        ));
        assert!(auth.login("a@example.com", "N3wPassw0rd!").await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_reset_token_leaves_password_unchanged() {
        let store = Arc::new(MemoryCredentialStore::new());
        let clock = Arc::new(ManualClock::new());
        let auth = service_with(store, clock.clone());
        auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();

        let ticket = auth.forgot_password("a@example.com").await.unwrap();
        clock.advance(Duration::hours(1) + Duration::seconds(1));

        let err = auth.reset_password(&ticket.token, "N3wPassw0rd!").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));

        assert!(auth.login("a@example.com", "Passw0rd!").await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_rejects_refresh_token() {
        let (auth, _) = service();
        let result = auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();

        let err = auth
            .reset_password(&result.refresh_token, "N3wPassw0rd!")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_reset_for_removed_user() {
        let (auth, store) = service();
        let result = auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();
        let ticket = auth.forgot_password("a@example.com").await.unwrap();
        store.remove(&result.user.id);

        let err = auth.reset_password(&ticket.token, "N3wPassw0rd!").await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_authenticate_access_token() {
        let (auth, _) = service();
        let result = auth.register("a@example.com", "Passw0rd!", None, None).await.unwrap();

        let user = auth.authenticate(&result.access_token).await.unwrap();
        assert_eq!(user.id, result.user.id);

        assert!(matches!(
            auth.authenticate(&result.refresh_token).await,
            Err(AuthError::Authentication)
        ));
    }
}
