//! Signed token issuance and verification.
//!
//! Three token kinds exist (access, refresh, reset). Each kind has its own
//! HMAC secret and lifetime, and carries its kind in the `type` claim.
//! Verification checks signature, issuer, audience, expiry and kind, and
//! reports every failure as the same [`AuthError::InvalidToken`].

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::AuthError;
use crate::db::{User, UserRole};

/// Source of "now" for issuance and expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: parking_lot::Mutex::new(Utc::now()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Reset,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Reset => "reset",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Everything the token service needs from configuration
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub reset_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_ttl: Duration,
}

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KindKeys {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

pub struct TokenService {
    access: KindKeys,
    refresh: KindKeys,
    reset: KindKeys,
    issuer: String,
    audience: String,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(settings: TokenSettings, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&settings.issuer]);
        validation.set_audience(&[&settings.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        // Expiry is checked against the injected clock in `verify`
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            access: KindKeys::new(&settings.access_secret, settings.access_ttl),
            refresh: KindKeys::new(&settings.refresh_secret, settings.refresh_ttl),
            reset: KindKeys::new(&settings.reset_secret, settings.reset_ttl),
            issuer: settings.issuer,
            audience: settings.audience,
            validation,
            clock,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
            TokenKind::Reset => &self.reset,
        }
    }

    /// Lifetime of a freshly issued token of this kind, in seconds
    pub fn expires_in(&self, kind: TokenKind) -> i64 {
        self.keys(kind).ttl.num_seconds()
    }

    /// Sign a token of `kind` for `user`
    pub fn issue(&self, kind: TokenKind, user: &User) -> Result<String, AuthError> {
        let keys = self.keys(kind);
        let now = self.clock.now();

        let claims = TokenPayload {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            kind,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + keys.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).map_err(AuthError::Signing)
    }

    /// Verify a token in the context of `kind`
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenPayload, AuthError> {
        let data = decode::<TokenPayload>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|e| {
                debug!(expected = %kind, reason = ?e.kind(), "Token rejected");
                AuthError::InvalidToken
            })?;
        let claims = data.claims;

        if claims.kind != kind {
            debug!(expected = %kind, actual = %claims.kind, "Token kind mismatch");
            return Err(AuthError::InvalidToken);
        }

        if claims.exp <= self.clock.now().timestamp() {
            debug!(expected = %kind, exp = claims.exp, "Token expired");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TokenSettings {
        TokenSettings {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            reset_secret: "reset-secret".to_string(),
            issuer: "atelier".to_string(),
            audience: "atelier-web".to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            reset_ttl: Duration::hours(1),
        }
    }

    fn user() -> User {
        User {
            id: "0b6d7c1e-5a55-4c43-9a55-3f1c4e1d2a10".to_string(),
            email: "a@example.com".to_string(),
            password_hash: String::new(),
            role: UserRole::User,
            first_name: None,
            last_name: None,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = TokenService::new(settings(), Arc::new(SystemClock));
        let token = service.issue(TokenKind::Access, &user()).unwrap();

        assert_eq!(token.split('.').count(), 3);

        let payload = service.verify(TokenKind::Access, &token).unwrap();
        assert_eq!(payload.user_id, user().id);
        assert_eq!(payload.kind, TokenKind::Access);
        assert_eq!(payload.email, "a@example.com");
        assert_eq!(payload.role, UserRole::User);
        assert_eq!(payload.exp - payload.iat, 15 * 60);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let service = TokenService::new(settings(), Arc::new(SystemClock));
        let token = service.issue(TokenKind::Refresh, &user()).unwrap();

        assert!(matches!(
            service.verify(TokenKind::Access, &token),
            Err(AuthError::InvalidToken)
        ));
        assert!(service.verify(TokenKind::Refresh, &token).is_ok());
    }

    #[test]
    fn test_kind_checked_even_with_shared_secret() {
        let mut shared = settings();
        shared.refresh_secret = shared.access_secret.clone();
        shared.reset_secret = shared.access_secret.clone();
        let service = TokenService::new(shared, Arc::new(SystemClock));

        let refresh = service.issue(TokenKind::Refresh, &user()).unwrap();
        let reset = service.issue(TokenKind::Reset, &user()).unwrap();

        assert!(matches!(
            service.verify(TokenKind::Access, &refresh),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            service.verify(TokenKind::Refresh, &reset),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let clock = Arc::new(ManualClock::new());
        let service = TokenService::new(settings(), clock.clone());
        let token = service.issue(TokenKind::Access, &user()).unwrap();

        clock.advance(Duration::minutes(14));
        assert!(service.verify(TokenKind::Access, &token).is_ok());

        clock.advance(Duration::minutes(1));
        assert!(matches!(
            service.verify(TokenKind::Access, &token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_issuer_and_audience_must_match() {
        let issuing = TokenService::new(settings(), Arc::new(SystemClock));
        let token = issuing.issue(TokenKind::Access, &user()).unwrap();

        let mut other_audience = settings();
        other_audience.audience = "someone-else".to_string();
        let verifying = TokenService::new(other_audience, Arc::new(SystemClock));
        assert!(verifying.verify(TokenKind::Access, &token).is_err());

        let mut other_issuer = settings();
        other_issuer.issuer = "someone-else".to_string();
        let verifying = TokenService::new(other_issuer, Arc::new(SystemClock));
        assert!(verifying.verify(TokenKind::Access, &token).is_err());
    }

    #[test]
    fn test_tampered_and_garbage_tokens_rejected() {
        let service = TokenService::new(settings(), Arc::new(SystemClock));
        let token = service.issue(TokenKind::Access, &user()).unwrap();

        let mut admin = user();
        admin.role = UserRole::Admin;
        let admin_token = service.issue(TokenKind::Access, &admin).unwrap();

        // Admin payload with the non-admin signature
        let parts: Vec<&str> = token.split('.').collect();
        let admin_parts: Vec<&str> = admin_token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], admin_parts[1], parts[2]);

        assert!(service.verify(TokenKind::Access, &tampered).is_err());
        assert!(service.verify(TokenKind::Access, "not.a.token").is_err());
        assert!(service.verify(TokenKind::Access, "").is_err());
    }

    #[test]
    fn test_expires_in_per_kind() {
        let service = TokenService::new(settings(), Arc::new(SystemClock));
        assert_eq!(service.expires_in(TokenKind::Access), 900);
        assert_eq!(service.expires_in(TokenKind::Refresh), 7 * 24 * 3600);
        assert_eq!(service.expires_in(TokenKind::Reset), 3600);
    }
}
