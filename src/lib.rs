pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;

pub use db::DbPool;

use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::auth::{
    AuthService, CredentialStore, LoggingResetNotifier, PasswordHasher, ResetNotifier,
    SystemClock, TokenService,
};
use config::Config;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub auth: Arc<AuthService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub reset_notifier: Arc<dyn ResetNotifier>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, auth: Arc<AuthService>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            config,
            db,
            auth,
            rate_limiter,
            reset_notifier: Arc::new(LoggingResetNotifier),
        }
    }

    /// Replace where password reset tickets are sent
    pub fn with_reset_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.reset_notifier = notifier;
        self
    }
}

/// Wire the auth service from configuration and an injected credential store
pub fn build_auth_service(config: &Config, store: Arc<dyn CredentialStore>) -> AuthService {
    AuthService::new(
        store,
        TokenService::new(config.auth.token_settings(), Arc::new(SystemClock)),
        PasswordHasher::new(),
        config.auth.default_role,
    )
}
