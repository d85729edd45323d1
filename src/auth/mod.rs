//! Authentication core: password hashing, signed tokens, and the account
//! flows that combine them with a credential store.

mod error;
pub mod notifier;
pub mod password;
pub mod service;
pub mod store;
pub mod token;

pub use error::{AuthError, StoreError};
pub use notifier::{LoggingResetNotifier, ResetNotifier};
pub use password::PasswordHasher;
pub use service::{normalize_email, AuthResult, AuthService, PasswordResetTicket};
pub use store::{CredentialStore, MemoryCredentialStore};
pub use token::{Clock, SystemClock, TokenKind, TokenPayload, TokenService, TokenSettings};
