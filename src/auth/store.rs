//! Credential store abstraction.
//!
//! The auth service never talks to a database directly; it is handed a store
//! at construction time. `SqliteCredentialStore` (in `db`) backs the server,
//! including `--ephemeral` runs over an in-memory database.
//! `MemoryCredentialStore` backs the auth service unit tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::StoreError;
use crate::db::{NewUser, User};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up by email. Callers pass a normalized (lowercased) address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Persist a new user. Fails with `DuplicateEmail` when the email is taken,
    /// including when a concurrent registration won the race.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<(), StoreError>;

    /// Update name fields; `None` leaves a field unchanged.
    async fn update_profile(
        &self,
        id: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, StoreError>;
}

/// In-process store keyed by user id
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Drop a user, as an admin deletion would
    pub fn remove(&self, id: &str) -> Option<User> {
        self.users.write().remove(id)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write();

        // Check and insert under one lock, like a unique index would
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: now.clone(),
            updated_at: now,
        };
        users.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write();
        let user = users.get_mut(id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(())
    }

    async fn update_profile(
        &self,
        id: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write();
        let user = users.get_mut(id).ok_or(StoreError::NotFound)?;
        if let Some(first_name) = first_name {
            user.first_name = Some(first_name.to_string());
        }
        if let Some(last_name) = last_name {
            user.last_name = Some(last_name.to_string());
        }
        user.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(user.clone())
    }
}
