//! Credential verification for the login endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::UserConfig;
use crate::error::GateError;

/// Public profile of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub name: Option<String>,
}

/// Source of truth for username/password pairs.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The user's profile when `password` is correct for `username`, `None` otherwise.
    async fn verify(&self, username: &str, password: &str)
        -> Result<Option<UserProfile>, GateError>;
}

/// Hash checked for unknown usernames so they cost as much as known ones.
const TIMING_GUARD_HASH: &str = "$2b$12$Dggcp6tjmW/rOt0BGV9VeO008PDFjmyT62orzzivzVIVzSh/v2SxW";

struct StoredUser {
    password_hash: String,
    profile: UserProfile,
}

/// Users declared in the `[[login.users]]` configuration, with bcrypt hashes.
#[derive(Clone)]
pub struct ConfigCredentialStore {
    users: Arc<HashMap<String, StoredUser>>,
}

impl ConfigCredentialStore {
    pub fn new(users: &[UserConfig]) -> Self {
        let users = users
            .iter()
            .map(|u| {
                let stored = StoredUser {
                    password_hash: u.password_hash.clone(),
                    profile: UserProfile {
                        username: u.username.clone(),
                        email: u.email.clone(),
                        name: u.name.clone(),
                    },
                };
                (u.username.clone(), stored)
            })
            .collect();
        Self {
            users: Arc::new(users),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for ConfigCredentialStore {
    async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, GateError> {
        let user = self.users.get(username);
        let hash = user
            .map(|u| u.password_hash.clone())
            .unwrap_or_else(|| TIMING_GUARD_HASH.to_string());
        let password = password.to_string();

        // CPU-bound, runs on the blocking pool.
        let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| GateError::Internal(format!("credential check panicked: {e}")))?;

        match (user, matched) {
            (Some(u), Ok(true)) => Ok(Some(u.profile.clone())),
            (Some(_), Err(e)) => {
                tracing::error!(username = %username, error = %e, "Stored password hash is invalid");
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}
