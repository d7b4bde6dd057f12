//! crates/tarot_reading_core/src/user_store.rs
//!
//! The user session store: who is signed in and with which credentials.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{UserIdentity, UserProfile};
use crate::persist::{PersistentState, PersistentStore, TOKEN_KEY, USER_PARTITION};
use crate::ports::{PortResult, StateStorage};

/// Rejected login input. Nothing is stored when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("Login requires a non-empty {0}")]
    Missing(&'static str),
}

/// On-disk shape of the identity partition.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityRecord {
    user: Option<UserProfile>,
    token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    is_authenticated: bool,
}

impl PersistentState for UserIdentity {
    const PARTITION: &'static str = USER_PARTITION;

    fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(&IdentityRecord {
            user: self.user.clone(),
            token: self.token.clone(),
            refresh_token: self.refresh_token.clone(),
            is_authenticated: self.is_authenticated(),
        })
    }

    // The stored `isAuthenticated` is ignored; it is always derived from the token.
    fn decode(raw: &str) -> serde_json::Result<Self> {
        let record: IdentityRecord = serde_json::from_str(raw)?;
        Ok(Self {
            user: record.user,
            token: record.token,
            refresh_token: record.refresh_token,
        })
    }

    fn sync_side_slots(&self, storage: &dyn StateStorage) -> PortResult<()> {
        match &self.token {
            Some(token) => storage.set(TOKEN_KEY, token),
            None => storage.remove(TOKEN_KEY),
        }
    }
}

/// Holds the signed-in identity and mirrors the token to its own slot.
pub struct UserStore {
    inner: PersistentStore<UserIdentity>,
}

impl UserStore {
    pub fn load(storage: Arc<dyn StateStorage>) -> Self {
        Self {
            inner: PersistentStore::load(storage),
        }
    }

    pub fn identity(&self) -> &UserIdentity {
        self.inner.state()
    }

    pub fn token(&self) -> Option<&str> {
        self.identity().token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_authenticated()
    }

    pub fn login(
        &mut self,
        user: UserProfile,
        token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<(), LoginError> {
        let token = token.into();
        let refresh_token = refresh_token.into();
        if user.id.trim().is_empty() {
            return Err(LoginError::Missing("user id"));
        }
        if token.trim().is_empty() {
            return Err(LoginError::Missing("token"));
        }
        if refresh_token.trim().is_empty() {
            return Err(LoginError::Missing("refresh token"));
        }

        self.inner.update(|s| {
            s.user = Some(user);
            s.token = Some(token);
            s.refresh_token = Some(refresh_token);
        });
        Ok(())
    }

    pub fn logout(&mut self) {
        self.inner.update(|s| *s = UserIdentity::default());
    }
}
