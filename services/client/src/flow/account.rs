//! services/client/src/flow/account.rs
//!
//! Sign-in by phone and verification code, sign-out, and quota lookups.

use std::sync::Arc;

use tarot_reading_core::domain::{Quota, UserProfile};
use tarot_reading_core::ports::{AuthService, QuotaService};
use tarot_reading_core::UserStore;
use tokio::sync::Mutex;
use tracing::info;

use crate::flow::error::FlowError;

pub struct AccountFlow {
    auth: Arc<dyn AuthService>,
    quota: Arc<dyn QuotaService>,
    user: Arc<Mutex<UserStore>>,
}

impl AccountFlow {
    pub fn new(
        auth: Arc<dyn AuthService>,
        quota: Arc<dyn QuotaService>,
        user: Arc<Mutex<UserStore>>,
    ) -> Self {
        Self { auth, quota, user }
    }

    /// Requests a verification code. Returns the code when the service runs
    /// in test mode and echoes it back.
    pub async fn send_code(&self, phone: &str) -> Result<Option<String>, FlowError> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(FlowError::MissingInput("phone number"));
        }
        let code = self
            .auth
            .send_code(phone)
            .await
            .map_err(FlowError::remote("send the verification code"))?;
        info!(test_mode = code.is_some(), "Verification code sent.");
        Ok(code)
    }

    pub async fn login_with_code(&self, phone: &str, code: &str) -> Result<UserProfile, FlowError> {
        let phone = phone.trim();
        let code = code.trim();
        if phone.is_empty() {
            return Err(FlowError::MissingInput("phone number"));
        }
        if code.is_empty() {
            return Err(FlowError::MissingInput("verification code"));
        }

        let tokens = self
            .auth
            .login_with_code(phone, code)
            .await
            .map_err(FlowError::remote("log in"))?;
        let profile = tokens.user.clone();
        self.user
            .lock()
            .await
            .login(tokens.user, tokens.access_token, tokens.refresh_token)?;
        info!(user_id = %profile.id, "Logged in.");
        Ok(profile)
    }

    pub async fn logout(&self) {
        self.user.lock().await.logout();
        info!("Logged out.");
    }

    pub async fn current_user(&self) -> Option<UserProfile> {
        self.user.lock().await.identity().user().cloned()
    }

    pub async fn fetch_quota(&self) -> Result<Quota, FlowError> {
        self.quota
            .fetch_quota()
            .await
            .map_err(FlowError::remote("check your remaining readings"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tarot_reading_core::domain::AuthTokens;
    use tarot_reading_core::ports::{PortError, PortResult};
    use tarot_reading_core::{MemoryStorage, StateStorage, TOKEN_KEY};

    struct FakeAuth {
        tokens: PortResult<AuthTokens>,
    }

    #[async_trait]
    impl AuthService for FakeAuth {
        async fn send_code(&self, _phone: &str) -> PortResult<Option<String>> {
            Ok(Some("123456".into()))
        }

        async fn login_with_code(&self, _phone: &str, _code: &str) -> PortResult<AuthTokens> {
            self.tokens.clone()
        }
    }

    struct FakeQuota;

    #[async_trait]
    impl QuotaService for FakeQuota {
        async fn fetch_quota(&self) -> PortResult<Quota> {
            Ok(Quota {
                kind: Some("anonymous".into()),
                remaining: 3,
                total: 3,
                reset_at: None,
            })
        }
    }

    fn account(tokens: PortResult<AuthTokens>) -> (Arc<MemoryStorage>, AccountFlow) {
        let storage = Arc::new(MemoryStorage::new());
        let user = Arc::new(Mutex::new(UserStore::load(storage.clone())));
        let flow = AccountFlow::new(Arc::new(FakeAuth { tokens }), Arc::new(FakeQuota), user);
        (storage, flow)
    }

    fn tokens(access: &str) -> AuthTokens {
        AuthTokens {
            access_token: access.into(),
            refresh_token: "rt".into(),
            user: UserProfile::new("1"),
        }
    }

    #[tokio::test]
    async fn login_stores_identity_and_logout_clears_it() {
        let (storage, flow) = account(Ok(tokens("at")));

        assert_eq!(flow.send_code("+100").await.unwrap().as_deref(), Some("123456"));
        let profile = flow.login_with_code("+100", "123456").await.unwrap();
        assert_eq!(profile.id, "1");
        assert_eq!(flow.current_user().await, Some(UserProfile::new("1")));
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("at"));

        flow.logout().await;
        assert_eq!(flow.current_user().await, None);
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn login_with_empty_token_is_rejected() {
        let (storage, flow) = account(Ok(tokens("")));
        let err = flow.login_with_code("+100", "123456").await.unwrap_err();
        assert!(matches!(err, FlowError::Login(_)));
        assert_eq!(flow.current_user().await, None);
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn failed_login_keeps_the_previous_state() {
        let (_, flow) = account(Err(PortError::Rejected {
            status: 400,
            message: "Invalid code".into(),
        }));
        assert!(matches!(
            flow.send_code("  ").await,
            Err(FlowError::MissingInput("phone number"))
        ));
        let err = flow.login_with_code("+100", "000000").await.unwrap_err();
        assert!(err.to_string().contains("Invalid code"));
        assert_eq!(flow.current_user().await, None);
    }

    #[tokio::test]
    async fn quota_is_passed_through() {
        let (_, flow) = account(Ok(tokens("at")));
        let quota = flow.fetch_quota().await.unwrap();
        assert_eq!(quota.remaining, 3);
        assert_eq!(quota.percentage(), 100.0);
    }
}
