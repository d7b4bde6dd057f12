//! services/client/src/adapters/auth_api.rs
//!
//! Adapter for the phone/code login endpoints. Implements `AuthService`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tarot_reading_core::domain::AuthTokens;
use tarot_reading_core::ports::{AuthService, PortResult};

use crate::adapters::http::ApiClient;

#[derive(Serialize)]
struct SendCodeRequest<'a> {
    phone: &'a str,
}

#[derive(Deserialize)]
struct SendCodeResponse {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    phone: &'a str,
    code: &'a str,
}

/// An adapter that implements `AuthService` over HTTP.
#[derive(Clone)]
pub struct HttpAuthAdapter {
    client: ApiClient,
}

impl HttpAuthAdapter {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthService for HttpAuthAdapter {
    async fn send_code(&self, phone: &str) -> PortResult<Option<String>> {
        let response: SendCodeResponse = self
            .client
            .post("/auth/send-code", &SendCodeRequest { phone })
            .await?;
        Ok(response.code)
    }

    async fn login_with_code(&self, phone: &str, code: &str) -> PortResult<AuthTokens> {
        self.client
            .post("/auth/login/code", &LoginRequest { phone, code })
            .await
    }
}
