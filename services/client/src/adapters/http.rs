//! services/client/src/adapters/http.rs
//!
//! The shared HTTP client every remote adapter goes through. It owns the
//! pre-send hook (bearer token from the user store) and the post-receive hook
//! (401 policy), and unwraps the backend's `{success, data, message}` envelope.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tarot_reading_core::ports::{PortError, PortResult};
use tarot_reading_core::UserStore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::UnauthorizedPolicy;

//=========================================================================================
// Envelope Types
//=========================================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: Option<bool>,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Only the message-bearing parts of an error body.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error
        .map(|e| match e.code {
            Some(code) => format!("{} ({})", e.message, code),
            None => e.message,
        })
        .or(parsed.message)
        .or(parsed.detail)
}

//=========================================================================================
// The Main Client Struct
//=========================================================================================

/// HTTP access to the tarot backend.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    user_store: Arc<Mutex<UserStore>>,
    on_unauthorized: UnauthorizedPolicy,
}

impl ApiClient {
    /// Creates a new `ApiClient`.
    pub fn new(
        base_url: impl Into<String>,
        user_store: Arc<Mutex<UserStore>>,
        on_unauthorized: UnauthorizedPolicy,
    ) -> PortResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_store,
            on_unauthorized,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> PortResult<T> {
        let request = self.http.request(Method::GET, self.url(path));
        self.send(Method::GET, path, request).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> PortResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.request(Method::POST, self.url(path)).json(body);
        self.send(Method::POST, path, request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Pre-send hook. Reads the token at send time so a login or logout that
    /// happened a moment ago is always reflected.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self.user_store.lock().await.token().map(str::to_owned);
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Post-receive hook for 401 responses.
    async fn handle_unauthorized(&self, path: &str) {
        match self.on_unauthorized {
            UnauthorizedPolicy::Ignore => {
                warn!(path, "Service answered 401 Unauthorized.");
            }
            UnauthorizedPolicy::Logout => {
                warn!(path, "Service answered 401 Unauthorized. Clearing the user session.");
                self.user_store.lock().await.logout();
            }
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> PortResult<T> {
        let request_id = Uuid::new_v4();
        let request = self
            .authorize(request)
            .await
            .header("X-Request-Id", request_id.to_string());

        info!(%request_id, %method, path, "Sending request.");
        let response = request
            .send()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;
        debug!(%request_id, status = status.as_u16(), "Response received.");

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(path).await;
            return Err(PortError::Unauthorized);
        }
        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            return Err(PortError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| PortError::MalformedResponse(format!("{}: {}", path, e)))?;
        if envelope.success == Some(false) {
            let message = envelope
                .error
                .map(|e| e.message)
                .or(envelope.message)
                .unwrap_or_else(|| "request failed".to_string());
            return Err(PortError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        envelope
            .data
            .ok_or_else(|| PortError::MalformedResponse(format!("{}: missing data", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_structured_detail() {
        let body = r#"{"success":false,"error":{"code":"QUOTA_EXCEEDED","message":"No readings left"}}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("No readings left (QUOTA_EXCEEDED)")
        );
        assert_eq!(
            error_message(r#"{"message":"too vague"}"#).as_deref(),
            Some("too vague")
        );
        assert_eq!(
            error_message(r#"{"detail":"Not Found"}"#).as_deref(),
            Some("Not Found")
        );
        assert_eq!(error_message("<html>"), None);
    }
}
