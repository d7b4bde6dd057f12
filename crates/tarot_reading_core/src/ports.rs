//! crates/tarot_reading_core/src/ports.rs
//!
//! Defines the service contracts (traits) the reading logic depends on.
//! These traits form the boundary of the hexagonal architecture, so the core
//! never knows whether it talks to the real backend, a file on disk, or a fake.

use async_trait::async_trait;

use crate::domain::{AuthTokens, Card, InterpretationSet, Quota, QuestionVerdict};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The request never produced a response (connection refused, DNS, reset).
    #[error("Could not reach the service: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("The service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Unauthorized")]
    Unauthorized,
    /// The service answered, but not in a shape we understand.
    #[error("Unexpected response from the service: {0}")]
    MalformedResponse(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait TarotService: Send + Sync {
    /// Asks whether `question` is suitable for a reading.
    async fn validate_question(&self, question: &str, language: &str)
        -> PortResult<QuestionVerdict>;

    /// Draws a fresh spread of cards.
    async fn draw_cards(&self) -> PortResult<Vec<Card>>;

    /// Requests interpretations for a complete spread.
    async fn interpret(
        &self,
        question: &str,
        cards: &[Card],
        language: &str,
    ) -> PortResult<InterpretationSet>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Requests a verification code. Test deployments echo the code back.
    async fn send_code(&self, phone: &str) -> PortResult<Option<String>>;

    /// Exchanges a phone number and code for tokens.
    async fn login_with_code(&self, phone: &str, code: &str) -> PortResult<AuthTokens>;
}

#[async_trait]
pub trait QuotaService: Send + Sync {
    async fn fetch_quota(&self) -> PortResult<Quota>;
}

/// Durable client-local key/value storage.
///
/// Synchronous on purpose: store operations run to completion, and the save
/// that follows each one must finish before the next operation starts.
pub trait StateStorage: Send + Sync {
    fn get(&self, key: &str) -> PortResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> PortResult<()>;
    fn remove(&self, key: &str) -> PortResult<()>;
}
