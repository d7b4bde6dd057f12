//! services/client/src/adapters/tarot_api.rs
//!
//! This module contains the adapter for the remote tarot endpoints.
//! It implements the `TarotService` port from the `core` crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tarot_reading_core::domain::{Card, InterpretationSet, Orientation, QuestionVerdict};
use tarot_reading_core::ports::{PortResult, TarotService};

use crate::adapters::http::ApiClient;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct ValidateRequest<'a> {
    question: &'a str,
    language: &'a str,
}

#[derive(Serialize)]
struct EmptyRequest {}

#[derive(Deserialize)]
struct DrawResponse {
    cards: Vec<Card>,
}

/// The card fields the interpreter needs; the reveal flag stays local.
#[derive(Serialize)]
struct CardRef<'a> {
    id: &'a str,
    name: &'a str,
    position: Orientation,
}

#[derive(Serialize)]
struct InterpretRequest<'a> {
    question: &'a str,
    cards: Vec<CardRef<'a>>,
    language: &'a str,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TarotService` over HTTP.
#[derive(Clone)]
pub struct HttpTarotAdapter {
    client: ApiClient,
}

impl HttpTarotAdapter {
    /// Creates a new `HttpTarotAdapter`.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TarotService for HttpTarotAdapter {
    async fn validate_question(
        &self,
        question: &str,
        language: &str,
    ) -> PortResult<QuestionVerdict> {
        self.client
            .post("/tarot/validate", &ValidateRequest { question, language })
            .await
    }

    async fn draw_cards(&self) -> PortResult<Vec<Card>> {
        let response: DrawResponse = self.client.post("/tarot/draw", &EmptyRequest {}).await?;
        Ok(response.cards)
    }

    async fn interpret(
        &self,
        question: &str,
        cards: &[Card],
        language: &str,
    ) -> PortResult<InterpretationSet> {
        let cards = cards
            .iter()
            .map(|c| CardRef {
                id: &c.id,
                name: &c.name,
                position: c.position,
            })
            .collect();
        self.client
            .post(
                "/tarot/interpret",
                &InterpretRequest {
                    question,
                    cards,
                    language,
                },
            )
            .await
    }
}
