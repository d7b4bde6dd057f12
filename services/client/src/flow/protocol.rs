//! services/client/src/flow/protocol.rs
//!
//! Defines the events the reading flow publishes to whatever is rendering it.
//! Results of background work only reach the user this way.

use serde::Serialize;
use tarot_reading_core::domain::Stage;
use tokio::sync::mpsc::UnboundedSender;

/// Represents the notifications a flow can send to its front end.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// The reading moved to a new stage.
    StageChanged { stage: Stage },

    /// A spread was placed on the table, face down.
    CardsDrawn { count: usize },

    /// The card at `index` was turned face up.
    CardRevealed { index: usize },

    /// Interpretations arrived and were stored.
    InterpretationReady,

    /// Something went wrong that the user should hear about.
    Notice { message: String },
}

/// Optional sink for `FlowEvent`s. Sending never fails the flow.
#[derive(Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<FlowEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<FlowEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn emit(&self, event: FlowEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
