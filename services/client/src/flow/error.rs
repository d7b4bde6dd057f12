//! services/client/src/flow/error.rs
//!
//! Failures a flow hands back to the user. The `Display` text of each variant
//! is the message shown on screen.

use tarot_reading_core::domain::Stage;
use tarot_reading_core::ports::PortError;
use tarot_reading_core::user_store::LoginError;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Please enter your {0}.")]
    MissingInput(&'static str),

    #[error("Questions are limited to {max} characters.")]
    QuestionTooLong { max: usize },

    /// The service read the question and declined it.
    #[error("{0}")]
    Unsuitable(String),

    #[error("Failed to {action}. {source}")]
    Remote {
        action: &'static str,
        #[source]
        source: PortError,
    },

    #[error("That is not possible while the reading is at the {0} stage.")]
    WrongStage(Stage),

    /// A newer reading started while this request was in flight.
    #[error("This reading was replaced by a new one.")]
    Superseded,

    #[error("Login failed. {0}")]
    Login(#[from] LoginError),
}

impl FlowError {
    pub(crate) fn remote(action: &'static str) -> impl FnOnce(PortError) -> FlowError {
        move |source| {
            warn!(action, "Remote call failed: {}", source);
            FlowError::Remote { action, source }
        }
    }
}
