//! crates/tarot_reading_core/src/domain.rs
//!
//! Defines the core data structures for a tarot reading.
//! These structs carry serde derives because they double as the persisted
//! shape of the client-local state partitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a question, in characters.
pub const MAX_QUESTION_CHARS: usize = 200;

//=========================================================================================
// Cards and Interpretations
//=========================================================================================

/// Which way up a card was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Upright,
    Reversed,
}

/// One physical tarot card within a reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_zh: Option<String>,
    pub position: Orientation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Whether the card face has been shown. Only ever goes false -> true
    /// within one reading.
    #[serde(rename = "isRevealed", default)]
    pub is_revealed: bool,
}

impl Card {
    pub fn new(id: impl Into<String>, name: impl Into<String>, position: Orientation) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            name_en: None,
            name_zh: None,
            position,
            image_url: None,
            is_revealed: false,
        }
    }
}

/// Commentary on one card, or on the spread as a whole when neither
/// association is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Orientation>,
    #[serde(alias = "interpretation")]
    pub text: String,
}

//=========================================================================================
// Reading Session
//=========================================================================================

/// The phase a reading is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Input,
    Shuffling,
    Drawing,
    Revealing,
    Result,
}

impl Stage {
    /// The single legal forward successor, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Input => Some(Stage::Shuffling),
            Stage::Shuffling => Some(Stage::Drawing),
            Stage::Drawing => Some(Stage::Revealing),
            Stage::Revealing => Some(Stage::Result),
            Stage::Result => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Shuffling => "shuffling",
            Stage::Drawing => "drawing",
            Stage::Revealing => "revealing",
            Stage::Result => "result",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state held by the reading store.
///
/// Fields are only writable inside this crate; everything else goes through
/// [`crate::reading_store::ReadingStore`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSession {
    #[serde(default)]
    pub(crate) stage: Stage,
    #[serde(default)]
    pub(crate) question: String,
    #[serde(default)]
    pub(crate) cards: Vec<Card>,
    #[serde(default)]
    pub(crate) interpretations: Vec<Interpretation>,
    #[serde(default)]
    pub(crate) reading_id: Option<String>,
    #[serde(default)]
    pub(crate) overall_interpretation: Option<String>,
    #[serde(default)]
    pub(crate) is_interpreting: bool,
}

impl ReadingSession {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn interpretations(&self) -> &[Interpretation] {
        &self.interpretations
    }

    pub fn reading_id(&self) -> Option<&str> {
        self.reading_id.as_deref()
    }

    pub fn overall_interpretation(&self) -> Option<&str> {
        self.overall_interpretation.as_deref()
    }

    pub fn is_interpreting(&self) -> bool {
        self.is_interpreting
    }

    /// True when there is at least one card and every card is face up.
    pub fn all_revealed(&self) -> bool {
        !self.cards.is_empty() && self.cards.iter().all(|c| c.is_revealed)
    }

    pub fn has_interpretation(&self) -> bool {
        !self.interpretations.is_empty() || self.overall_interpretation.is_some()
    }
}

//=========================================================================================
// User Identity
//=========================================================================================

/// Profile of a signed-in user, as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: None,
            email: None,
            phone: None,
            avatar: None,
        }
    }
}

/// The state held by the user store. Authentication is derived from the
/// token and is never stored independently.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserIdentity {
    pub(crate) user: Option<UserProfile>,
    pub(crate) token: Option<String>,
    pub(crate) refresh_token: Option<String>,
}

impl UserIdentity {
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

//=========================================================================================
// Remote Payloads
//=========================================================================================

/// Outcome of asking the service whether a question can be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionVerdict {
    pub suitable: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A complete interpretation response; always applied wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpretationSet {
    #[serde(default)]
    pub interpretations: Vec<Interpretation>,
    #[serde(default)]
    pub reading_id: Option<String>,
    #[serde(default)]
    pub overall_interpretation: Option<String>,
}

/// Tokens and profile returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

/// Free readings left for the current user or device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub remaining: u32,
    pub total: u32,
    #[serde(default)]
    pub reset_at: Option<DateTime<Utc>>,
}

impl Quota {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.remaining) / f64::from(self.total) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_linear() {
        let mut stage = Stage::Input;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(
            seen,
            vec![
                Stage::Input,
                Stage::Shuffling,
                Stage::Drawing,
                Stage::Revealing,
                Stage::Result
            ]
        );
    }

    #[test]
    fn card_reveal_flag_defaults_to_hidden() {
        let card: Card =
            serde_json::from_str(r#"{"id":"fool","name":"The Fool","position":"reversed"}"#)
                .unwrap();
        assert!(!card.is_revealed);
        assert_eq!(card.position, Orientation::Reversed);
    }

    #[test]
    fn interpretation_accepts_backend_field_name() {
        let interp: Interpretation = serde_json::from_str(
            r#"{"card_index":0,"card_name":"The Fool","position":"upright","interpretation":"New beginnings"}"#,
        )
        .unwrap();
        assert_eq!(interp.text, "New beginnings");
        assert_eq!(interp.card_index, Some(0));
    }

    #[test]
    fn quota_percentage_handles_zero_total() {
        let quota = Quota {
            kind: None,
            remaining: 0,
            total: 0,
            reset_at: None,
        };
        assert_eq!(quota.percentage(), 0.0);

        let quota = Quota {
            kind: Some("anonymous".into()),
            remaining: 1,
            total: 4,
            reset_at: None,
        };
        assert_eq!(quota.percentage(), 25.0);
    }
}
