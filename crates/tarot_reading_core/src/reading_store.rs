//! crates/tarot_reading_core/src/reading_store.rs
//!
//! The reading session store. A dumb, persisted container: it never checks
//! whether a stage change is legal, that is the flow controller's job.

use std::sync::Arc;

use crate::domain::{Card, Interpretation, ReadingSession, Stage};
use crate::persist::{PersistentState, PersistentStore, READING_PARTITION};
use crate::ports::StateStorage;

impl PersistentState for ReadingSession {
    const PARTITION: &'static str = READING_PARTITION;

    fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Holds the in-progress reading and saves it after every operation.
///
/// The store also counts resets. The count is not persisted; callers tag
/// remote requests with it and drop any result whose tag no longer matches.
pub struct ReadingStore {
    inner: PersistentStore<ReadingSession>,
    epoch: u64,
}

impl ReadingStore {
    /// Rehydrates the reading from storage, or starts from defaults.
    pub fn load(storage: Arc<dyn StateStorage>) -> Self {
        Self {
            inner: PersistentStore::load(storage),
            epoch: 0,
        }
    }

    /// Number of resets since this store was loaded.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn session(&self) -> &ReadingSession {
        self.inner.state()
    }

    pub fn set_question(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.inner.update(|s| s.question = text);
    }

    pub fn set_stage(&mut self, stage: Stage) {
        self.inner.update(|s| s.stage = stage);
    }

    /// Replaces the spread. Every card starts face down whatever the input says.
    pub fn set_cards(&mut self, cards: Vec<Card>) {
        let cards = cards
            .into_iter()
            .map(|c| Card {
                is_revealed: false,
                ..c
            })
            .collect();
        self.inner.update(|s| s.cards = cards);
    }

    /// Turns the card at `index` face up. Returns `false` when the index is out
    /// of range, in which case nothing changes.
    pub fn reveal_card(&mut self, index: usize) -> bool {
        if index >= self.session().cards.len() {
            return false;
        }
        self.inner.update(|s| s.cards[index].is_revealed = true);
        true
    }

    pub fn set_interpretations(
        &mut self,
        interpretations: Vec<Interpretation>,
        reading_id: Option<String>,
        overall: Option<String>,
    ) {
        self.inner.update(|s| {
            s.interpretations = interpretations;
            s.reading_id = reading_id;
            s.overall_interpretation = overall;
            s.is_interpreting = false;
        });
    }

    pub fn set_is_interpreting(&mut self, flag: bool) {
        self.inner.update(|s| s.is_interpreting = flag);
    }

    pub fn reset(&mut self) {
        self.epoch += 1;
        self.inner.update(|s| *s = ReadingSession::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Orientation;
    use crate::persist::MemoryStorage;

    fn store() -> (Arc<MemoryStorage>, ReadingStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = ReadingStore::load(storage.clone());
        (storage, store)
    }

    fn spread() -> Vec<Card> {
        let mut fool = Card::new("fool", "The Fool", Orientation::Upright);
        fool.is_revealed = true;
        vec![
            fool,
            Card::new("magician", "The Magician", Orientation::Reversed),
            Card::new("tower", "The Tower", Orientation::Upright),
        ]
    }

    #[test]
    fn starts_with_defaults() {
        let (_, store) = store();
        let s = store.session();
        assert_eq!(s.stage(), Stage::Input);
        assert_eq!(s.question(), "");
        assert!(s.cards().is_empty());
        assert!(s.interpretations().is_empty());
        assert_eq!(s.reading_id(), None);
        assert_eq!(s.overall_interpretation(), None);
        assert!(!s.is_interpreting());
    }

    #[test]
    fn set_cards_hides_every_card() {
        let (_, mut store) = store();
        store.set_cards(spread());
        assert_eq!(store.session().cards().len(), 3);
        assert!(store.session().cards().iter().all(|c| !c.is_revealed));
    }

    #[test]
    fn reveal_card_is_idempotent() {
        let (_, mut store) = store();
        store.set_cards(spread());
        store.reveal_card(1);
        let once = store.session().clone();
        store.reveal_card(1);
        assert_eq!(store.session(), &once);
        assert!(once.cards()[1].is_revealed);
        assert!(!once.cards()[0].is_revealed);
    }

    #[test]
    fn reveal_out_of_range_changes_nothing() {
        let (storage, mut store) = store();
        store.set_cards(spread());
        let before = store.session().clone();
        let writes = storage.writes().len();

        assert!(!store.reveal_card(3));
        assert!(!store.reveal_card(usize::MAX));
        assert_eq!(store.session(), &before);
        assert_eq!(storage.writes().len(), writes);
    }

    #[test]
    fn set_interpretations_replaces_and_clears_flag() {
        let (_, mut store) = store();
        store.set_is_interpreting(true);
        store.set_interpretations(
            vec![Interpretation {
                card_index: None,
                card_id: Some("fool".into()),
                card_name: None,
                position: None,
                text: "New beginnings".into(),
            }],
            Some("reading-123".into()),
            Some("Overall good".into()),
        );
        let s = store.session();
        assert_eq!(s.interpretations().len(), 1);
        assert_eq!(s.reading_id(), Some("reading-123"));
        assert_eq!(s.overall_interpretation(), Some("Overall good"));
        assert!(!s.is_interpreting());

        store.set_interpretations(Vec::new(), None, None);
        assert!(store.session().interpretations().is_empty());
        assert!(!store.session().has_interpretation());
    }

    #[test]
    fn reset_from_any_state_restores_defaults() {
        let (_, mut store) = store();
        store.set_question("Will I find love?");
        store.set_stage(Stage::Revealing);
        store.set_cards(spread());
        store.reveal_card(0);
        store.set_is_interpreting(true);
        store.set_interpretations(Vec::new(), Some("r".into()), Some("o".into()));
        store.set_stage(Stage::Result);

        store.reset();
        assert_eq!(store.session(), &ReadingSession::default());
    }

    #[test]
    fn reset_advances_the_epoch() {
        let (storage, mut store) = store();
        assert_eq!(store.epoch(), 0);
        store.set_question("Career?");
        assert_eq!(store.epoch(), 0);
        store.reset();
        store.reset();
        assert_eq!(store.epoch(), 2);

        let raw = storage.writes_to(READING_PARTITION).pop().unwrap();
        assert!(!raw.contains("epoch"));
        assert_eq!(ReadingStore::load(storage).epoch(), 0);
    }

    #[test]
    fn state_survives_reload() {
        let (storage, mut store) = store();
        store.set_question("Career?");
        store.set_stage(Stage::Shuffling);
        store.set_cards(spread());
        store.reveal_card(2);

        let reloaded = ReadingStore::load(storage);
        assert_eq!(reloaded.session(), store.session());
    }

    #[test]
    fn persisted_shape_uses_camel_case() {
        let (storage, mut store) = store();
        store.set_interpretations(Vec::new(), Some("r-1".into()), None);
        let raw = storage.writes_to(READING_PARTITION).pop().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["readingId"], "r-1");
        assert_eq!(value["stage"], "input");
        assert_eq!(value["isInterpreting"], false);
    }
}
