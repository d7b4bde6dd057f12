//! services/client/src/flow/reading_flow.rs
//!
//! The reading flow controller. It is the only code that changes the reading
//! stage, and it only ever moves the stage one legal step forward:
//! input -> shuffling -> drawing -> revealing -> result. `new_reading` goes
//! back to input from anywhere.
//!
//! Every remote call is tagged with the store's epoch at the time it was
//! issued. `ReadingStore::reset` advances the epoch under the store lock, so a
//! response that arrives for a replaced reading is dropped instead of
//! repopulating the fresh session, whichever flow issued it.

use std::sync::Arc;
use std::time::Duration;

use tarot_reading_core::domain::{Card, InterpretationSet, Stage, MAX_QUESTION_CHARS};
use tarot_reading_core::ports::{PortError, PortResult, TarotService};
use tarot_reading_core::ReadingStore;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, FlowMode, Locale};
use crate::flow::error::FlowError;
use crate::flow::protocol::{EventSink, FlowEvent};

/// Where a reveal left the reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Some cards are still face down.
    Pending { remaining: usize },
    /// Every card is up and a background interpretation is still running;
    /// it will finish the reading when it lands.
    AwaitingInterpretation,
    /// The reading reached the result stage.
    Complete,
}

//=========================================================================================
// Shared State (Flow + Background Task)
//=========================================================================================

#[derive(Clone)]
struct Shared {
    tarot: Arc<dyn TarotService>,
    store: Arc<Mutex<ReadingStore>>,
    events: EventSink,
    language: Locale,
}

impl Shared {
    fn check_current(&self, store: &ReadingStore, tag: u64) -> Result<(), FlowError> {
        if store.epoch() == tag {
            Ok(())
        } else {
            debug!(epoch = tag, "Dropping result for a replaced reading.");
            Err(FlowError::Superseded)
        }
    }

    /// Stores a complete interpretation and finishes the reading if every card
    /// is already face up.
    fn apply_interpretations(&self, store: &mut ReadingStore, set: InterpretationSet) -> bool {
        store.set_interpretations(set.interpretations, set.reading_id, set.overall_interpretation);
        self.events.emit(FlowEvent::InterpretationReady);
        complete_if_ready(store, &self.events)
    }
}

/// Moves the reading one stage forward. Anything other than the legal
/// successor of the current stage is refused.
fn advance(store: &mut ReadingStore, to: Stage, events: &EventSink) -> bool {
    let from = store.session().stage();
    if from.next() != Some(to) {
        warn!(%from, %to, "Refusing out-of-order stage change.");
        return false;
    }
    store.set_stage(to);
    info!(%from, %to, "Reading stage changed.");
    events.emit(FlowEvent::StageChanged { stage: to });
    true
}

fn complete_if_ready(store: &mut ReadingStore, events: &EventSink) -> bool {
    let session = store.session();
    if session.stage() == Stage::Revealing && session.all_revealed() && session.has_interpretation()
    {
        return advance(store, Stage::Result, events);
    }
    false
}

/// What to do once the last card might be up. `None` means an interpretation
/// request is needed.
fn next_step(store: &mut ReadingStore, events: &EventSink) -> Option<RevealOutcome> {
    if !store.session().all_revealed() {
        let remaining = store
            .session()
            .cards()
            .iter()
            .filter(|c| !c.is_revealed)
            .count();
        return Some(RevealOutcome::Pending { remaining });
    }
    if complete_if_ready(store, events) {
        return Some(RevealOutcome::Complete);
    }
    if store.session().is_interpreting() {
        return Some(RevealOutcome::AwaitingInterpretation);
    }
    None
}

/// Raises the in-flight flag and captures what the request needs. Runs under
/// the same lock as the `next_step` that asked for it, so a concurrent reveal
/// sees the flag and waits instead of sending a second request.
fn claim_interpretation(store: &mut ReadingStore) -> (u64, String, Vec<Card>) {
    store.set_is_interpreting(true);
    let session = store.session();
    (store.epoch(), session.question().to_string(), session.cards().to_vec())
}

fn non_empty_draw(drawn: PortResult<Vec<Card>>) -> PortResult<Vec<Card>> {
    match drawn {
        Ok(cards) if cards.is_empty() => Err(PortError::MalformedResponse(
            "no cards were drawn".to_string(),
        )),
        other => other,
    }
}

fn non_empty_interpretation(
    result: PortResult<InterpretationSet>,
) -> PortResult<InterpretationSet> {
    match result {
        Ok(set) if set.interpretations.is_empty() && set.overall_interpretation.is_none() => {
            Err(PortError::MalformedResponse("the interpretation was empty".to_string()))
        }
        other => other,
    }
}

//=========================================================================================
// Background Prefetch
//=========================================================================================

struct Prefetch {
    epoch: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    cards: Option<oneshot::Receiver<PortResult<Vec<Card>>>>,
}

impl Prefetch {
    fn stop(self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

/// The background task slot of the shared reading. Every `ReadingFlow` built
/// over one store must share one of these, so that any of them can cancel or
/// await the work another one started.
#[derive(Clone, Default)]
pub struct BackgroundWork {
    slot: Arc<Mutex<Option<Prefetch>>>,
}

/// Draws and interprets while the shuffle is still on screen. The drawn cards
/// are handed to `ReadingFlow::draw` through `cards_tx`.
async fn prefetch_process(
    shared: Shared,
    tag: u64,
    question: String,
    cards_tx: oneshot::Sender<PortResult<Vec<Card>>>,
    cancel: CancellationToken,
) {
    info!(epoch = tag, "Background draw started.");
    let drawn = tokio::select! {
        _ = cancel.cancelled() => {
            info!(epoch = tag, "Background reading cancelled.");
            return;
        }
        drawn = shared.tarot.draw_cards() => non_empty_draw(drawn),
    };

    let cards = match drawn {
        Ok(cards) => cards,
        Err(e) => {
            warn!(epoch = tag, "Background draw failed: {}", e);
            let _ = cards_tx.send(Err(e));
            return;
        }
    };

    // The flag goes up before the cards are handed over, so by the time they
    // are on the table nobody mistakes this for "no interpretation requested".
    {
        let mut store = shared.store.lock().await;
        if store.epoch() != tag {
            debug!(epoch = tag, "Dropping background draw for a replaced reading.");
            return;
        }
        store.set_is_interpreting(true);
    }
    let _ = cards_tx.send(Ok(cards.clone()));

    let result = tokio::select! {
        _ = cancel.cancelled() => {
            info!(epoch = tag, "Background interpretation cancelled.");
            return;
        }
        result = shared.tarot.interpret(&question, &cards, shared.language.as_str()) => {
            non_empty_interpretation(result)
        }
    };

    let mut store = shared.store.lock().await;
    if store.epoch() != tag {
        debug!(epoch = tag, "Dropping background interpretation for a replaced reading.");
        return;
    }
    match result {
        Ok(_) if store.session().stage() == Stage::Result => {
            debug!(epoch = tag, "Reading already finished; ignoring background interpretation.");
        }
        Ok(set) => {
            info!(epoch = tag, "Background interpretation ready.");
            shared.apply_interpretations(&mut store, set);
        }
        Err(e) => {
            store.set_is_interpreting(false);
            let err = FlowError::remote("interpret the cards")(e);
            shared.events.emit(FlowEvent::Notice {
                message: err.to_string(),
            });
        }
    }
}

//=========================================================================================
// The Flow Controller
//=========================================================================================

/// Sequences a reading and reconciles remote results into the `ReadingStore`.
pub struct ReadingFlow {
    shared: Shared,
    mode: FlowMode,
    shuffle_delay: Duration,
    background: BackgroundWork,
}

impl ReadingFlow {
    pub fn new(
        tarot: Arc<dyn TarotService>,
        store: Arc<Mutex<ReadingStore>>,
        background: BackgroundWork,
        config: &Config,
        events: EventSink,
    ) -> Self {
        Self {
            shared: Shared {
                tarot,
                store,
                events,
                language: config.language,
            },
            mode: config.flow_mode,
            shuffle_delay: config.shuffle_delay,
            background,
        }
    }

    pub fn store(&self) -> &Arc<Mutex<ReadingStore>> {
        &self.shared.store
    }

    pub async fn epoch(&self) -> u64 {
        self.shared.store.lock().await.epoch()
    }

    async fn expect_stage(&self, expected: Stage) -> Result<u64, FlowError> {
        let store = self.shared.store.lock().await;
        let stage = store.session().stage();
        if stage != expected {
            return Err(FlowError::WrongStage(stage));
        }
        Ok(store.epoch())
    }

    /// Validates `text` with the service and, if it is accepted, starts the
    /// shuffle. Nothing in the store changes unless validation succeeds.
    pub async fn submit_question(&self, text: &str) -> Result<(), FlowError> {
        let question = text.trim();
        if question.is_empty() {
            return Err(FlowError::MissingInput("question"));
        }
        if question.chars().count() > MAX_QUESTION_CHARS {
            return Err(FlowError::QuestionTooLong {
                max: MAX_QUESTION_CHARS,
            });
        }

        let tag = self.expect_stage(Stage::Input).await?;
        let verdict = self
            .shared
            .tarot
            .validate_question(question, self.shared.language.as_str())
            .await
            .map_err(FlowError::remote("validate your question"))?;

        if !verdict.suitable {
            info!("Question declined by the service.");
            let reason = verdict
                .reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "This question is not suitable for a reading.".to_string());
            return Err(FlowError::Unsuitable(reason));
        }

        {
            let mut store = self.shared.store.lock().await;
            self.shared.check_current(&store, tag)?;
            let stage = store.session().stage();
            if stage != Stage::Input {
                return Err(FlowError::WrongStage(stage));
            }
            store.set_question(question);
            advance(&mut store, Stage::Shuffling, &self.shared.events);
        }

        if self.mode == FlowMode::Prefetch {
            self.start_prefetch(tag, question.to_string()).await;
        }
        Ok(())
    }

    async fn start_prefetch(&self, tag: u64, question: String) {
        let cancel = CancellationToken::new();
        let (cards_tx, cards_rx) = oneshot::channel();
        let task = {
            let shared = self.shared.clone();
            let token = cancel.clone();
            tokio::spawn(async move {
                prefetch_process(shared, tag, question, cards_tx, token).await;
            })
        };
        let previous = self.background.slot.lock().await.replace(Prefetch {
            epoch: tag,
            cancel,
            handle: Some(task),
            cards: Some(cards_rx),
        });
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    /// Holds the shuffle for the configured delay, then moves on to drawing.
    pub async fn finish_shuffle(&self) -> Result<(), FlowError> {
        let tag = self.expect_stage(Stage::Shuffling).await?;
        tokio::time::sleep(self.shuffle_delay).await;

        let mut store = self.shared.store.lock().await;
        self.shared.check_current(&store, tag)?;
        if store.session().stage() == Stage::Shuffling {
            advance(&mut store, Stage::Drawing, &self.shared.events);
        }
        Ok(())
    }

    /// Puts a spread on the table. Uses the background draw when one was
    /// started for this reading. Returns the number of cards drawn.
    pub async fn draw(&self) -> Result<usize, FlowError> {
        let tag = self.expect_stage(Stage::Drawing).await?;

        let prefetched = self
            .background
            .slot
            .lock()
            .await
            .as_mut()
            .filter(|p| p.epoch == tag)
            .and_then(|p| p.cards.take());
        let drawn = match prefetched {
            Some(rx) => rx.await.unwrap_or_else(|_| {
                Err(PortError::Unexpected(
                    "the background draw stopped before finishing".to_string(),
                ))
            }),
            None => self.shared.tarot.draw_cards().await,
        };
        let cards = non_empty_draw(drawn).map_err(FlowError::remote("draw cards"))?;
        let count = cards.len();

        let mut store = self.shared.store.lock().await;
        self.shared.check_current(&store, tag)?;
        let stage = store.session().stage();
        if stage != Stage::Drawing {
            return Err(FlowError::WrongStage(stage));
        }
        store.set_cards(cards);
        self.shared.events.emit(FlowEvent::CardsDrawn { count });
        advance(&mut store, Stage::Revealing, &self.shared.events);
        Ok(count)
    }

    /// Turns one card face up. When it was the last one, finishes the reading
    /// or requests the interpretation. Out-of-range or already revealed
    /// indices change nothing.
    pub async fn reveal(&self, index: usize) -> Result<RevealOutcome, FlowError> {
        let (tag, question, cards) = {
            let mut store = self.shared.store.lock().await;
            let stage = store.session().stage();
            if stage != Stage::Revealing {
                return Err(FlowError::WrongStage(stage));
            }
            let face_down = store
                .session()
                .cards()
                .get(index)
                .is_some_and(|c| !c.is_revealed);
            if face_down {
                store.reveal_card(index);
                self.shared.events.emit(FlowEvent::CardRevealed { index });
            }
            if let Some(outcome) = next_step(&mut store, &self.shared.events) {
                return Ok(outcome);
            }
            claim_interpretation(&mut store)
        };
        self.interpret_now(tag, question, cards).await
    }

    /// Asks for the interpretation again after a failed attempt.
    pub async fn retry_interpretation(&self) -> Result<RevealOutcome, FlowError> {
        let (tag, question, cards) = {
            let mut store = self.shared.store.lock().await;
            let stage = store.session().stage();
            if stage != Stage::Revealing {
                return Err(FlowError::WrongStage(stage));
            }
            if let Some(outcome) = next_step(&mut store, &self.shared.events) {
                return Ok(outcome);
            }
            claim_interpretation(&mut store)
        };
        self.interpret_now(tag, question, cards).await
    }

    async fn interpret_now(
        &self,
        tag: u64,
        question: String,
        cards: Vec<Card>,
    ) -> Result<RevealOutcome, FlowError> {
        info!(epoch = tag, cards = cards.len(), "Requesting interpretation.");
        let result = self
            .shared
            .tarot
            .interpret(&question, &cards, self.shared.language.as_str())
            .await;

        let mut store = self.shared.store.lock().await;
        self.shared.check_current(&store, tag)?;
        match non_empty_interpretation(result) {
            Ok(set) => {
                let stage = store.session().stage();
                if stage != Stage::Revealing {
                    return Err(FlowError::WrongStage(stage));
                }
                self.shared.apply_interpretations(&mut store, set);
                Ok(RevealOutcome::Complete)
            }
            Err(e) => {
                store.set_is_interpreting(false);
                Err(FlowError::remote("interpret the cards")(e))
            }
        }
    }

    /// Waits for any background work of the current reading to finish.
    pub async fn settle(&self) {
        let handle = self
            .background
            .slot
            .lock()
            .await
            .as_mut()
            .and_then(|p| p.handle.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Background reading task failed: {}", e);
                }
            }
        }
    }

    /// Abandons the current reading, background work included, and returns
    /// to the input stage.
    pub async fn new_reading(&self) {
        if let Some(prefetch) = self.background.slot.lock().await.take() {
            prefetch.stop();
        }
        let mut store = self.shared.store.lock().await;
        store.reset();
        info!(epoch = store.epoch(), "Started a new reading.");
        self.shared
            .events
            .emit(FlowEvent::StageChanged { stage: Stage::Input });
    }
}
