//! services/client/src/flow/state.rs
//!
//! Defines the application's shared state: the two stores and the service
//! adapters, created once at startup and handed to the flows.

use std::sync::Arc;

use tarot_reading_core::ports::{AuthService, QuotaService, StateStorage, TarotService};
use tarot_reading_core::{ReadingStore, UserStore};
use tokio::sync::Mutex;
use tracing::info;

use crate::adapters::{ApiClient, FileStorage, HttpAuthAdapter, HttpQuotaAdapter, HttpTarotAdapter};
use crate::config::Config;
use crate::error::ClientError;
use crate::flow::{AccountFlow, BackgroundWork, EventSink, ReadingFlow};

/// The shared application state. Each store exists exactly once, and so does
/// the background work slot of the reading held in it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub reading: Arc<Mutex<ReadingStore>>,
    pub background: BackgroundWork,
    pub user: Arc<Mutex<UserStore>>,
    pub tarot: Arc<dyn TarotService>,
    pub auth: Arc<dyn AuthService>,
    pub quota: Arc<dyn QuotaService>,
}

impl AppState {
    /// Opens file storage, rehydrates both stores and wires the HTTP adapters.
    pub fn build(config: Config) -> Result<Self, ClientError> {
        let storage: Arc<dyn StateStorage> = Arc::new(FileStorage::open(&config.storage_dir)?);
        info!(dir = %config.storage_dir.display(), "Client storage opened.");
        Self::with_storage(config, storage)
    }

    pub fn with_storage(
        config: Config,
        storage: Arc<dyn StateStorage>,
    ) -> Result<Self, ClientError> {
        let mut reading = ReadingStore::load(storage.clone());
        // No task from a previous run survives to clear this flag.
        if reading.session().is_interpreting() {
            info!("Clearing an interpretation flag left by a previous run.");
            reading.set_is_interpreting(false);
        }
        let reading = Arc::new(Mutex::new(reading));
        let user = Arc::new(Mutex::new(UserStore::load(storage.clone())));

        let client = ApiClient::new(
            config.api_base_url.clone(),
            user.clone(),
            config.unauthorized_policy,
        )?;

        Ok(Self {
            config: Arc::new(config),
            reading,
            background: BackgroundWork::default(),
            user,
            tarot: Arc::new(HttpTarotAdapter::new(client.clone())),
            auth: Arc::new(HttpAuthAdapter::new(client.clone())),
            quota: Arc::new(HttpQuotaAdapter::new(client)),
        })
    }

    pub fn reading_flow(&self, events: EventSink) -> ReadingFlow {
        ReadingFlow::new(
            self.tarot.clone(),
            self.reading.clone(),
            self.background.clone(),
            &self.config,
            events,
        )
    }

    pub fn account_flow(&self) -> AccountFlow {
        AccountFlow::new(self.auth.clone(), self.quota.clone(), self.user.clone())
    }
}
