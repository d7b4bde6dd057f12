//! services/client/src/adapters/quota_api.rs

use async_trait::async_trait;
use tarot_reading_core::domain::Quota;
use tarot_reading_core::ports::{PortResult, QuotaService};

use crate::adapters::http::ApiClient;

/// Reads the remaining free readings from `GET /quota`.
#[derive(Clone)]
pub struct HttpQuotaAdapter {
    client: ApiClient,
}

impl HttpQuotaAdapter {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QuotaService for HttpQuotaAdapter {
    async fn fetch_quota(&self) -> PortResult<Quota> {
        self.client.get("/quota").await
    }
}
