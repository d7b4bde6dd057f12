pub mod auth_api;
pub mod file_storage;
pub mod http;
pub mod quota_api;
pub mod tarot_api;

pub use auth_api::HttpAuthAdapter;
pub use file_storage::FileStorage;
pub use http::ApiClient;
pub use quota_api::HttpQuotaAdapter;
pub use tarot_api::HttpTarotAdapter;
