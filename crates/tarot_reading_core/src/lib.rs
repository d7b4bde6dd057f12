pub mod domain;
pub mod persist;
pub mod ports;
pub mod reading_store;
pub mod user_store;

pub use domain::{
    AuthTokens, Card, Interpretation, InterpretationSet, Orientation, QuestionVerdict, Quota,
    ReadingSession, Stage, UserIdentity, UserProfile, MAX_QUESTION_CHARS,
};
pub use persist::{MemoryStorage, PersistentStore, READING_PARTITION, TOKEN_KEY, USER_PARTITION};
pub use ports::{AuthService, PortError, PortResult, QuotaService, StateStorage, TarotService};
pub use reading_store::ReadingStore;
pub use user_store::{LoginError, UserStore};
