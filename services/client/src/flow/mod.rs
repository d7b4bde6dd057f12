pub mod account;
pub mod error;
pub mod protocol;
pub mod reading_flow;
pub mod state;

pub use account::AccountFlow;
pub use error::FlowError;
pub use protocol::{EventSink, FlowEvent};
pub use reading_flow::{BackgroundWork, ReadingFlow, RevealOutcome};
pub use state::AppState;
