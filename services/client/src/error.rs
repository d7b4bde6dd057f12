//! services/client/src/error.rs
//!
//! Defines the primary error type for the client service.

use crate::config::ConfigError;
use crate::flow::FlowError;
use tarot_reading_core::ports::PortError;

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A user-facing failure from one of the flows.
    #[error("{0}")]
    Flow(#[from] FlowError),

    /// Represents a standard Input/Output error (e.g., creating the storage directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
