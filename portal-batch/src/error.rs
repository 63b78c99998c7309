//! Error types for the batch engine
//!
//! Validation and capacity errors are raised before any network I/O.
//! Transport failures surface from `execute()` wrapped as [`BatchError::Execution`].

use thiserror::Error;

use crate::api::{CommandResult, ItemKey};

pub type Result<T> = std::result::Result<T, BatchError>;

#[derive(Debug, Error)]
pub enum BatchError {
    /// Malformed input item or missing required key, detected locally
    #[error("invalid argument ({position}): {message}")]
    InvalidArgument { position: String, message: String },

    /// More commands registered than a single physical call can carry
    #[error("batch capacity of {capacity} commands exceeded")]
    CapacityExceeded { capacity: usize },

    /// The physical call itself failed (network, auth, malformed request)
    #[error("{message}")]
    Execution {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A sequential mutation failed after earlier physical calls were applied.
    /// `applied` holds the results of those calls, in input order.
    #[error("{source} ({} item(s) already applied)", .applied.len())]
    PartiallyApplied {
        applied: Vec<(ItemKey, CommandResult)>,
        #[source]
        source: Box<BatchError>,
    },

    /// A listing page reported a remote failure for its command
    #[error("command {command_id} failed: {message}")]
    CommandFailed { command_id: String, message: String },

    /// The remote side answered with data the engine cannot interpret
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl BatchError {
    pub fn invalid_argument(position: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            position: position.to_string(),
            message: message.into(),
        }
    }

    /// Wrap a transport failure, keeping its message and cause chain
    pub fn execution(context: &str, error: anyhow::Error) -> Self {
        Self::Execution {
            message: format!("{}: {:#}", context, error),
            source: error.into(),
        }
    }

    /// Whether the error was raised before any network call was made
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::CapacityExceeded { .. }
        )
    }
}
