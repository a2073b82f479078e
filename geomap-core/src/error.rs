//! Error types for map materialization and dispatch.

use thiserror::Error;

/// Result type for map operations.
pub type MapResult<T> = Result<T, MapError>;

/// Errors that can occur while materializing descriptors or dispatching operations.
///
/// Every error is scoped to the single conversion or invocation call that raised
/// it. Previously materialized state is never affected by a failed later call.
#[derive(Debug, Error)]
pub enum MapError {
    /// A descriptor carried a type tag that no factory or basic converter knows.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// An operation referenced an id that is not in the registry.
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// The resolved target does not expose the requested method.
    #[error("Unsupported operation '{method}' on {target}")]
    UnsupportedOperation {
        /// Id of the resolved target.
        target: String,
        /// Requested method name.
        method: String,
    },

    /// The arguments payload was not a JSON array.
    #[error("Malformed arguments: {0}")]
    MalformedArguments(String),

    /// A descriptor is valid JSON but cannot be materialized.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// An argument has the wrong shape for the invoked method.
    #[error("Invalid argument for {method}: {reason}")]
    InvalidArgument {
        /// Method being invoked.
        method: String,
        /// What was wrong with the argument.
        reason: String,
    },

    /// Descriptor or payload (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MapError {
    /// Build an [`MapError::InvalidArgument`].
    pub fn invalid_argument(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Stable JSON-RPC error code for this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::UnsupportedType(_) => -32001,
            Self::TargetNotFound(_) => -32002,
            Self::UnsupportedOperation { .. } => -32003,
            Self::MalformedArguments(_) => -32004,
            Self::InvalidDescriptor(_) => -32005,
            Self::InvalidArgument { .. } => -32006,
            Self::Serialization(_) => -32000,
        }
    }
}
