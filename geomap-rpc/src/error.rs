//! Error types for the JSON-RPC front door.

use geomap_core::MapError;
use thiserror::Error;

/// Result type for RPC handlers.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors raised while handling a JSON-RPC request.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No map session with this id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A map session with this id already exists.
    #[error("Session already exists: {0}")]
    SessionExists(String),

    /// The request params could not be decoded.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// The map component rejected the request.
    #[error(transparent)]
    Map(#[from] MapError),
}

impl RpcError {
    /// JSON-RPC error code.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::SessionNotFound(_) => -32010,
            Self::SessionExists(_) => -32011,
            Self::InvalidParams(_) => -32602,
            Self::Map(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(RpcError::SessionNotFound("a".into()).code(), -32010);
        assert_eq!(RpcError::SessionExists("a".into()).code(), -32011);
        assert_eq!(RpcError::InvalidParams("bad".into()).code(), -32602);
        let err: RpcError = MapError::TargetNotFound("x".into()).into();
        assert_eq!(err.code(), -32002);
        assert_eq!(err.to_string(), "Target not found: x");
    }
}
