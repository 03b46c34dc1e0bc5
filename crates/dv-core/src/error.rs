use std::fmt;

/// Failure of one call to the flashcard store. Never fatal to a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// The store could not be reached.
    Transport(String),
    /// The store answered with an error payload.
    Store(String),
    /// A response or record did not have the expected shape.
    Decode(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Transport(msg) => write!(f, "transport error: {msg}"),
            RpcError::Store(msg) => write!(f, "store error: {msg}"),
            RpcError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
