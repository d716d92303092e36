//! Error types for the event emitter

use crate::listener::ListenerId;
use compact_str::CompactString;

/// Error returned by a listener callback.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// Callback reported a failure with a message
    #[error("{0}")]
    Failed(String),

    /// Any other error raised from inside the callback
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl CallbackError {
    /// Shorthand for a message-only failure
    pub fn failed(message: impl Into<String>) -> Self {
        CallbackError::Failed(message.into())
    }
}

// Lets a callback `?` a nested emit.
impl From<EmitterError> for CallbackError {
    fn from(err: EmitterError) -> Self {
        CallbackError::Other(Box::new(err))
    }
}

/// Main error type for the emitter
#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    /// A listener callback failed during invocation
    #[error("Listener {id} on '{event}' failed: {source}")]
    CallbackFailed {
        id: ListenerId,
        event: CompactString,
        #[source]
        source: CallbackError,
    },

    /// Configuration is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EmitterError {
    /// Id of the listener whose callback failed, if this is a callback failure
    pub fn listener_id(&self) -> Option<ListenerId> {
        match self {
            EmitterError::CallbackFailed { id, .. } => Some(*id),
            _ => None,
        }
    }
}
