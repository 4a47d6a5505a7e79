//! Error types for the runtime.
//!
//! Every failure surfaces through the public call that triggered the
//! processing step; nothing is retried or swallowed.

use crate::system::ActorName;
use thiserror::Error;

/// Boxed error returned by render callbacks and other external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SystemError>;

/// Errors produced by the orchestrator, the executor and the renderer.
#[derive(Debug, Error)]
pub enum SystemError {
    /// A registry slot required for the operation is unset.
    #[error("actor `{0}` is not registered")]
    ActorNotRegistered(ActorName),

    /// An event reached the orchestrator whose type names no destination.
    #[error("no destination handles event `{0}`")]
    UnknownTargetEvent(String),

    /// An actor name outside `app`, `renderer` and `ui`.
    #[error("unknown actor name `{0}`")]
    UnknownTarget(String),

    /// The external render callback failed.
    #[error("render callback failed")]
    RenderCallback(#[source] BoxError),

    /// A forwarded payload was missing or did not decode.
    #[error("malformed payload for `{event_type}`")]
    MalformedPayload {
        /// Type of the event carrying the payload.
        event_type: String,
        /// Decoding failure, if the payload was present.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// An actor's state was read while it was processing an event.
    #[error("actor `{0}` is busy")]
    ActorBusy(String),

    /// A state chart definition is inconsistent.
    #[error("invalid machine definition: {0}")]
    InvalidMachine(String),

    /// A machine context could not be serialized.
    #[error("context serialization failed")]
    Serialization(#[from] serde_json::Error),
}

impl SystemError {
    /// Wrap a render callback failure.
    pub fn render(error: impl Into<BoxError>) -> Self {
        Self::RenderCallback(error.into())
    }

    pub(crate) fn malformed(event_type: &str, source: Option<serde_json::Error>) -> Self {
        Self::MalformedPayload {
            event_type: event_type.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_render_error_keeps_source() {
        let err = SystemError::render("surface lost");
        assert_eq!(err.to_string(), "render callback failed");
        assert_eq!(err.source().unwrap().to_string(), "surface lost");
    }

    #[test]
    fn test_not_registered_names_slot() {
        let err = SystemError::ActorNotRegistered(ActorName::Renderer);
        assert_eq!(err.to_string(), "actor `renderer` is not registered");
    }
}
