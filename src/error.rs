//! Renderer error type.

use crate::engine::EngineError;

/// Errors surfaced by the renderer.
///
/// Only [`RendererError::EmptySpine`], [`RendererError::InvalidOptions`] and
/// [`RendererError::Engine`] are returned from calls. Everything else is a soft
/// failure of an asynchronous command and is reported to the delegate while the
/// session keeps running.
#[derive(Debug)]
pub enum RendererError {
    /// The book has no spine items to paginate.
    EmptySpine,
    /// The engine refused a request synchronously.
    Engine(EngineError),
    /// The engine reported that its host document failed to load.
    EngineLoad { message: String },
    /// A dispatched command was never acknowledged.
    BridgeTimeout {
        command: &'static str,
        waited_ms: u64,
    },
    /// The engine's response channel is down; commands are held until it recovers.
    EngineUnresponsive,
    /// The host document went away before the command was acknowledged.
    Interrupted { command: &'static str },
    /// The script ran and raised an error.
    ScriptFailed {
        command: &'static str,
        message: String,
    },
    /// The script result was not valid JSON.
    MalformedResponse {
        command: &'static str,
        message: String,
    },
    /// Command arguments could not be encoded into script text.
    Encode(serde_json::Error),
    /// Renderer options could not be parsed.
    InvalidOptions(String),
}

impl RendererError {
    /// True for failures the session recovers from on its own.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::EngineLoad { .. }
                | Self::BridgeTimeout { .. }
                | Self::EngineUnresponsive
                | Self::Interrupted { .. }
                | Self::ScriptFailed { .. }
                | Self::MalformedResponse { .. }
        )
    }
}

impl core::fmt::Display for RendererError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::EmptySpine => write!(f, "book has an empty spine"),
            Self::Engine(err) => write!(f, "content engine error: {}", err),
            Self::EngineLoad { message } => {
                write!(f, "content engine failed to load: {}", message)
            }
            Self::BridgeTimeout { command, waited_ms } => write!(
                f,
                "script command {} not acknowledged after {}ms",
                command, waited_ms
            ),
            Self::EngineUnresponsive => write!(f, "content engine is not responding"),
            Self::Interrupted { command } => write!(
                f,
                "script command {} interrupted by host document change",
                command
            ),
            Self::ScriptFailed { command, message } => {
                write!(f, "script command {} failed: {}", command, message)
            }
            Self::MalformedResponse { command, message } => write!(
                f,
                "script command {} returned malformed result: {}",
                command, message
            ),
            Self::Encode(err) => write!(f, "script encoding failed: {}", err),
            Self::InvalidOptions(message) => write!(f, "invalid renderer options: {}", message),
        }
    }
}

impl std::error::Error for RendererError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EngineError> for RendererError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<serde_json::Error> for RendererError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_command() {
        let err = RendererError::BridgeTimeout {
            command: "openPageRight",
            waited_ms: 10_000,
        };
        assert_eq!(
            err.to_string(),
            "script command openPageRight not acknowledged after 10000ms"
        );
        assert!(err.is_soft());
        let interrupted = RendererError::Interrupted {
            command: "openPageLeft",
        };
        assert!(interrupted.is_soft());
        assert!(interrupted.to_string().contains("openPageLeft interrupted"));
    }

    #[test]
    fn construction_errors_are_not_soft() {
        assert!(!RendererError::EmptySpine.is_soft());
        assert!(!RendererError::InvalidOptions("x".into()).is_soft());
        let engine = RendererError::from(EngineError::new("detached"));
        assert!(!engine.is_soft());
        assert!(std::error::Error::source(&engine).is_some());
    }
}
