use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbotError {
    /// Network failure or non-success HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Platform accepted the request but reported an API-level error.
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Listener error for '{kind}': {source}")]
    Listener {
        kind: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    /// The polling loop gave up after too many consecutive failed iterations.
    #[error("Polling stopped after {failures} consecutive failures")]
    PollingExhausted { failures: u32 },

    #[error("Task error: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised by a rule's transform while building a listener argument.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Update has no '{0}' field")]
    MissingField(&'static str),

    #[error("No bot_command entity in message")]
    NoCommandEntity,

    #[error("Unexpected payload: {0}")]
    Payload(String),
}

impl DbotError {
    /// True for errors produced while talking to the platform (fetch or request).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DbotError::Transport(_) | DbotError::Api { .. } | DbotError::Decode(_)
        )
    }
}

impl From<serde_json::Error> for DbotError {
    fn from(e: serde_json::Error) -> Self {
        DbotError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DbotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(DbotError::Transport("timeout".into()).is_transport());
        assert!(DbotError::Api {
            code: 409,
            description: "Conflict".into()
        }
        .is_transport());
        assert!(DbotError::Decode("bad json".into()).is_transport());
        assert!(!DbotError::Config("x".into()).is_transport());
        assert!(!DbotError::Handler(HandlerError::NoCommandEntity).is_transport());
    }

    #[test]
    fn test_display_messages() {
        let err = DbotError::Api {
            code: 401,
            description: "Unauthorized".into(),
        };
        assert_eq!(err.to_string(), "API error 401: Unauthorized");
        let err = DbotError::PollingExhausted { failures: 4 };
        assert_eq!(err.to_string(), "Polling stopped after 4 consecutive failures");
    }
}
