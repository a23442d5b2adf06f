use thiserror::Error;

/// Errors raised by the core while building pipelines and handling event payloads.
///
/// Handler implementations report their own failures as [`anyhow::Error`]; the
/// variants here only cover what the crate itself can reject.
#[derive(Error, Debug)]
pub enum CqsError {
    #[error("empty event name")]
    EmptyEventName,

    #[error("empty event handler")]
    EmptyEventHandler,

    #[error("empty event to command func")]
    EmptyEventToCommandFunc,

    #[error("empty command handler")]
    EmptyCommandHandler,

    #[error("event payload (de)serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Errors returned by the observability collaborators.
#[derive(Error, Debug)]
pub enum ObsError {
    #[error("marshal log entry: {source}")]
    Marshal {
        #[source]
        source: anyhow::Error,
    },

    #[error("write log entry: {0}")]
    Write(#[from] std::io::Error),

    #[error("log writer lock poisoned")]
    Poisoned,

    #[error("record metric `{name}`: {source}")]
    Metric {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

// Result alias within the library
pub type Result<T, E = CqsError> = std::result::Result<T, E>;
