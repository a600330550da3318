/// Core error types for the Reelforge engine.

/// A specialized Result type for Reelforge operations.
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Top-level error type encompassing all Reelforge subsystems.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// The intent router produced no member of the closed tool enumeration.
    /// Fatal to the whole request; nothing is persisted.
    #[error("tool selection error: {0}")]
    ToolSelection(String),

    /// Generated source failed the static pre-compile checks.
    #[error("validation error: {0}")]
    Validation(String),

    /// The scene compiler rejected validated source. Isolated to one scene.
    #[error("compile error: {0}")]
    Compilation(String),

    /// No registered asset matched a natural-language media reference.
    #[error("media resolution failure: {0}")]
    MediaResolution(String),

    /// The generation model call itself failed (transport, bad reply shape).
    #[error("generation error: {0}")]
    Generation(String),

    /// A network-backed call exceeded the caller-supplied deadline.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// The user aborted the request mid-flight.
    #[error("request cancelled")]
    Cancelled,

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl ForgeError {
    /// True when the failure must fail the entire request rather than
    /// degrade to a single scene's `compilation_error`.
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            ForgeError::ToolSelection(_)
                | ForgeError::Persistence(_)
                | ForgeError::Timeout(_)
                | ForgeError::Cancelled
        )
    }
}
