/// Unified error type for the Vigil workflow.
///
/// All crates use this error type for propagation across crate boundaries.
/// Internal module errors should be converted into the appropriate variant.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// Recommendation generation failed. Fatal for the run.
    #[error("generation error: {0}")]
    Generation(String),

    /// Error from an LLM provider (API call failures, deserialization).
    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    /// Provider rate limit exceeded.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The confirmation channel could not deliver a prompt or read a reply.
    #[error("confirmation channel error: {0}")]
    ConfirmationChannel(String),

    /// The run ended with recommendations that never reached a decision.
    #[error("{count} recommendation(s) left unresolved")]
    Unresolved {
        /// Number of unresolved ledger entries.
        count: usize,
    },

    /// Error from configuration loading or validation.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),
}

/// An unrecognized confirmation reply.
///
/// Recoverable: the workflow engine catches it and re-prompts. It never
/// crosses the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidResponse {
    /// The reply as entered, trimmed.
    pub input: String,
}

impl std::fmt::Display for InvalidResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unrecognized response '{}': answer yes, no, or modify",
            self.input
        )
    }
}

impl std::error::Error for InvalidResponse {}

impl From<serde_json::Error> for VigilError {
    fn from(err: serde_json::Error) -> Self {
        VigilError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for VigilError {
    fn from(err: serde_yaml::Error) -> Self {
        VigilError::Serialization(err.to_string())
    }
}
