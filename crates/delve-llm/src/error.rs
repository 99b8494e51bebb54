use ollama_rs::error::OllamaError;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The endpoint refused or never accepted the connection.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("ollama request failed: {0}")]
    Ollama(String),

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Classify an Ollama client error: connection failures become [`LlmError::Unavailable`].
    #[must_use]
    pub fn from_ollama(err: OllamaError) -> Self {
        match err {
            OllamaError::ReqwestError(e) if e.is_connect() => Self::Unavailable(e.to_string()),
            OllamaError::ReqwestError(e) if e.is_timeout() => Self::Timeout,
            other => Self::Ollama(other.to_string()),
        }
    }

    /// True when the endpoint could not be reached at all.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
