use thiserror::Error;

/// Errors surfaced by the chat-completion gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Request to chat provider failed: {0}")]
    Request(reqwest::Error),
    #[error("Failed to deserialize chat provider response: {0}")]
    Deserialization(reqwest::Error),
    #[error("Chat provider returned an error: {0}")]
    Api(String),
    #[error("Chat provider returned an empty response")]
    EmptyResponse,
    #[error("Request to chat provider timed out")]
    Timeout,
}

impl GatewayError {
    /// True when the failure indicates the provider itself is unreachable,
    /// as opposed to a malformed or rejected single call. Unreachability is
    /// treated as fatal for a whole fan-out stage.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, GatewayError::Request(_) | GatewayError::Timeout)
    }
}
