use thiserror::Error;

/// Terminal failure of one fetch, reported after the retry budget is spent.
///
/// Cloneable so that one in-flight outcome can be handed to every caller
/// that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Server { .. } => "server",
            Self::Decode(_) => "decode",
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
