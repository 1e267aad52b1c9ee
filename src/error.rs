use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Endpoint URL could not be constructed.
    #[error("transport: {0}")]
    Transport(String),
    /// Connection failure, timeout, or non-success HTTP status.
    #[error("network: {0}")]
    Network(#[from] reqwest::Error),
    /// Response body did not match the expected shape.
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    /// The local store rejected a statement or commit.
    #[error("persistence: {0}")]
    Persistence(#[from] rusqlite::Error),
    /// User input not parseable as the expected type.
    #[error("validation: {0}")]
    Validation(String),
    #[error("invalid state: {0}")]
    State(&'static str),
}
