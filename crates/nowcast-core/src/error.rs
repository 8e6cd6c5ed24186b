use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed record: {0}")]
    Decode(#[from] serde_json::Error),
}
