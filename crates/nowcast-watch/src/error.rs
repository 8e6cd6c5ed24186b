use thiserror::Error;

use crate::session::ReadError;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to subscribe to the session registry: {0}")]
    Subscribe(#[source] ReadError),

    #[error("failed to write to the output stream: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] nowcast_core::CoreError),

    #[error("notification channel closed")]
    ChannelClosed,
}
