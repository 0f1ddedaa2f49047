use thiserror::Error;

/// Error taxonomy shared by every core operation.
///
/// All variants are terminal for the request that produced them except
/// `StorageUnavailable`, which is the only class a caller may retry
/// (with backoff). `InvalidTransition` means "someone already acted on
/// this order" — callers should refresh state, not resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    /// Malformed or incomplete input; the caller must fix and resubmit.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Unknown identifier.
    #[error("not found: {0}")]
    NotFound(String),
    /// The actor is not permitted to perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The current state no longer permits the operation.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    /// The negotiation channel is closed for new messages.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
    /// Persistence I/O failure.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl MarketError {
    /// Machine-readable kind, stable for API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketError::Validation(_) => "validation_error",
            MarketError::NotFound(_) => "not_found",
            MarketError::Forbidden(_) => "forbidden",
            MarketError::InvalidTransition(_) => "invalid_transition",
            MarketError::ChannelClosed(_) => "channel_closed",
            MarketError::StorageUnavailable(_) => "storage_unavailable",
        }
    }

    /// Whether a caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::StorageUnavailable(_))
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
