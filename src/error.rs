use thiserror::Error;

use crate::store::StoreError;
use crate::types::{Cell, GameKind};

pub type ArenaResult<T> = Result<T, ArenaError>;

/// Every way a request against the arena can be refused.
///
/// None of these trigger an internal retry. Callers use [`ArenaError::is_retryable`]
/// and the retry-after hint to decide on backoff.
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("{0}")]
    Validation(String),

    #[error("missing or invalid API key. include Authorization: Bearer mab_xxx")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(String),

    #[error("this game belongs to another agent")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error("max {limit} active {kind} games per agent")]
    Capacity { kind: GameKind, limit: usize },

    #[error("rate limited. try again in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("wall blocks movement in that direction")]
    WallBlocked { position: Cell },

    #[error("board generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ArenaError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Store(_))
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Stable machine-readable tag for response bodies and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::NotFound(_) => "not_found",
            Self::Forbidden => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Capacity { .. } => "capacity",
            Self::RateLimited { .. } => "rate_limited",
            Self::WallBlocked { .. } => "wall_blocked",
            Self::Generation(_) => "generation",
            Self::Store(_) => "store",
        }
    }
}
