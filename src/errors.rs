//! Error taxonomy for the round engine.
//!
//! Validation errors are reported to the caller with no side effects applied.
//! `Conflict` is an internal retry signal for optimistic account updates and
//! is never surfaced to end users. `ConsistencyViolation` means an idempotency
//! guard was bypassed and money may have been created or destroyed; it is
//! logged loudly and propagated, never silently corrected.

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("betting closed for this round ({secs_remaining}s remaining)")]
    BettingClosed { secs_remaining: u64 },

    #[error("insufficient balance: need {required:.2}, have {available:.2}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("turnover incomplete: {remaining:.2} left to wager")]
    TurnoverIncomplete { remaining: f64 },

    #[error("concurrent update conflict for account {0}")]
    Conflict(String),

    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Validation errors carry no side effects and map to client errors at
    /// the API boundary.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::BettingClosed { .. }
                | EngineError::InsufficientBalance { .. }
                | EngineError::InvalidSelection(_)
                | EngineError::InvalidAmount(_)
                | EngineError::TurnoverIncomplete { .. }
        )
    }
}
