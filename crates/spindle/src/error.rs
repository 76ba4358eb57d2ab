use thiserror::Error;

/// Result alias for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors surfaced by the dispatch layer. The wheel itself never fails;
/// its misuse cases are debug assertions, not runtime errors.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher has begun shutting down and no longer accepts work.
    #[error("dispatcher is shut down")]
    Shutdown,

    /// The system clock is before UNIX_EPOCH.
    #[error("system clock is before UNIX_EPOCH")]
    ClockSkew,
}
