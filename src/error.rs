/// Crate-wide error handling.
///
/// Every fallible entry point in this crate returns a `CoreResult<T>`.
/// Internal helpers do not recover from errors; they propagate them to the
/// API boundary named in their doc comments.
use thiserror::Error;

/// The crate-wide error type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A constructor rejected a non-positive size, radius, iteration count,
    /// or degenerate bound.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A bounded spatial grid cell rejected an insertion past its capacity.
    #[error("grid cell ({gx}, {gy}) exceeded capacity {capacity}")]
    CapacityExceeded { gx: i32, gy: i32, capacity: usize },

    /// A spawner attempted to add a particle whose identity already exists.
    #[error("particle identity {id} already exists")]
    DuplicateIdentity { id: u64 },

    /// Work was submitted to a worker pool after it entered the draining
    /// state.
    #[error("worker pool has shut down")]
    PoolShutDown,

    /// `set_field` received a sample buffer whose length does not match
    /// `dims.0 * dims.1 * dims.2`.
    #[error("field dimension mismatch: expected {expected} samples for dims {dims:?}, got {actual}")]
    FieldDimensionMismatch {
        dims: (usize, usize, usize),
        expected: usize,
        actual: usize,
    },
}

/// Crate-wide result alias.
pub type CoreResult<T> = Result<T, CoreError>;

/// Extension trait for attaching `InvalidConfig` context to a boolean
/// precondition check, mirroring the `*ErrorContext` traits the teacher
/// repo layers over its own `EngineError`.
pub trait CoreErrorContext<T> {
    fn config_context(self, reason: impl Into<String>) -> CoreResult<T>;
}

impl<T> CoreErrorContext<T> for Option<T> {
    fn config_context(self, reason: impl Into<String>) -> CoreResult<T> {
        self.ok_or_else(|| CoreError::InvalidConfig {
            reason: reason.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_identity_message_includes_id() {
        let err = CoreError::DuplicateIdentity { id: 42 };
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn option_context_converts_none_to_invalid_config() {
        let none: Option<u32> = None;
        let err = none.config_context("missing radius").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
    }
}
