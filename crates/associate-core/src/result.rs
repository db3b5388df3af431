//! Convenience result type alias for Associate.

use crate::error::AppError;

/// A specialized `Result` type for Associate operations.
pub type AppResult<T> = Result<T, AppError>;
