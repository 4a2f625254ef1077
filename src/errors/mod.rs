pub mod app_error;

pub use app_error::AppError;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;
