//! Result type alias for Matrikel

use super::errors::MatrikelError;

/// Result type alias for Matrikel operations
///
/// # Examples
///
/// ```
/// use matrikel::domain::result::Result;
/// use matrikel::domain::errors::MatrikelError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(MatrikelError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, MatrikelError>;
