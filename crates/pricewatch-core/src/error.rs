use thiserror::Error;

/// Classification shown to operators when the marketplace serves an error page.
pub const BLOCKED_CLASSIFICATION: &str = "Blocked by marketplace";

/// Application-wide error types for pricewatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// A task lacks one of its identifying fields.
    #[error("Missing required task parameter: {0}")]
    MissingParameter(&'static str),

    /// The host landed on an error page instead of the product page.
    #[error("Extraction blocked: {0}")]
    ExtractionBlocked(String),

    /// Generic extraction rejection (element not found, script error, ...).
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Flush POST failed or returned a non-success status.
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// Target-list retrieval failed or returned something other than an array.
    #[error("Failed to fetch target list: {0}")]
    FetchListFailed(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Checkpoint or schedule persistence failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The engine cannot perform the request in its current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if the host reported an error-page condition.
    ///
    /// Browser hosts surface this only through their message text, so the
    /// substring check stays alongside the dedicated variant.
    pub fn is_blocked(&self) -> bool {
        match self {
            AppError::ExtractionBlocked(_) => true,
            other => other.to_string().contains("error page"),
        }
    }

    /// User-facing message for a failed extraction.
    pub fn classify(&self) -> String {
        if self.is_blocked() {
            BLOCKED_CLASSIFICATION.to_string()
        } else {
            self.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_classification() {
        assert!(AppError::ExtractionBlocked("403".into()).is_blocked());
        assert!(
            AppError::ExtractionFailed("Frame with ID 0 is showing error page".into())
                .is_blocked()
        );
        assert_eq!(
            AppError::ExtractionBlocked("403".into()).classify(),
            BLOCKED_CLASSIFICATION
        );
    }

    #[test]
    fn test_generic_errors_pass_through() {
        let err = AppError::ExtractionFailed("price container not found".into());
        assert!(!err.is_blocked());
        assert_eq!(err.classify(), "Extraction failed: price container not found");
        assert!(!AppError::MissingParameter("productId").is_blocked());
    }
}
