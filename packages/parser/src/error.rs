//! Error types for the parser.
//!
//! Structure recovery itself never fails: ambiguities are reported as
//! anomalies on the returned values. Errors only arise at the edges, when
//! reading input files or serializing reports.

use thiserror::Error;

/// Main error type for the parser library.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Input document contained no text at all.
    #[error("Input document is empty: {0}")]
    EmptyInput(String),

    /// Title list could not be interpreted.
    #[error("Invalid title list in {path}: {reason}")]
    InvalidTitles { path: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParserError::EmptyInput("bill.txt".to_string());
        assert_eq!(err.to_string(), "Input document is empty: bill.txt");
    }

    #[test]
    fn test_invalid_titles_display() {
        let err = ParserError::InvalidTitles {
            path: "titles.json".to_string(),
            reason: "expected an array".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid title list in titles.json: expected an array"
        );
    }
}
