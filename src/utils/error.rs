use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid description for {context}: {reason}")]
    InvalidDescription { context: String, reason: String },

    #[error("Selector synthesis failed for '{selector}': {message}")]
    SelectorSynthesis { selector: String, message: String },

    #[error("Reference child is not contained by any parent match: {reference}")]
    ContainmentViolation { reference: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Operation cancelled")]
    Cancelled,
}

// Implement conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

impl AppError {
    pub fn invalid_description(context: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::InvalidDescription {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Cancellation is the only failure that aborts a run; everything else degrades to fewer results.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
