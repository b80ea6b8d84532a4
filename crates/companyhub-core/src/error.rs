use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid company name: {0}")]
    InvalidCompanyName(String),

    #[error("Invalid company id: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error("Invalid log cursor: {0}")]
    InvalidCursor(String),

    #[error("Unknown mutation action: {0}")]
    UnknownAction(String),

    #[error("Malformed event payload: {0}")]
    MalformedEvent(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    pub fn invalid_company_name(message: impl Into<String>) -> Self {
        Self::InvalidCompanyName(message.into())
    }

    pub fn invalid_cursor(raw: impl Into<String>) -> Self {
        Self::InvalidCursor(raw.into())
    }

    pub fn malformed_event(message: impl Into<String>) -> Self {
        Self::MalformedEvent(message.into())
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCompanyName(_) | Self::InvalidId(_) | Self::JsonError(_)
        )
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidCompanyName(_) | Self::InvalidId(_) => ErrorCategory::Validation,
            Self::InvalidCursor(_) | Self::UnknownAction(_) | Self::MalformedEvent(_) => {
                ErrorCategory::Event
            }
            Self::JsonError(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Event,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Event => write!(f, "event"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
