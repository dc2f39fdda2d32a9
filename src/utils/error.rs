use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatusError { status: u16, url: String },

    #[error("Rate limited by {url}")]
    RateLimitedError { url: String },

    #[error("Timed out after {seconds}s: {what}")]
    TimeoutError { what: String, seconds: u64 },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Discovery failed at page {page} after {attempts} attempts: {message}")]
    DiscoveryError {
        page: u32,
        attempts: u32,
        message: String,
    },

    #[error("Unexpected payload from {context}: {message}")]
    SchemaError { context: String, message: String },

    #[error("Configuration field '{field}' failed validation: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Run cancelled before phase '{phase}'")]
    CancelledError { phase: String },
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Remote,
    Data,
    Storage,
    Configuration,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) | EtlError::TimeoutError { .. } => ErrorCategory::Network,
            EtlError::HttpStatusError { .. }
            | EtlError::RateLimitedError { .. }
            | EtlError::DiscoveryError { .. } => ErrorCategory::Remote,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::SchemaError { .. }
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::IoError(_) | EtlError::DatabaseError(_) => ErrorCategory::Storage,
            EtlError::ConfigValidationError { .. } | EtlError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            EtlError::CancelledError { .. } => ErrorCategory::Interrupted,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::CancelledError { .. } => ErrorSeverity::Low,
            EtlError::ApiError(_)
            | EtlError::HttpStatusError { .. }
            | EtlError::RateLimitedError { .. }
            | EtlError::TimeoutError { .. }
            | EtlError::DiscoveryError { .. } => ErrorSeverity::Medium,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::SchemaError { .. }
            | EtlError::ProcessingError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            EtlError::IoError(_) | EtlError::DatabaseError(_) => ErrorSeverity::Critical,
        }
    }

    /// 暫時性錯誤：限流、逾時、連線失敗與 5xx 可重試
    pub fn is_retryable(&self) -> bool {
        match self {
            EtlError::RateLimitedError { .. } | EtlError::TimeoutError { .. } => true,
            EtlError::HttpStatusError { status, .. } => *status >= 500,
            EtlError::ApiError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and re-run the failed stage",
            ErrorCategory::Remote => {
                "The remote API is unavailable or throttling; wait and re-run with --from-stage"
            }
            ErrorCategory::Data => {
                "The remote payload format may have changed; inspect the logged payload context"
            }
            ErrorCategory::Storage => "Check that the output directory and database are writable",
            ErrorCategory::Configuration => "Fix the configuration value and try again",
            ErrorCategory::Interrupted => "Re-run from the interrupted stage with --from-stage",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::DiscoveryError { page, .. } => {
                format!("Could not list competitions (stopped at page {})", page)
            }
            EtlError::SchemaError { context, .. } => {
                format!("The results API returned an unexpected format ({})", context)
            }
            EtlError::CancelledError { phase } => format!("Run cancelled before {}", phase),
            EtlError::DatabaseError(_) => "Writing the database failed".to_string(),
            other => other.to_string(),
        }
    }
}
