use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Archive operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration field '{field}' is invalid: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field '{field}'")]
    MissingConfigError { field: String },

    #[error("Invalid record in {table} at row {row}: {reason}")]
    InvalidRecordError {
        table: String,
        row: u64,
        reason: String,
    },

    #[error("Catalog source '{endpoint}' is unavailable: {reason}")]
    SourceUnavailableError { endpoint: String, reason: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Storage,
    Configuration,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// CLI 退出碼
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl AnalyticsError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalyticsError::ApiError(_) | AnalyticsError::SourceUnavailableError { .. } => {
                ErrorCategory::Network
            }
            AnalyticsError::CsvError(_)
            | AnalyticsError::SerializationError(_)
            | AnalyticsError::InvalidRecordError { .. } => ErrorCategory::Data,
            AnalyticsError::IoError(_) | AnalyticsError::ZipError(_) => ErrorCategory::Storage,
            AnalyticsError::ConfigError { .. }
            | AnalyticsError::ConfigValidationError { .. }
            | AnalyticsError::InvalidConfigValueError { .. }
            | AnalyticsError::MissingConfigError { .. } => ErrorCategory::Configuration,
            AnalyticsError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 網路問題通常可重試
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Network
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            AnalyticsError::ApiError(_) | AnalyticsError::SourceUnavailableError { .. } => {
                "Check that the catalog endpoint is reachable, or pass --fallback-to-sample"
                    .to_string()
            }
            AnalyticsError::CsvError(_) => {
                "Check that the catalog CSV files have the expected header row".to_string()
            }
            AnalyticsError::InvalidRecordError { table, .. } => format!(
                "Fix the offending row in {} or rerun without --strict to skip invalid rows",
                table
            ),
            AnalyticsError::SerializationError(_) => {
                "The catalog feed did not match the expected JSON layout".to_string()
            }
            AnalyticsError::IoError(_) => {
                "Check that the data and output directories exist and are writable".to_string()
            }
            AnalyticsError::ZipError(_) => {
                "Check free disk space, or disable compression for this run".to_string()
            }
            AnalyticsError::ConfigError { .. }
            | AnalyticsError::ConfigValidationError { .. }
            | AnalyticsError::InvalidConfigValueError { .. } => {
                "Review the configuration values and run with --help for the accepted options"
                    .to_string()
            }
            AnalyticsError::MissingConfigError { field } => {
                format!("Provide a value for '{}'", field)
            }
            AnalyticsError::ProcessingError { .. } => {
                "Rerun with --verbose to see which step failed".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not load the catalog: {}", self),
            ErrorCategory::Data => format!("The catalog data could not be read: {}", self),
            ErrorCategory::Storage => format!("Could not read or write files: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Processing => format!("Report generation failed: {}", self),
        }
    }
}

impl From<toml::de::Error> for AnalyticsError {
    fn from(e: toml::de::Error) -> Self {
        AnalyticsError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
