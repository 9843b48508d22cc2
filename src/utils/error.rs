use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmissionError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Integrity violation: {message}")]
    IntegrityError { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Integrity,
    Lookup,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EmissionError {
    pub fn validation(message: impl Into<String>) -> Self {
        EmissionError::ValidationError {
            message: message.into(),
        }
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        EmissionError::IntegrityError {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: u64) -> Self {
        EmissionError::NotFound { entity, id }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EmissionError::ValidationError { .. } => ErrorCategory::Input,
            EmissionError::IntegrityError { .. } => ErrorCategory::Integrity,
            EmissionError::NotFound { .. } => ErrorCategory::Lookup,
            EmissionError::ConfigError { .. }
            | EmissionError::ConfigValidationError { .. }
            | EmissionError::InvalidConfigValueError { .. }
            | EmissionError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EmissionError::IoError(_)
            | EmissionError::SerializationError(_)
            | EmissionError::CsvError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Lookup => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Integrity => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 給終端使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            EmissionError::ValidationError { message } => format!("Rejected input: {}", message),
            EmissionError::IntegrityError { message } => format!("Rejected write: {}", message),
            EmissionError::NotFound { entity, id } => {
                format!("No {} with id {} in this scope", entity, id)
            }
            EmissionError::IoError(e) => format!("Could not access the data store: {}", e),
            EmissionError::SerializationError(_) => {
                "The snapshot file is not valid JSON".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => {
                "Check start years against existing modifications and the source acquisition year"
            }
            ErrorCategory::Integrity => {
                "Attach the source to an existing report or strategy and set acquisition_year with lifetime"
            }
            ErrorCategory::Lookup => "List the parent collection to find valid ids",
            ErrorCategory::Configuration => "Review the TOML configuration file and CLI flags",
            ErrorCategory::System => "Check file permissions and the snapshot path",
        }
    }
}

pub type Result<T> = std::result::Result<T, EmissionError>;
