use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Catalog error in {source_name}: {message}")]
    CatalogError {
        source_name: String,
        message: String,
    },

    #[error("Runtime error: {message}")]
    RuntimeError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RegistrarError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RegistrarError::ConfigValidationError { .. }
            | RegistrarError::InvalidConfigValueError { .. }
            | RegistrarError::MissingConfigError { .. } => ErrorCategory::Configuration,
            RegistrarError::SerializationError(_) | RegistrarError::CatalogError { .. } => {
                ErrorCategory::Data
            }
            RegistrarError::IoError(_) | RegistrarError::RuntimeError { .. } => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RegistrarError::IoError(_) => "Check that the referenced files exist and are readable",
            RegistrarError::SerializationError(_) => "Check that the JSON input is well formed",
            RegistrarError::ConfigValidationError { .. }
            | RegistrarError::InvalidConfigValueError { .. } => {
                "Fix the reported configuration value and retry"
            }
            RegistrarError::MissingConfigError { .. } => {
                "Add the missing key to the configuration file"
            }
            RegistrarError::CatalogError { .. } => {
                "Check the course, student and statute data files"
            }
            RegistrarError::RuntimeError { .. } => "Restart the registrar and retry the request",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Data => format!("Could not read registrar data: {}", self),
            ErrorCategory::System => format!("The registrar failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistrarError>;
