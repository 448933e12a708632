use thiserror::Error;

#[derive(Error, Debug)]
pub enum MealError {
    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Upstream {service} failed: {message}")]
    UpstreamError { service: String, message: String },

    #[error("Email delivery failed: {message}")]
    DeliveryError { message: String },

    #[error("No meal count recorded for {date}")]
    NotFound { date: String },

    #[error("Credential error: {message}")]
    CredentialError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Storage,
    Delivery,
    NotFound,
    Authentication,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MealError {
    pub fn upstream(service: &str, message: impl Into<String>) -> Self {
        MealError::UpstreamError {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MealError::HttpError(_) | MealError::UpstreamError { .. } => ErrorCategory::Network,
            MealError::IoError(_) | MealError::SerializationError(_) => ErrorCategory::Storage,
            MealError::DeliveryError { .. } => ErrorCategory::Delivery,
            MealError::NotFound { .. } => ErrorCategory::NotFound,
            MealError::CredentialError { .. } => ErrorCategory::Authentication,
            MealError::ConfigError { .. }
            | MealError::MissingConfigError { .. }
            | MealError::InvalidConfigValueError { .. }
            | MealError::ConfigValidationError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::NotFound => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Delivery => ErrorSeverity::Medium,
            ErrorCategory::Storage | ErrorCategory::Authentication => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network access to the calendar and holiday APIs, then retry",
            ErrorCategory::Storage => "Check that the override data file is readable and contains a JSON object",
            ErrorCategory::Delivery => "Verify the sender account and recipients, then send the count manually",
            ErrorCategory::NotFound => "Save a count for that date first with `override set`",
            ErrorCategory::Authentication => "Refresh or re-issue the Google API credentials",
            ErrorCategory::Configuration => "Fix the configuration file and run again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MealError::NotFound { date } => format!("{}에 대한 식사 인원 정보가 없습니다.", date),
            MealError::DeliveryError { .. } => format!("이메일 전송 중 오류가 발생했습니다: {}", self),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MealError>;
