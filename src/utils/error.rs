use crate::core::correlation::CorrelationId;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemoError {
    /// URL 已移除，避免 query 中的 token 外洩
    #[error("HTTP request failed: {0}")]
    HttpError(reqwest::Error),

    #[error("{service} returned HTTP {status}: {message}")]
    UpstreamError {
        service: String,
        status: u16,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Service '{service}' is not configured")]
    ServiceNotConfigured { service: String },

    #[error("{operation} did not complete after {attempts} attempts")]
    PollTimeout { operation: String, attempts: u32 },

    #[error("{operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },

    #[error("Command '{command}' failed: {message}")]
    CommandError { command: String, message: String },
}

pub type Result<T> = std::result::Result<T, DemoError>;

impl From<reqwest::Error> for DemoError {
    fn from(error: reqwest::Error) -> Self {
        DemoError::HttpError(error.without_url())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Upstream,
    Timeout,
    Configuration,
    Client,
    Storage,
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

impl DemoError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        DemoError::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_configured(service: impl Into<String>) -> Self {
        DemoError::ServiceNotConfigured {
            service: service.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DemoError::HttpError(e) if e.is_timeout() => ErrorCategory::Timeout,
            DemoError::HttpError(_) => ErrorCategory::Network,
            DemoError::UpstreamError { .. } | DemoError::OperationFailed { .. } => {
                ErrorCategory::Upstream
            }
            DemoError::PollTimeout { .. } => ErrorCategory::Timeout,
            DemoError::ConfigValidationError { .. }
            | DemoError::InvalidConfigValueError { .. }
            | DemoError::ServiceNotConfigured { .. } => ErrorCategory::Configuration,
            DemoError::BadRequest { .. } | DemoError::NotFound { .. } => ErrorCategory::Client,
            DemoError::IoError(_) => ErrorCategory::Storage,
            DemoError::SerializationError(_)
            | DemoError::ZipError(_)
            | DemoError::CsvError(_) => ErrorCategory::Data,
            DemoError::CommandError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Client => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Upstream | ErrorCategory::Timeout => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Data | ErrorCategory::Storage => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            DemoError::HttpError(_) => {
                "Check network connectivity and that the service endpoint is reachable".to_string()
            }
            DemoError::UpstreamError { service, status, .. } if *status == 401 || *status == 403 => {
                format!("Verify the API key configured for {}", service)
            }
            DemoError::UpstreamError { service, .. } => {
                format!("Inspect the {} request payload and retry", service)
            }
            DemoError::PollTimeout { .. } => {
                "Increase the poll interval or attempt ceiling, or retry later".to_string()
            }
            DemoError::OperationFailed { .. } => {
                "Check that the submitted input is supported by the service".to_string()
            }
            DemoError::ServiceNotConfigured { service } => format!(
                "Set the endpoint and key for '{}' via environment variables or the TOML config",
                service
            ),
            DemoError::ConfigValidationError { .. } | DemoError::InvalidConfigValueError { .. } => {
                "Review the configuration file and environment variables".to_string()
            }
            DemoError::BadRequest { .. } => "Fix the request body and try again".to_string(),
            DemoError::NotFound { .. } => "Check the identifier and try again".to_string(),
            DemoError::IoError(_) => "Check file permissions and available disk space".to_string(),
            DemoError::CommandError { .. } => {
                "Make sure the required system utilities are installed".to_string()
            }
            DemoError::SerializationError(_)
            | DemoError::ZipError(_)
            | DemoError::CsvError(_) => {
                "The response could not be processed; retry or report the payload".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Timeout => format!("The operation timed out: {}", self),
            ErrorCategory::Network => "Could not reach the cloud service".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DemoError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            DemoError::NotFound { .. } => StatusCode::NOT_FOUND,
            DemoError::ServiceNotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
            DemoError::HttpError(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            DemoError::PollTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            DemoError::HttpError(_)
            | DemoError::UpstreamError { .. }
            | DemoError::OperationFailed { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 回應給客戶端的訊息，內部錯誤不外洩細節
    pub fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn with_correlation(self, correlation_id: &CorrelationId) -> ApiError {
        ApiError {
            error: self,
            correlation_id: Some(correlation_id.clone()),
        }
    }
}

/// HTTP 層錯誤：附帶 correlation id 的 DemoError
#[derive(Debug)]
pub struct ApiError {
    pub error: DemoError,
    pub correlation_id: Option<CorrelationId>,
}

impl From<DemoError> for ApiError {
    fn from(error: DemoError) -> Self {
        Self {
            error,
            correlation_id: None,
        }
    }
}

pub trait ResultExt<T> {
    fn with_correlation(self, correlation_id: &CorrelationId) -> std::result::Result<T, ApiError>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_correlation(self, correlation_id: &CorrelationId) -> std::result::Result<T, ApiError> {
        self.map_err(|e| e.with_correlation(correlation_id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let correlation = self
            .correlation_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default();

        match self.error.severity() {
            ErrorSeverity::Low => {
                tracing::debug!(correlation_id = %correlation, "Client error: {}", self.error)
            }
            ErrorSeverity::Medium => {
                tracing::warn!(correlation_id = %correlation, "⚠️ Upstream error: {}", self.error)
            }
            ErrorSeverity::High | ErrorSeverity::Critical => tracing::error!(
                correlation_id = %correlation,
                "❌ Internal error: {} ({:?})",
                self.error,
                self.error.category()
            ),
        }

        let status = self.error.status_code();
        let body = json!({
            "error": self.error.client_message(),
            "correlation_id": self.correlation_id,
        });
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for DemoError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
