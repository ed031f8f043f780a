use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

/// Why the SSRF guard refused a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsrfRejection {
    InvalidUrl(String),
    SchemeNotAllowed(String),
    EmptyHost,
    HostNotAllowlisted(String),
    Localhost,
    PrivateAddress(IpAddr),
}

impl fmt::Display for SsrfRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SsrfRejection::InvalidUrl(e) => write!(f, "invalid URL: {}", e),
            SsrfRejection::SchemeNotAllowed(s) => write!(f, "scheme '{}' is not allowed", s),
            SsrfRejection::EmptyHost => write!(f, "URL has no host"),
            SsrfRejection::HostNotAllowlisted(h) => {
                write!(f, "host '{}' is not on the allowlist", h)
            }
            SsrfRejection::Localhost => write!(f, "localhost is not allowed"),
            SsrfRejection::PrivateAddress(ip) => {
                write!(f, "address {} is in a blocked range", ip)
            }
        }
    }
}

/// One problem reported by the template engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateIssue {
    pub part: String,
    pub offset: usize,
    pub kind: String,
}

impl fmt::Display for TemplateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.kind, self.part, self.offset)
    }
}

#[derive(Error, Debug)]
pub enum DocError {
    #[error("Invalid input: {message}")]
    InputError { message: String },

    #[error("Upload too large: {size} bytes exceeds limit of {limit} bytes")]
    UploadTooLarge { size: usize, limit: usize },

    #[error("Image URL rejected: {reason}")]
    SsrfRejected { reason: SsrfRejection },

    #[error("Image download failed: {message}")]
    FetchError { message: String },

    #[error("Image placeholder not found: no picture with alt text '{marker}'")]
    PlaceholderNotFound { marker: String },

    #[error("Template rendering failed: {message}")]
    TemplateRenderError {
        message: String,
        details: Vec<TemplateIssue>,
    },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("PDF operation failed: {0}")]
    PdfError(#[from] lopdf::Error),

    #[error("Image decoding failed: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Security,
    Network,
    Document,
    Template,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DocError {
    pub fn input(message: impl Into<String>) -> Self {
        DocError::InputError {
            message: message.into(),
        }
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        DocError::FetchError {
            message: message.into(),
        }
    }

    /// HTTP-class outcome a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            DocError::InputError { .. } | DocError::SsrfRejected { .. } => 400,
            DocError::UploadTooLarge { .. } => 413,
            DocError::PlaceholderNotFound { .. }
            | DocError::TemplateRenderError { .. }
            | DocError::ImageError(_) => 422,
            DocError::FetchError { .. } => 502,
            _ => 500,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DocError::InputError { .. } | DocError::UploadTooLarge { .. } => ErrorCategory::Input,
            DocError::SsrfRejected { .. } => ErrorCategory::Security,
            DocError::FetchError { .. } => ErrorCategory::Network,
            DocError::PlaceholderNotFound { .. }
            | DocError::ZipError(_)
            | DocError::PdfError(_)
            | DocError::ImageError(_) => ErrorCategory::Document,
            DocError::TemplateRenderError { .. } => ErrorCategory::Template,
            DocError::ConfigError { .. }
            | DocError::InvalidConfigValueError { .. }
            | DocError::MissingConfigError { .. } => ErrorCategory::Configuration,
            DocError::IoError(_) | DocError::SerializationError(_) => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Input
            | ErrorCategory::Security
            | ErrorCategory::Document
            | ErrorCategory::Template => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            DocError::InputError { .. } => {
                "Check that every required file and field is present and well-formed".to_string()
            }
            DocError::UploadTooLarge { limit, .. } => {
                format!("Send a document smaller than {} bytes", limit)
            }
            DocError::SsrfRejected { .. } => {
                "Use a public http(s) URL whose host is permitted by the service".to_string()
            }
            DocError::FetchError { .. } => {
                "Verify the image URL is reachable, answers with 2xx and is within the size limit"
                    .to_string()
            }
            DocError::PlaceholderNotFound { marker } => format!(
                "Insert a picture in the document and set its alt text (description or title) to '{}'",
                marker
            ),
            DocError::TemplateRenderError { .. } => {
                "Fix the reported template tags; every '{{' needs a matching '}}'".to_string()
            }
            DocError::ZipError(_) => "Make sure the upload is a valid DOCX file".to_string(),
            DocError::PdfError(_) => "Make sure the upload is a valid PDF file".to_string(),
            DocError::ImageError(_) => "Use a PNG or JPEG image".to_string(),
            DocError::ConfigError { .. }
            | DocError::InvalidConfigValueError { .. }
            | DocError::MissingConfigError { .. } => {
                "Review the configuration file and DOCSTAMP_* environment variables".to_string()
            }
            DocError::IoError(_) | DocError::SerializationError(_) => {
                "Retry the request; if it persists, check the service logs".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DocError::TemplateRenderError { message, details } if !details.is_empty() => {
                let listed: Vec<String> = details.iter().map(|d| d.to_string()).collect();
                format!("{} ({})", message, listed.join("; "))
            }
            DocError::IoError(_) | DocError::SerializationError(_) => {
                "Internal error while processing the document".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DocError>;
