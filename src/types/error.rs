//! Unified Error Type System
//!
//! Centralized error types for the whole crate.
//! LLM transport failures carry a category used by the provider chain
//! to decide between retrying, falling back and giving up.
//!
//! ## Error Families
//!
//! - **Parse**: the LLM response lacked a structural marker (never retried)
//! - **Persistence**: checkpoint or chapter file I/O
//! - **Structural**: invariant violations on novel records
//! - **Resume**: any failure while continuing a checkpointed run
//! - **LLM**: transport, rate limit and timeout failures

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Categories for LLM failures, used for retry and fallback routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry same provider
    RateLimit,
    /// Authentication failed - never retry
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Provider unavailable - fall back to next
    Unavailable,
    /// Invalid request - don't retry
    BadRequest,
    /// Temporary server issues - retry same provider
    Transient,
    /// Unknown error
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is retryable on the same provider
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Transient)
    }

    /// Check if this category should trigger fallback to the next provider
    pub fn should_fallback(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Auth | Self::RateLimit)
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// LLM error with category and provider context
#[derive(Debug, Clone)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
    pub provider: Option<String>,
    /// Suggested wait time before retry (if the provider told us)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
            retry_after: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
            retry_after: None,
        }
    }

    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    pub fn should_fallback(&self) -> bool {
        self.category.should_fallback()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps raw provider failures onto an [`ErrorCategory`]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30));
        }

        if lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
        {
            return LlmError::with_provider(ErrorCategory::Auth, message, provider);
        }

        if lower.contains("connection")
            || lower.contains("connect")
            || lower.contains("dns")
            || lower.contains("timed out")
            || lower.contains("timeout")
        {
            return LlmError::with_provider(ErrorCategory::Network, message, provider);
        }

        if lower.contains("500")
            || lower.contains("502")
            || lower.contains("503")
            || lower.contains("504")
            || lower.contains("overloaded")
            || lower.contains("temporar")
        {
            return LlmError::with_provider(ErrorCategory::Transient, message, provider);
        }

        if lower.contains("404") || lower.contains("not found") {
            return LlmError::with_provider(ErrorCategory::Unavailable, message, provider);
        }

        if lower.contains("400") || lower.contains("bad request") {
            return LlmError::with_provider(ErrorCategory::BadRequest, message, provider);
        }

        LlmError::with_provider(ErrorCategory::Unknown, message, provider)
    }

    /// Classify an HTTP status code directly
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        match status {
            429 => LlmError::with_provider(ErrorCategory::RateLimit, message, provider)
                .retry_after(Duration::from_secs(30)),
            401 | 403 => LlmError::with_provider(ErrorCategory::Auth, message, provider),
            400 | 422 => LlmError::with_provider(ErrorCategory::BadRequest, message, provider),
            404 => LlmError::with_provider(ErrorCategory::Unavailable, message, provider),
            500..=599 => LlmError::with_provider(ErrorCategory::Transient, message, provider),
            _ => LlmError::with_provider(ErrorCategory::Unknown, message, provider),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum NovelError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // LLM Errors
    // -------------------------------------------------------------------------
    #[error("LLM error: {0}")]
    Llm(LlmError),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Parse Errors
    // -------------------------------------------------------------------------
    #[error("Required content '{tag}' not found in response")]
    MissingContent { tag: String },

    #[error("Failed to parse intent: {0}")]
    IntentParse(String),

    #[error("No chapter heading found in generated chapter")]
    ChapterTitleNotFound,

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Persistence error at {}: {message}", .path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("No checkpoint found for run {0}")]
    CheckpointNotFound(String),

    #[error("Checkpoint corrupted: {0}")]
    CheckpointCorrupted(String),

    #[error("Invalid run id '{0}': must be a single directory name")]
    InvalidRunId(String),

    // -------------------------------------------------------------------------
    // Structural Errors
    // -------------------------------------------------------------------------
    #[error("Invalid novel structure: {0}")]
    InvalidNovelStructure(String),

    #[error("Invalid chapter: {0}")]
    InvalidChapter(String),

    #[error("Outline field '{field}' is too short or empty")]
    InvalidOutline { field: String },

    #[error("Invalid cost amount: {0}")]
    InvalidCost(f64),

    // -------------------------------------------------------------------------
    // Resume Errors
    // -------------------------------------------------------------------------
    #[error("Resume of run {run_id} failed: {source}")]
    ResumeGeneration {
        run_id: String,
        #[source]
        source: Box<NovelError>,
    },
}

impl From<LlmError> for NovelError {
    fn from(err: LlmError) -> Self {
        NovelError::Llm(err)
    }
}

pub type Result<T> = std::result::Result<T, NovelError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl NovelError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn missing_content(tag: impl Into<String>) -> Self {
        Self::MissingContent { tag: tag.into() }
    }

    pub fn persistence(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn resume(run_id: impl Into<String>, source: NovelError) -> Self {
        // Already wrapped errors keep their original run id
        match source {
            wrapped @ Self::ResumeGeneration { .. } => wrapped,
            other => Self::ResumeGeneration {
                run_id: run_id.into(),
                source: Box::new(other),
            },
        }
    }

    /// Whether the LLM layer may retry the failed call
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Llm(e) => e.is_retryable(),
            Self::Timeout { .. } => true,
            Self::LlmApi(msg) => ErrorClassifier::classify(msg, "unknown").is_retryable(),
            _ => false,
        }
    }

    /// Whether the error is a parse failure of an LLM response
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::MissingContent { .. } | Self::IntentParse(_) | Self::ChapterTitleNotFound
        )
    }
}

/// Context extension trait for turning foreign errors into persistence errors
pub trait ResultExt<T> {
    fn persist_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn persist_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| NovelError::persistence(path, e))
    }
}

// =============================================================================
// Tests
// =============================================================================
