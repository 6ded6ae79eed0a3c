//! Error types for strand operations.
//!
//! Every failure the core can produce is a local, caller-recoverable condition.
//! Errors carry a stable [`ErrorCode`] for programmatic handling and, where it
//! helps, a suggestion for resolving the problem.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for strand operations.
pub type StrandResult<T> = Result<T, StrandError>;

/// Main error type for all strand operations.
#[derive(Error, Debug)]
pub enum StrandError {
    /// Quality rating outside the 0-5 scale.
    #[error("Invalid quality {value}: quality must be an integer in 0..=5")]
    InvalidQuality { value: i64 },

    /// Target retention outside the open interval (0, 1).
    #[error("Invalid retention target {value}: must lie strictly between 0 and 1")]
    InvalidRetentionTarget { value: f64 },

    /// Update referenced an item the store does not know.
    #[error("Item not found: {item_id}")]
    ItemNotFound { item_id: String },

    /// Session id has no persisted record.
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// The atomic multi-write for one exercise failed and was rolled back.
    #[error("Storage transaction failed: {message}")]
    StorageTransactionFailed {
        message: String,
        /// Another writer changed the item between read and commit.
        conflict: bool,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database operation failed outside a review transaction.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Scheduling inputs (QUAL_xxx, RET_xxx)
    QualOutOfRange,
    RetOutOfRange,

    // Validation (VAL_xxx)
    ValInvalidInput,

    // Lookups (ITEM_xxx, SESS_xxx)
    ItemNotFound,
    SessNotFound,

    // Storage (DB_xxx, TXN_xxx)
    DbOperationFailed,
    TxnFailed,
    TxnConflict,

    // Configuration
    CfgInvalid,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::QualOutOfRange => "QUAL_001",
            ErrorCode::RetOutOfRange => "RET_001",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ItemNotFound => "ITEM_001",
            ErrorCode::SessNotFound => "SESS_001",
            ErrorCode::DbOperationFailed => "DB_001",
            ErrorCode::TxnFailed => "TXN_001",
            ErrorCode::TxnConflict => "TXN_002",
            ErrorCode::CfgInvalid => "CFG_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl StrandError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error with suggestion.
    pub fn validation_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create an item-not-found error.
    pub fn item_not_found(item_id: impl Into<String>) -> Self {
        Self::ItemNotFound {
            item_id: item_id.into(),
        }
    }

    /// Create a session-not-found error.
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Create a transaction failure without an underlying source.
    pub fn storage_transaction(message: impl Into<String>) -> Self {
        Self::StorageTransactionFailed {
            message: message.into(),
            conflict: false,
            source: None,
        }
    }

    /// Create the error for a commit whose item changed since it was read.
    pub fn transaction_conflict(item_id: &str) -> Self {
        Self::StorageTransactionFailed {
            message: format!("item '{}' changed since it was read", item_id),
            conflict: true,
            source: None,
        }
    }

    /// Wrap any error raised inside a review transaction.
    pub fn transaction_from<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StorageTransactionFailed {
            message: err.to_string(),
            conflict: false,
            source: Some(Box::new(err)),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidQuality { .. } => ErrorCode::QualOutOfRange,
            Self::InvalidRetentionTarget { .. } => ErrorCode::RetOutOfRange,
            Self::ItemNotFound { .. } => ErrorCode::ItemNotFound,
            Self::SessionNotFound { .. } => ErrorCode::SessNotFound,
            Self::StorageTransactionFailed { conflict: true, .. } => ErrorCode::TxnConflict,
            Self::StorageTransactionFailed { .. } => ErrorCode::TxnFailed,
            Self::Validation { code, .. } => *code,
            Self::Configuration(_) => ErrorCode::CfgInvalid,
            Self::Database { .. } => ErrorCode::DbOperationFailed,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::InvalidQuality { .. } => Some("Grade the exercise on the 0-5 scale"),
            Self::InvalidRetentionTarget { .. } => {
                Some("Use a target retention such as 0.9 (strictly between 0 and 1)")
            }
            Self::ItemNotFound { .. } => Some("Create the item first or enable auto-creation"),
            Self::SessionNotFound { .. } => Some("Start a session before recording exercises"),
            Self::StorageTransactionFailed { .. } => {
                Some("No changes were applied; retry the exercise")
            }
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }

    /// Whether this error was caused by a concurrent write to the same item.
    pub fn is_conflict(&self) -> bool {
        self.code() == ErrorCode::TxnConflict
    }
}

impl From<rusqlite::Error> for StrandError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
