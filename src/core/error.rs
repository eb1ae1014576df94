//! Error types for semfold
//!
//! Per-concern error enums nested under a single `EngineError`, with a
//! recovery trait that tells the pipeline how to degrade: skip the file,
//! fall back to the next provider, or retry.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for the reorganization engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Embedding error: {0}")]
    Embed(#[from] EmbedError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("File system error: {0}")]
    FileSystem(#[from] FileSystemError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Content-extraction errors
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Unsupported file type: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Read failed for {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Parse failed for {path}: {reason}")]
    ParseFailed { path: String, reason: String },
}

/// Embedding/naming provider errors
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Provider {provider} returned a malformed response: {reason}")]
    ResponseParseFailed { provider: String, reason: String },

    #[error("All embedding providers failed")]
    AllProvidersFailed,
}

/// File system errors raised by the synchronizer and scanners
#[derive(Error, Debug)]
pub enum FileSystemError {
    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Move failed {from} -> {to}: {reason}")]
    MoveFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Directory creation failed for {path}: {reason}")]
    CreateDirFailed { path: String, reason: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config load failed: {reason}")]
    LoadFailed { reason: String },

    #[error("Invalid config value: {field} = {value}")]
    InvalidValue { field: String, value: String },
}

/// How the caller should react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation later
    Retry,
    /// Skip this item and continue with the batch
    Skip,
    /// Fall back to the next strategy in the chain
    Fallback,
    /// Abort the current operation
    Abort,
}

/// Recovery classification for engine errors
pub trait Recovery {
    /// Whether retrying the same operation can succeed
    fn is_retryable(&self) -> bool;

    /// Suggested reaction for the pipeline
    fn recovery_action(&self) -> RecoveryAction;
}

impl Recovery for ExtractError {
    fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::ReadFailed { .. })
    }

    fn recovery_action(&self) -> RecoveryAction {
        match self {
            ExtractError::FileNotFound { .. } => RecoveryAction::Skip,
            ExtractError::UnsupportedFormat { .. } => RecoveryAction::Skip,
            ExtractError::ReadFailed { .. } => RecoveryAction::Retry,
            ExtractError::ParseFailed { .. } => RecoveryAction::Skip,
        }
    }
}

impl Recovery for EmbedError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbedError::RequestFailed { .. } | EmbedError::Timeout { .. }
        )
    }

    fn recovery_action(&self) -> RecoveryAction {
        match self {
            EmbedError::RequestFailed { .. } => RecoveryAction::Fallback,
            EmbedError::Timeout { .. } => RecoveryAction::Fallback,
            EmbedError::ResponseParseFailed { .. } => RecoveryAction::Fallback,
            EmbedError::AllProvidersFailed => RecoveryAction::Skip,
        }
    }
}

impl Recovery for FileSystemError {
    fn is_retryable(&self) -> bool {
        matches!(self, FileSystemError::MoveFailed { .. })
    }

    fn recovery_action(&self) -> RecoveryAction {
        match self {
            FileSystemError::PathNotFound { .. } => RecoveryAction::Skip,
            FileSystemError::PermissionDenied { .. } => RecoveryAction::Skip,
            FileSystemError::MoveFailed { .. } => RecoveryAction::Skip,
            FileSystemError::CreateDirFailed { .. } => RecoveryAction::Abort,
        }
    }
}

impl Recovery for EngineError {
    fn is_retryable(&self) -> bool {
        match self {
            EngineError::Extract(e) => e.is_retryable(),
            EngineError::Embed(e) => e.is_retryable(),
            EngineError::Database(_) => true,
            EngineError::FileSystem(e) => e.is_retryable(),
            EngineError::Config(_) => false,
            EngineError::Io(_) => true,
            EngineError::Watcher(_) => false,
            EngineError::Internal(_) => false,
        }
    }

    fn recovery_action(&self) -> RecoveryAction {
        match self {
            EngineError::Extract(e) => e.recovery_action(),
            EngineError::Embed(e) => e.recovery_action(),
            EngineError::Database(_) => RecoveryAction::Retry,
            EngineError::FileSystem(e) => e.recovery_action(),
            EngineError::Config(_) => RecoveryAction::Abort,
            EngineError::Io(_) => RecoveryAction::Retry,
            EngineError::Watcher(_) => RecoveryAction::Abort,
            EngineError::Internal(_) => RecoveryAction::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_recovery() {
        let err = ExtractError::FileNotFound {
            path: "/missing.pdf".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.recovery_action(), RecoveryAction::Skip);

        let err = ExtractError::ReadFailed {
            path: "/locked.pdf".to_string(),
            reason: "temporary lock".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.recovery_action(), RecoveryAction::Retry);
    }

    #[test]
    fn test_embed_error_falls_back() {
        let err = EmbedError::Timeout {
            provider: "ollama".to_string(),
            timeout_ms: 5000,
        };
        assert!(err.is_retryable());
        assert_eq!(err.recovery_action(), RecoveryAction::Fallback);

        // Chain exhaustion skips the file rather than aborting the batch
        let err = EmbedError::AllProvidersFailed;
        assert!(!err.is_retryable());
        assert_eq!(err.recovery_action(), RecoveryAction::Skip);
    }

    #[test]
    fn test_move_failure_does_not_abort_batch() {
        let err = FileSystemError::MoveFailed {
            from: "/a/x.txt".to_string(),
            to: "/b/x.txt".to_string(),
            reason: "disk full".to_string(),
        };
        assert_eq!(err.recovery_action(), RecoveryAction::Skip);
    }

    #[test]
    fn test_engine_error_conversion() {
        let err: EngineError = ExtractError::UnsupportedFormat {
            extension: "xyz".to_string(),
        }
        .into();
        assert_eq!(err.recovery_action(), RecoveryAction::Skip);
        assert!(err.to_string().contains("xyz"));
    }
}
