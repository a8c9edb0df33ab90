use thiserror::Error;

/// Top-level error type for the similar-words engine.
///
/// Variants fall into three groups: precondition violations (caller bugs,
/// never retried), collaborator failures (embedding provider or vector
/// repository, carrying the step that failed), and ambient failures from
/// configuration, I/O, and serialization.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimWordsError {
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Embedding error ({context}): {message}")]
    Embedding { context: String, message: String },

    #[error("Repository error ({context}): {message}")]
    Repository { context: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of a [`SimWordsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed input that can never succeed.
    Precondition,
    /// An external collaborator (embedding provider, repository) failed.
    Collaborator,
    Config,
    Io,
    Serialization,
}

impl SimWordsError {
    /// Build an embedding-provider error for the named step.
    pub fn embedding(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SimWordsError::Embedding {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Build a repository error for the named step.
    pub fn repository(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SimWordsError::Repository {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SimWordsError::Precondition(_)
            | SimWordsError::DimensionMismatch { .. }
            | SimWordsError::InvalidArgument(_) => ErrorKind::Precondition,
            SimWordsError::Embedding { .. } | SimWordsError::Repository { .. } => {
                ErrorKind::Collaborator
            }
            SimWordsError::Config(_) => ErrorKind::Config,
            SimWordsError::Io(_) => ErrorKind::Io,
            SimWordsError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether resubmitting the whole run or query could succeed.
    ///
    /// Only collaborator failures qualify. The engine itself never retries.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Collaborator
    }

    /// Prefix the collaborator context with an outer step name.
    ///
    /// Other variants are returned unchanged.
    pub fn within(self, step: &str) -> Self {
        match self {
            SimWordsError::Embedding { context, message } => SimWordsError::Embedding {
                context: format!("{}: {}", step, context),
                message,
            },
            SimWordsError::Repository { context, message } => SimWordsError::Repository {
                context: format!("{}: {}", step, context),
                message,
            },
            other => other,
        }
    }
}

impl From<toml::de::Error> for SimWordsError {
    fn from(err: toml::de::Error) -> Self {
        SimWordsError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SimWordsError {
    fn from(err: toml::ser::Error) -> Self {
        SimWordsError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SimWordsError {
    fn from(err: serde_json::Error) -> Self {
        SimWordsError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for similar-words operations.
pub type Result<T> = std::result::Result<T, SimWordsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimWordsError::DimensionMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 3, got 2");
    }

    #[test]
    fn test_collaborator_display_includes_context() {
        let err = SimWordsError::repository("load words of cluster 7", "disk full");
        assert_eq!(
            err.to_string(),
            "Repository error (load words of cluster 7): disk full"
        );
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            SimWordsError::Precondition("empty".into()).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            SimWordsError::InvalidArgument("k".into()).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            SimWordsError::embedding("embed query", "timeout").kind(),
            ErrorKind::Collaborator
        );
        assert_eq!(SimWordsError::Config("x".into()).kind(), ErrorKind::Config);
    }

    #[test]
    fn test_only_collaborator_errors_are_retryable() {
        assert!(SimWordsError::embedding("embed batch 0", "refused").is_retryable());
        assert!(SimWordsError::repository("save words", "locked").is_retryable());
        assert!(!SimWordsError::Precondition("k > n".into()).is_retryable());
        assert!(!SimWordsError::Config("bad".into()).is_retryable());
    }

    #[test]
    fn test_within_prefixes_context() {
        let err = SimWordsError::repository("load words of cluster 1", "gone").within("top clusters");
        match err {
            SimWordsError::Repository { context, .. } => {
                assert_eq!(context, "top clusters: load words of cluster 1");
            }
            other => panic!("Expected Repository variant, got {:?}", other),
        }

        let untouched = SimWordsError::Precondition("p".into()).within("top clusters");
        assert!(matches!(untouched, SimWordsError::Precondition(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SimWordsError = io_err.into();
        assert!(matches!(err, SimWordsError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: SimWordsError = err.unwrap_err().into();
        assert!(matches!(err, SimWordsError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: SimWordsError = err.unwrap_err().into();
        assert!(matches!(err, SimWordsError::Serialization(_)));
    }
}
