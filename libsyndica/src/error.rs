//! Error types for Syndica

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyndicaError>;

/// The store's status disjunction limit. Allow-lists longer than this are
/// rejected before any query is issued.
pub const MAX_STATUS_FILTERS: usize = 10;

#[derive(Error, Debug)]
pub enum SyndicaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyndicaError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SyndicaError::InvalidInput(_) => 3,
            SyndicaError::Platform(PlatformError::AuthExpired(_)) => 2,
            SyndicaError::Platform(_) => 1,
            SyndicaError::Config(_) => 1,
            SyndicaError::Store(_) => 1,
            SyndicaError::Query(_) => 1,
            SyndicaError::Resolution(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Document encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Selection-time failure, fatal to the publish cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Too many statuses for the store's in-query ({count}, max {MAX_STATUS_FILTERS})")]
    TooManyStatuses { count: usize },

    #[error("Empty status allow-list")]
    EmptyStatusList,
}

/// Hydration-time failure. Aborts that post only; sibling posts proceed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Malformed storage reference: {0}")]
    MalformedRef(String),

    #[error("Media item has no storage reference or URL (post {0})")]
    MissingSource(String),

    #[error("Failed to sign read URL for {object}: {reason}")]
    Signing { object: String, reason: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    /// Token exchange or refresh failed. The account link must be
    /// re-established; never retried inline.
    #[error("Authorization expired: {0}")]
    AuthExpired(String),

    #[error("Network error: {0}")]
    Network(String),

    /// Readiness polling exhausted its attempt budget.
    #[error("Readiness polling timed out after {attempts} attempts: {last}")]
    Timeout { attempts: u32, last: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = SyndicaError::InvalidInput("empty allow-list".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_auth_expired() {
        let error = SyndicaError::Platform(PlatformError::AuthExpired(
            "refresh token rejected".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_platform_errors() {
        let network = SyndicaError::Platform(PlatformError::Network("connection refused".into()));
        assert_eq!(network.exit_code(), 1);

        let timeout = SyndicaError::Platform(PlatformError::Timeout {
            attempts: 20,
            last: "still processing".into(),
        });
        assert_eq!(timeout.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_query_and_resolution() {
        let query = SyndicaError::Query(QueryError::TooManyStatuses { count: 11 });
        assert_eq!(query.exit_code(), 1);

        let resolution = SyndicaError::Resolution(ResolutionError::MalformedRef(
            "gs://missing-object-path".into(),
        ));
        assert_eq!(resolution.exit_code(), 1);
    }

    #[test]
    fn test_query_error_formatting_names_limit() {
        let error = QueryError::TooManyStatuses { count: 11 };
        let message = format!("{}", error);
        assert!(message.contains("11"));
        assert!(message.contains("10"));
    }

    #[test]
    fn test_timeout_formatting_includes_last_diagnostic() {
        let error = PlatformError::Timeout {
            attempts: 5,
            last: "status_code=IN_PROGRESS".into(),
        };
        let message = format!("{}", error);
        assert!(message.contains("5 attempts"));
        assert!(message.contains("IN_PROGRESS"));
    }

    #[test]
    fn test_error_conversion_from_query_error() {
        let error: SyndicaError = QueryError::EmptyStatusList.into();
        assert!(matches!(error, SyndicaError::Query(_)));
    }

    #[test]
    fn test_error_conversion_from_resolution_error() {
        let error: SyndicaError = ResolutionError::MissingSource("post-1".into()).into();
        assert!(matches!(error, SyndicaError::Resolution(_)));
    }
}
