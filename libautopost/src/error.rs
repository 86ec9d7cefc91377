//! Error types for Autopost
//!
//! Every failure is classified into an [`ErrorKind`] so that a transport can
//! decide between a structured user-facing error and an opaque internal one
//! without inspecting messages.

use thiserror::Error;

use crate::types::SocialNetworkName;

pub type Result<T> = std::result::Result<T, AutopostError>;

/// Closed set of error classes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyExists,
    Validation,
    NotFound,
    Internal,
    Cancelled,
}

impl ErrorKind {
    /// Whether the error message is meant to be shown to the operator as-is
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ErrorKind::Internal)
    }
}

#[derive(Error, Debug)]
pub enum AutopostError {
    #[error("{0}")]
    AccountAlreadyExists(String),

    #[error("{message}")]
    PageAlreadyExists { message: String, page_id: i64 },

    #[error("Error: {message}, Field: {field}, Rule: {rule}")]
    Validation {
        message: String,
        field: String,
        rule: String,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{network} {operation} failed: {source}")]
    Provider {
        network: SocialNetworkName,
        operation: &'static str,
        #[source]
        source: ClientError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl AutopostError {
    pub fn validation(
        message: impl Into<String>,
        field: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        AutopostError::Validation {
            message: message.into(),
            field: field.into(),
            rule: rule.into(),
        }
    }

    /// Build a mapper that wraps a client failure with provider and operation context
    ///
    /// ```
    /// use libautopost::error::{AutopostError, ClientError, ErrorKind};
    /// use libautopost::types::SocialNetworkName;
    ///
    /// let err = Err::<(), _>(ClientError::MissingParam("code".to_string()))
    ///     .map_err(AutopostError::provider(SocialNetworkName::Vk, "get access token"))
    ///     .unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::Internal);
    /// ```
    pub fn provider(
        network: SocialNetworkName,
        operation: &'static str,
    ) -> impl FnOnce(ClientError) -> AutopostError {
        move |source| AutopostError::Provider {
            network,
            operation,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AutopostError::AccountAlreadyExists(_) | AutopostError::PageAlreadyExists { .. } => {
                ErrorKind::AlreadyExists
            }
            AutopostError::Validation { .. } => ErrorKind::Validation,
            AutopostError::NotFound(_) => ErrorKind::NotFound,
            AutopostError::Provider {
                source: ClientError::Cancelled { .. },
                ..
            } => ErrorKind::Cancelled,
            AutopostError::Internal(_)
            | AutopostError::Provider { .. }
            | AutopostError::Config(_)
            | AutopostError::Database(_) => ErrorKind::Internal,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind() == ErrorKind::AlreadyExists
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    /// Returns the process exit code the CLI uses for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Internal => 1,
            ErrorKind::Validation => 3,
            ErrorKind::AlreadyExists => 4,
            ErrorKind::NotFound => 5,
            ErrorKind::Cancelled => 6,
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

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to encode or decode column {column}: {source}")]
    Column {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
}

/// Failure of a single provider API interaction
///
/// Endpoints never include the query string, so tokens and client secrets
/// passed as query parameters do not leak into error messages.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("cannot parse {network} credentials: {message}")]
    Credentials {
        network: SocialNetworkName,
        message: String,
    },

    #[error("missing callback parameter '{0}'")]
    MissingParam(String),

    #[error("cannot build request url: {0}")]
    InvalidUrl(String),

    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("request to {endpoint} was cancelled: {message}")]
    Cancelled { endpoint: String, message: String },

    #[error("{endpoint} responded with status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("cannot decode response from {endpoint}: {message}; body: {body}")]
    Decode {
        endpoint: String,
        message: String,
        body: String,
    },

    #[error("{endpoint} returned error {code}: {message}")]
    Api {
        endpoint: String,
        code: i64,
        message: String,
    },

    #[error("{0} is not implemented")]
    NotImplemented(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error() -> ClientError {
        ClientError::Status {
            endpoint: "https://oauth.vk.com/access_token".to_string(),
            status: 401,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        }
    }

    #[test]
    fn test_kind_already_exists() {
        let account = AutopostError::AccountAlreadyExists("exists".to_string());
        let page = AutopostError::PageAlreadyExists {
            message: "page exists".to_string(),
            page_id: 7,
        };
        assert_eq!(account.kind(), ErrorKind::AlreadyExists);
        assert_eq!(page.kind(), ErrorKind::AlreadyExists);
        assert!(account.is_already_exists());
    }

    #[test]
    fn test_kind_provider_is_internal() {
        let err = AutopostError::Provider {
            network: SocialNetworkName::Vk,
            operation: "get access token",
            source: status_error(),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.is_internal());
        assert!(!err.kind().is_user_facing());
    }

    #[test]
    fn test_kind_cancelled_is_distinct() {
        let err = AutopostError::Provider {
            network: SocialNetworkName::Odnoklassniki,
            operation: "get account pages",
            source: ClientError::Cancelled {
                endpoint: "https://api.ok.ru/api/group/getUserGroupsV2".to_string(),
                message: "operation timed out".to_string(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(!err.is_internal());
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_validation_message_formatting() {
        let err = AutopostError::validation(
            "social network XX is not valid",
            "socialNetworkName",
            "oneof",
        );
        assert_eq!(
            err.to_string(),
            "Error: social network XX is not valid, Field: socialNetworkName, Rule: oneof"
        );
        assert!(err.is_validation());
        assert!(err.kind().is_user_facing());
    }

    #[test]
    fn test_provider_error_keeps_status_and_body() {
        let err = AutopostError::Provider {
            network: SocialNetworkName::Vk,
            operation: "get access token",
            source: status_error(),
        };
        let message = err.to_string();
        assert!(message.contains("VK get access token failed"));
        assert!(message.contains("401"));
        assert!(message.contains("invalid_grant"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AutopostError::Internal("boom".to_string()).exit_code(), 1);
        assert_eq!(AutopostError::validation("bad", "f", "r").exit_code(), 3);
        assert_eq!(
            AutopostError::AccountAlreadyExists("dup".to_string()).exit_code(),
            4
        );
        assert_eq!(AutopostError::NotFound("missing".to_string()).exit_code(), 5);
    }

    #[test]
    fn test_error_conversion_from_config_error() {
        let config_error = ConfigError::MissingField("database.path".to_string());
        let err: AutopostError = config_error.into();

        match err {
            AutopostError::Config(_) => {}
            _ => panic!("Expected AutopostError::Config"),
        }
    }

    #[test]
    fn test_error_conversion_from_db_error() {
        let db_error = DbError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));
        let err: AutopostError = db_error.into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().starts_with("Database error"));
    }

    #[test]
    fn test_client_error_clone() {
        let original = status_error();
        let cloned = original.clone();
        assert_eq!(original.to_string(), cloned.to_string());
    }
}
