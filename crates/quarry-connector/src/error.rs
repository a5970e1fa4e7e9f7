//! Connector framework error types.
//!
//! One error enum covers the whole engine so that failures can be classified
//! at phase boundaries without downcasting.

use thiserror::Error;

/// Error that can occur during sync or provisioning operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Configuration is missing or invalid (missing mapping, unknown
    /// resource type, missing list/map, bad credential options).
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A templated query could not be rewritten (unknown key, unknown
    /// option, malformed token).
    #[error("template error: {message}")]
    Template { message: String },

    /// An expression failed to compile or evaluate.
    #[error("expression error: {message}")]
    Expression { message: String },

    /// The database driver reported a failure (connection, query
    /// execution, transaction control).
    #[error("database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An engine invariant was violated: the pagination primary key was
    /// absent from a result row, a provisioning statement affected more
    /// than one row, or an unknown pagination strategy was configured.
    #[error("invariant violation: {message}")]
    InvariantViolation { message: String },

    /// A page token could not be decoded or belongs to a different query.
    #[error("invalid page token: {message}")]
    InvalidPageToken { message: String },

    /// No account provisioning is configured. Often treated as "feature
    /// absent" rather than a hard failure.
    #[error("no account provisioning defined")]
    NotDefined,
}

impl ConnectorError {
    /// Get an error code for classification in logs and telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::Configuration { .. } => "CONFIGURATION_ERROR",
            ConnectorError::Template { .. } => "TEMPLATE_ERROR",
            ConnectorError::Expression { .. } => "EXPRESSION_ERROR",
            ConnectorError::Database { .. } => "DATABASE_ERROR",
            ConnectorError::InvariantViolation { .. } => "INVARIANT_VIOLATION",
            ConnectorError::InvalidPageToken { .. } => "INVALID_PAGE_TOKEN",
            ConnectorError::NotDefined => "NOT_DEFINED",
        }
    }

    /// Whether this error means the feature is absent rather than broken.
    pub fn is_not_defined(&self) -> bool {
        matches!(self, ConnectorError::NotDefined)
    }

    // Convenience constructors

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        ConnectorError::Configuration {
            message: message.into(),
        }
    }

    /// Create a template error.
    pub fn template(message: impl Into<String>) -> Self {
        ConnectorError::Template {
            message: message.into(),
        }
    }

    /// Create an expression error.
    pub fn expression(message: impl Into<String>) -> Self {
        ConnectorError::Expression {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        ConnectorError::Database {
            message: message.into(),
            source: None,
        }
    }

    /// Create a database error with an underlying driver error.
    pub fn database_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::Database {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        ConnectorError::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create an invalid page token error.
    pub fn invalid_page_token(message: impl Into<String>) -> Self {
        ConnectorError::InvalidPageToken {
            message: message.into(),
        }
    }
}

impl From<quarry_expr::ExprError> for ConnectorError {
    fn from(err: quarry_expr::ExprError) -> Self {
        ConnectorError::Expression {
            message: err.to_string(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ConnectorError::configuration("x").error_code(),
            "CONFIGURATION_ERROR"
        );
        assert_eq!(ConnectorError::template("x").error_code(), "TEMPLATE_ERROR");
        assert_eq!(ConnectorError::NotDefined.error_code(), "NOT_DEFINED");
    }

    #[test]
    fn test_error_display() {
        let err = ConnectorError::invariant("query affected more than one row");
        assert_eq!(
            err.to_string(),
            "invariant violation: query affected more than one row"
        );
    }

    #[test]
    fn test_not_defined_classification() {
        assert!(ConnectorError::NotDefined.is_not_defined());
        assert!(!ConnectorError::database("boom").is_not_defined());
    }

    #[test]
    fn test_database_error_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = ConnectorError::database_with_source("query failed", io);
        if let ConnectorError::Database { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("expected Database variant");
        }
    }
}
