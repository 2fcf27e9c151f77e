//! Error types for the schema-sync library.

use thiserror::Error;

/// Main error type for schema management operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, unknown cluster, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query error
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A declaration or seed file could not be parsed
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// A catalog read failed for one table
    #[error("Reflection failed for table {table}: {message}")]
    Reflection { table: String, message: String },

    /// A single statement failed during apply
    #[error("Statement failed on {table}: {message}\n  SQL: {sql}")]
    Statement {
        table: String,
        sql: String,
        message: String,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (declined confirmation, SIGINT, etc.)
    #[error("Cancelled")]
    Cancelled,
}

impl SyncError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        SyncError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Parse error for a declaration or seed file
    pub fn parse(file: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Parse {
            file: file.into(),
            message: message.to_string(),
        }
    }

    /// Create a Reflection error for one table
    pub fn reflection(table: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Reflection {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for this error kind.
    ///
    /// Configuration problems exit with 2 so scripts can tell them apart
    /// from statement failures (1).
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Yaml(_) => 2,
            SyncError::Cancelled => 130,
            _ => 1,
        }
    }
}

/// Result type alias for schema management operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_carries_context() {
        let err = SyncError::pool("timed out", "getting connection for list_tables");
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("list_tables"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SyncError::Config("x".into()).exit_code(), 2);
        assert_eq!(SyncError::Cancelled.exit_code(), 130);
        assert_eq!(
            SyncError::parse("schema/users.yml", "bad indent").exit_code(),
            1
        );
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = SyncError::reflection("users", "connection reset");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Reflection failed for table users"));
    }
}
