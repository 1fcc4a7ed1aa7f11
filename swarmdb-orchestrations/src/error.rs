//! Error taxonomy for the orchestration engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// A required parameter is missing or malformed
    #[error("validation error: {0}")]
    Validation(String),

    /// Not enough capacity: workers, ports, clusters
    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    /// The remote command failed to run or exited unsuccessfully
    #[error("command `{command}` failed: {message}")]
    Execution { command: String, message: String },

    /// The remote command ran but its output could not be parsed
    #[error("command `{command}` returned malformed output: {message}")]
    OutputParse { command: String, message: String },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("dns error: {0}")]
    Dns(String),

    /// Error returned by the database server for an admin command
    #[error("database command failed{}: {message}", code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Database { code: Option<i32>, message: String },

    #[error("render error: {0}")]
    Render(String),
}

impl OrchestrationError {
    pub fn execution(command: impl ToString, message: impl ToString) -> Self {
        OrchestrationError::Execution {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    pub fn output_parse(command: impl ToString, message: impl ToString) -> Self {
        OrchestrationError::OutputParse {
            command: command.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether the remote side reported the target resource as absent
    pub fn is_not_found(&self) -> bool {
        match self {
            OrchestrationError::NotFound(_) => true,
            OrchestrationError::Execution { message, .. } => {
                let message = message.to_lowercase();
                message.contains("not found")
                    || message.contains("no such")
                    || message.contains("nothing found in stack")
                    || message.contains("does not exist")
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for OrchestrationError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => OrchestrationError::NotFound("row not found".to_string()),
            other => OrchestrationError::Persistence(other.to_string()),
        }
    }
}

impl From<tera::Error> for OrchestrationError {
    fn from(err: tera::Error) -> Self {
        OrchestrationError::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_keeps_command() {
        let err = OrchestrationError::execution("docker stack rm db1", "exit status 1");
        assert_eq!(err.to_string(), "command `docker stack rm db1` failed: exit status 1");
    }

    #[test]
    fn test_not_found_classification() {
        let missing = OrchestrationError::execution("docker secret rm x", "Error: No such secret: x");
        assert!(missing.is_not_found());

        let empty_stack = OrchestrationError::execution("docker stack rm x", "Nothing found in stack: x");
        assert!(empty_stack.is_not_found());

        let denied = OrchestrationError::execution("docker secret rm x", "permission denied");
        assert!(!denied.is_not_found());
    }

    #[test]
    fn test_database_error_display() {
        let err = OrchestrationError::Database {
            code: Some(23),
            message: "already initialized".to_string(),
        };
        assert_eq!(err.to_string(), "database command failed (code 23): already initialized");
    }
}
