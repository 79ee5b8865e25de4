/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use thiserror::Error;

/// Rule engine errors
///
/// None of these cross the evaluator boundary as a failure: evaluation
/// degrades them to `false` and, in strict mode, reports them as diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsightError {
    /// A `size(...)` lookup referenced a key absent from the knowledge base
    #[error("knowledge base key not found: {key}")]
    KeyNotFound { key: String },
    /// An operand could not be parsed as a float for an ordering comparison
    #[error("operand '{operand}' is not numeric")]
    ParseFailure { operand: String },
    /// A node carries an operation outside the defined set
    #[error("unrecognized operation: {operation}")]
    UnrecognizedOperation { operation: String },
    /// A logical node has no children to combine
    #[error("{operation} node has no child evaluations")]
    EmptyLogicalNode { operation: String },
    /// A result row does not line up with the query's declared columns
    #[error("query '{query}' declares {expected} columns but row has {actual}")]
    ColumnCountMismatch {
        query: String,
        expected: usize,
        actual: usize,
    },
}

/// Rule definition errors (loading and validation)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// Rule has an empty identifier
    #[error("rule has an empty id")]
    MissingId,
    /// Two rules in one set share an identifier
    #[error("duplicate rule id: {0}")]
    DuplicateRule(String),
    /// Two recommendations in one rule share an identifier
    #[error("rule '{rule}': duplicate recommendation id '{recommendation}'")]
    DuplicateRecommendation { rule: String, recommendation: String },
    /// Query declared twice within one rule set
    #[error("rule '{rule}': duplicate query name '{query}'")]
    DuplicateQuery { rule: String, query: String },
    /// Trigger tree violates the node shape invariants
    #[error("rule '{rule}', recommendation '{recommendation}': {reason}")]
    InvalidNode {
        rule: String,
        recommendation: String,
        reason: String,
    },
    /// A `size(...)` reference names a key no query produces
    #[error("rule '{rule}', recommendation '{recommendation}': unknown key '{key}'")]
    UnknownKey {
        rule: String,
        recommendation: String,
        key: String,
    },
    /// Rule file could not be read
    #[error("failed to read rule file {path}: {message}")]
    Io { path: String, message: String },
    /// Rule file could not be decoded
    #[error("failed to parse rule file {path}: {message}")]
    Parse { path: String, message: String },
}

impl RuleError {
    /// Id of the rule the error belongs to, if it names one
    pub fn rule_id(&self) -> Option<&str> {
        match self {
            RuleError::DuplicateRule(rule)
            | RuleError::DuplicateRecommendation { rule, .. }
            | RuleError::DuplicateQuery { rule, .. }
            | RuleError::InvalidNode { rule, .. }
            | RuleError::UnknownKey { rule, .. } => Some(rule.as_str()),
            RuleError::MissingId | RuleError::Io { .. } | RuleError::Parse { .. } => None,
        }
    }
}

/// Query execution errors
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The database client could not be run
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The database client ran but reported an error
    #[error("query '{query}' failed: {message}")]
    Failed { query: String, message: String },
    /// Output could not be turned into rows
    #[error("query '{query}' returned unparsable output: {message}")]
    InvalidOutput { query: String, message: String },
    /// Connection settings are incomplete
    #[error("invalid connection settings: {0}")]
    InvalidConnection(String),
}

/// Domain-level errors that don't expose infrastructure details
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    /// Knowledge base collection failed
    #[error("Knowledge base collection failed: {0}")]
    CollectionFailed(String),
    /// Database unavailable
    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),
    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Required system dependencies missing
    #[error("Missing required dependencies: {}", .0.join(", "))]
    MissingDependencies(Vec<String>),
    /// Insufficient privileges
    #[error("Insufficient privileges: {0}")]
    InsufficientPrivileges(String),
    /// Data parsing failed
    #[error("Data parsing failed: {0}")]
    ParsingFailed(String),
    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Errors specific to the insights service
#[derive(Debug, Clone, Error)]
pub enum ReportError {
    /// Domain operation failed
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Rule set could not be loaded
    #[error("Rule loading failed: {0}")]
    Rules(#[from] RuleError),
}

/// Errors specific to publishing insights
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    /// Domain operation failed
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Network/HTTP operation failed
    #[error("Network operation failed: {0}")]
    NetworkFailed(String),
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    /// Serialization failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
    /// Local file operation failed
    #[error("File operation failed: {0}")]
    FileFailed(String),
}

/// System-level errors for adapters (not exposed to domain)
#[derive(Debug, Clone, Error)]
pub enum SystemError {
    /// Command execution failed
    #[error("Command '{command}' failed{}", describe_failure(*.exit_code, .stderr))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    /// Command not found
    #[error("Command not found: {0}")]
    CommandNotFound(String),
    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Timeout
    #[error("Timeout: {0}")]
    Timeout(String),
}

fn describe_failure(exit_code: Option<i32>, stderr: &str) -> String {
    let mut detail = String::new();
    if let Some(code) = exit_code {
        detail.push_str(&format!(" with exit code {code}"));
    }
    if !stderr.is_empty() {
        detail.push_str(&format!(": {stderr}"));
    }
    detail
}

/// Convert system errors to domain errors (with context loss for abstraction)
impl From<SystemError> for DomainError {
    fn from(err: SystemError) -> Self {
        match err {
            SystemError::CommandFailed { command, .. } => {
                DomainError::CollectionFailed(format!("System command failed: {command}"))
            }
            SystemError::CommandNotFound(cmd) => DomainError::MissingDependencies(vec![cmd]),
            SystemError::PermissionDenied(_) => {
                DomainError::InsufficientPrivileges("System access denied".to_string())
            }
            SystemError::Timeout(msg) => DomainError::Timeout(msg),
        }
    }
}

/// Command execution errors
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// System error occurred
    #[error(transparent)]
    System(#[from] SystemError),
    /// Command execution failed
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),
    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl From<CommandError> for DomainError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::System(sys_err) => sys_err.into(),
            CommandError::ExecutionFailed(msg) => {
                DomainError::DatabaseUnavailable(format!("Command execution failed: {msg}"))
            }
            CommandError::InvalidArguments(msg) => {
                DomainError::InvalidConfiguration(format!("Invalid command arguments: {msg}"))
            }
        }
    }
}

impl From<QueryError> for DomainError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Command(cmd_err) => cmd_err.into(),
            QueryError::Failed { query, message } => {
                DomainError::CollectionFailed(format!("query '{query}': {message}"))
            }
            QueryError::InvalidOutput { query, message } => {
                DomainError::ParsingFailed(format!("query '{query}': {message}"))
            }
            QueryError::InvalidConnection(msg) => DomainError::InvalidConfiguration(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display() {
        let err = SystemError::CommandFailed {
            command: "hdbsql".to_string(),
            exit_code: Some(2),
            stderr: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Command 'hdbsql' failed with exit code 2: connection refused"
        );

        let bare = SystemError::CommandFailed {
            command: "hdbsql".to_string(),
            exit_code: None,
            stderr: String::new(),
        };
        assert_eq!(bare.to_string(), "Command 'hdbsql' failed");
    }

    #[test]
    fn test_query_error_to_domain() {
        let err: DomainError = QueryError::Command(CommandError::System(
            SystemError::CommandNotFound("hdbsql".to_string()),
        ))
        .into();
        assert!(matches!(err, DomainError::MissingDependencies(ref deps) if deps == &["hdbsql"]));
    }

    #[test]
    fn test_column_mismatch_message() {
        let err = InsightError::ColumnCountMismatch {
            query: "q_version".to_string(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "query 'q_version' declares 2 columns but row has 1"
        );
    }
}
