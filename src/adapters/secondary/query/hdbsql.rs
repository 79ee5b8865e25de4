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

//! HANA query adapter built on the `hdbsql` command line client

use crate::domain::parsers::{parse_hdbsql_error, parse_hdbsql_output};
use crate::domain::ruleengine::{Query, Row};
use crate::domain::{CommandError, HanaConnection, QueryError, SystemError};
use crate::ports::{CommandExecutor, QueryExecutor, SystemCommand};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Runs queries through `hdbsql` in batch mode
pub struct HdbsqlQueryExecutor {
    connection: HanaConnection,
    command_executor: Arc<dyn CommandExecutor>,
    timeout: Duration,
}

impl HdbsqlQueryExecutor {
    /// Create a new hdbsql query executor
    ///
    /// # Arguments
    /// * `connection` - Host, credentials and client path
    /// * `command_executor` - Runs the client process
    /// * `timeout` - Per-query timeout
    pub fn new(
        connection: HanaConnection,
        command_executor: Arc<dyn CommandExecutor>,
        timeout: Duration,
    ) -> Self {
        Self {
            connection,
            command_executor,
            timeout,
        }
    }

    /// Build the client invocation for `query`
    ///
    /// A userstore key takes precedence over user/password.
    pub fn build_command(&self, query: &Query) -> Result<SystemCommand, QueryError> {
        let conn = &self.connection;
        let mut cmd = SystemCommand::new(&conn.hdbsql_path)
            .args(&["-n", &format!("{}:{}", conn.host, conn.port)])
            .timeout(self.timeout);

        if let Some(database) = conn.database.as_deref().filter(|db| !db.is_empty()) {
            cmd = cmd.args(&["-d", database]);
        }

        match (&conn.userstore_key, &conn.user) {
            (Some(key), _) if !key.is_empty() => {
                cmd = cmd.args(&["-U", key]);
            }
            (_, Some(user)) if !user.is_empty() => {
                let password = self.password()?;
                cmd = cmd.args(&["-u", user, "-p"]).secret_arg(&password);
            }
            _ => {
                return Err(QueryError::InvalidConnection(
                    "either userstore_key or user must be set".to_string(),
                ))
            }
        }

        Ok(cmd.args(&["-j", "-a", "-x", &query.sql]))
    }

    fn password(&self) -> Result<String, QueryError> {
        let var = self.connection.password_env.as_deref().ok_or_else(|| {
            QueryError::InvalidConnection("password_env must be set with user".to_string())
        })?;
        std::env::var(var).map_err(|_| {
            QueryError::InvalidConnection(format!("environment variable {var} is not set"))
        })
    }
}

#[async_trait]
impl QueryExecutor for HdbsqlQueryExecutor {
    async fn execute(&self, query: &Query) -> Result<Vec<Row>, QueryError> {
        if query.sql.trim().is_empty() {
            return Err(CommandError::InvalidArguments(format!(
                "query '{}' has no SQL",
                query.name
            ))
            .into());
        }
        let cmd = self.build_command(query)?;
        let output = self.command_executor.execute(&cmd).await?;

        if !output.success {
            let message = parse_hdbsql_error(&output.stderr)
                .or_else(|| parse_hdbsql_error(&output.stdout))
                .map(|(code, text)| format!("SQL error {code}: {text}"))
                .unwrap_or_else(|| {
                    SystemError::CommandFailed {
                        command: self.connection.hdbsql_path.clone(),
                        exit_code: output.exit_code,
                        stderr: output.stderr.trim().to_string(),
                    }
                    .to_string()
                });
            return Err(QueryError::Failed {
                query: query.name.clone(),
                message,
            });
        }

        let rows = parse_hdbsql_output(&output.stdout).map_err(|message| {
            QueryError::InvalidOutput {
                query: query.name.clone(),
                message,
            }
        })?;
        debug!("Query {} returned {} rows", query.name, rows.len());
        Ok(rows)
    }

    async fn get_missing_dependencies(&self) -> Result<Vec<String>, QueryError> {
        let mut missing = Vec::new();
        if !self
            .command_executor
            .is_command_available(&self.connection.hdbsql_path)
            .await?
        {
            missing.push(self.connection.hdbsql_path.clone());
        }
        if let Err(QueryError::InvalidConnection(reason)) = self.build_command(&Query::default())
        {
            missing.push(format!("HANA credentials ({reason})"));
        }
        Ok(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::CommandOutput;
    use std::sync::Mutex;

    struct MockCommandExecutor {
        output: CommandOutput,
        available: bool,
        commands: Mutex<Vec<SystemCommand>>,
    }

    impl MockCommandExecutor {
        fn new(stdout: &str, stderr: &str, exit_code: i32) -> Self {
            Self {
                output: CommandOutput {
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                    exit_code: Some(exit_code),
                    success: exit_code == 0,
                },
                available: true,
                commands: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandExecutor for MockCommandExecutor {
        async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
            self.commands.lock().unwrap().push(command.clone());
            Ok(self.output.clone())
        }

        async fn is_command_available(&self, _command_name: &str) -> Result<bool, CommandError> {
            Ok(self.available)
        }
    }

    fn query() -> Query {
        Query {
            name: "q_log_mode".to_string(),
            sql: "SELECT LAYER_NAME, VALUE FROM M_INIFILE_CONTENTS".to_string(),
            columns: vec!["LAYER_NAME".to_string(), "VALUE".to_string()],
        }
    }

    fn userstore_connection() -> HanaConnection {
        HanaConnection {
            host: "hana01".to_string(),
            port: 30013,
            database: Some("SYSTEMDB".to_string()),
            userstore_key: Some("INSIGHTS".to_string()),
            ..Default::default()
        }
    }

    fn executor(
        connection: HanaConnection,
        mock: Arc<MockCommandExecutor>,
    ) -> HdbsqlQueryExecutor {
        HdbsqlQueryExecutor::new(connection, mock, Duration::from_secs(10))
    }

    #[test]
    fn test_build_command_with_userstore_key() {
        let mock = Arc::new(MockCommandExecutor::new("", "", 0));
        let cmd = executor(userstore_connection(), mock)
            .build_command(&query())
            .unwrap();

        assert_eq!(cmd.program, "hdbsql");
        assert_eq!(
            cmd.args,
            vec![
                "-n",
                "hana01:30013",
                "-d",
                "SYSTEMDB",
                "-U",
                "INSIGHTS",
                "-j",
                "-a",
                "-x",
                "SELECT LAYER_NAME, VALUE FROM M_INIFILE_CONTENTS"
            ]
        );
        assert_eq!(cmd.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_build_command_masks_password() {
        std::env::set_var("SAPAGENT_TEST_HANA_PASSWORD", "Manager1");
        let connection = HanaConnection {
            user: Some("MONITOR".to_string()),
            password_env: Some("SAPAGENT_TEST_HANA_PASSWORD".to_string()),
            ..Default::default()
        };
        let mock = Arc::new(MockCommandExecutor::new("", "", 0));
        let cmd = executor(connection, mock).build_command(&query()).unwrap();

        assert!(cmd.args.contains(&"Manager1".to_string()));
        assert!(!cmd.display().contains("Manager1"));
        assert!(cmd.display().contains("-u MONITOR -p ********"));
    }

    #[test]
    fn test_build_command_requires_credentials() {
        let mock = Arc::new(MockCommandExecutor::new("", "", 0));
        let result = executor(HanaConnection::default(), mock.clone()).build_command(&query());
        assert!(matches!(result, Err(QueryError::InvalidConnection(_))));

        let connection = HanaConnection {
            user: Some("MONITOR".to_string()),
            password_env: Some("SAPAGENT_TEST_UNSET_PASSWORD".to_string()),
            ..Default::default()
        };
        let result = executor(connection, mock).build_command(&query());
        assert!(matches!(result, Err(QueryError::InvalidConnection(_))));
    }

    #[tokio::test]
    async fn test_execute_parses_rows() {
        let mock = Arc::new(MockCommandExecutor::new(
            "\"persistence\",\"overwrite\"\n\"system\",?\n",
            "",
            0,
        ));
        let rows = executor(userstore_connection(), mock.clone())
            .execute(&query())
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                vec![Some("persistence".to_string()), Some("overwrite".to_string())],
                vec![Some("system".to_string()), None],
            ]
        );
        assert_eq!(mock.commands.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_reports_sql_error() {
        let mock = Arc::new(MockCommandExecutor::new(
            "",
            "* 259: invalid table name:  Could not find table/view M_INIFILE_CONTENT\n",
            3,
        ));
        let err = executor(userstore_connection(), mock)
            .execute(&query())
            .await
            .unwrap_err();

        match err {
            QueryError::Failed { query, message } => {
                assert_eq!(query, "q_log_mode");
                assert!(message.starts_with("SQL error 259: invalid table name"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_reports_client_failure() {
        let mock = Arc::new(MockCommandExecutor::new("", "connection refused\n", 10));
        let err = executor(userstore_connection(), mock)
            .execute(&query())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "query 'q_log_mode' failed: Command 'hdbsql' failed with exit code 10: connection refused"
        );
    }

    #[tokio::test]
    async fn test_execute_rejects_empty_sql() {
        let mock = Arc::new(MockCommandExecutor::new("", "", 0));
        let result = executor(userstore_connection(), mock.clone())
            .execute(&Query::default())
            .await;
        assert!(matches!(
            result,
            Err(QueryError::Command(CommandError::InvalidArguments(_)))
        ));
        assert!(mock.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_dependencies() {
        let mut mock = MockCommandExecutor::new("", "", 0);
        mock.available = false;
        let missing = executor(HanaConnection::default(), Arc::new(mock))
            .get_missing_dependencies()
            .await
            .unwrap();

        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0], "hdbsql");
        assert!(missing[1].starts_with("HANA credentials"));

        let ready = executor(
            userstore_connection(),
            Arc::new(MockCommandExecutor::new("", "", 0)),
        )
        .get_missing_dependencies()
        .await
        .unwrap();
        assert!(ready.is_empty());
    }
}
