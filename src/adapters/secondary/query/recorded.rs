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

//! Query executor replaying recorded results

use crate::domain::ruleengine::{Query, Row};
use crate::domain::QueryError;
use crate::ports::QueryExecutor;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Serves rows from a `{ "<queryName>": [[...row...], ...] }` document
///
/// Used for offline evaluation. A query with no recording fails the same
/// way an unreachable database would.
#[derive(Debug, Default, Clone)]
pub struct RecordedQueryExecutor {
    results: HashMap<String, Vec<Row>>,
}

impl RecordedQueryExecutor {
    pub fn new(results: HashMap<String, Vec<Row>>) -> Self {
        Self { results }
    }

    /// Parse a JSON recording
    ///
    /// `null` cells become NULL values; numbers and booleans are kept as
    /// their JSON text, the way hdbsql would print them.
    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        let recorded: HashMap<String, Vec<Vec<Option<Value>>>> =
            serde_json::from_str(json).map_err(|e| invalid_recording(e.to_string()))?;

        let mut results = HashMap::with_capacity(recorded.len());
        for (query, rows) in recorded {
            let rows = rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|cell| cell.map(|value| cell_text(&query, value)).transpose())
                        .collect::<Result<Row, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            results.insert(query, rows);
        }
        Ok(Self::new(results))
    }

    /// Load a JSON recording from disk
    pub async fn from_file(path: &Path) -> Result<Self, QueryError> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            invalid_recording(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

fn invalid_recording(message: String) -> QueryError {
    QueryError::InvalidOutput {
        query: "<recording>".to_string(),
        message,
    }
}

fn cell_text(query: &str, value: Value) -> Result<String, QueryError> {
    match value {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(QueryError::InvalidOutput {
            query: query.to_string(),
            message: format!("cell must be a scalar, got {other}"),
        }),
    }
}

#[async_trait]
impl QueryExecutor for RecordedQueryExecutor {
    async fn execute(&self, query: &Query) -> Result<Vec<Row>, QueryError> {
        self.results
            .get(&query.name)
            .cloned()
            .ok_or_else(|| QueryError::Failed {
                query: query.name.clone(),
                message: "no recorded result".to_string(),
            })
    }

    async fn get_missing_dependencies(&self) -> Result<Vec<String>, QueryError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(name: &str) -> Query {
        Query {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_replays_recorded_rows() {
        let executor = RecordedQueryExecutor::from_json(
            r#"{"q_savepoint": [["persistence", "300"], ["system", null]]}"#,
        )
        .unwrap();

        let rows = executor.execute(&query("q_savepoint")).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![Some("system".to_string()), None]);

        let missing = executor.execute(&query("q_other")).await;
        assert!(matches!(missing, Err(QueryError::Failed { .. })));
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, r#"{"q": [["1"]]}"#).unwrap();

        let executor = RecordedQueryExecutor::from_file(&path).await.unwrap();
        assert_eq!(executor.execute(&query("q")).await.unwrap().len(), 1);

        let err = RecordedQueryExecutor::from_file(&dir.path().join("absent.json")).await;
        assert!(matches!(err, Err(QueryError::InvalidOutput { .. })));
    }

    #[tokio::test]
    async fn test_scalar_cells_become_text() {
        let executor = RecordedQueryExecutor::from_json(
            r#"{"q_volumes": [[1, 2.5, true, "hana01", null]]}"#,
        )
        .unwrap();

        let rows = executor.execute(&query("q_volumes")).await.unwrap();
        assert_eq!(
            rows[0],
            vec![
                Some("1".to_string()),
                Some("2.5".to_string()),
                Some("true".to_string()),
                Some("hana01".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_rejects_nested_cells() {
        let err = RecordedQueryExecutor::from_json(r#"{"q": [[[1, 2]]]}"#).unwrap_err();
        assert!(matches!(err, QueryError::InvalidOutput { ref query, .. } if query == "q"));
        assert!(RecordedQueryExecutor::from_json(r#"{"q": [[{"a": 1}]]}"#).is_err());
        assert!(RecordedQueryExecutor::from_json(r#"{"q": "rows"}"#).is_err());
    }
}
