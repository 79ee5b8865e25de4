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

//! Knowledge base built from query result rows

use super::rules::Query;
use crate::domain::InsightError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One result row: a nullable string per declared column
pub type Row = Vec<Option<String>>;

/// Flat mapping from `"<query>:<column>"` to the values seen for that column
///
/// Values keep row order. Entries are only ever appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeBase {
    entries: BTreeMap<String, Vec<String>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composite key for a query column
    pub fn key(query_name: &str, column: &str) -> String {
        format!("{query_name}:{column}")
    }

    /// Values stored under `key`, if any row produced one
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn append(&mut self, key: String, value: String) {
        self.entries.entry(key).or_default().push(value);
    }
}

/// Ingest one result row of `query` into `kb`
///
/// Every set column value is appended under `"<query.name>:<column>"`; unset
/// (NULL) columns are skipped. A row whose length differs from the declared
/// column list is rejected before anything is written.
pub fn add_row(
    columns: &[Option<String>],
    query: &Query,
    kb: &mut KnowledgeBase,
) -> Result<(), InsightError> {
    if columns.len() != query.columns.len() {
        return Err(InsightError::ColumnCountMismatch {
            query: query.name.clone(),
            expected: query.columns.len(),
            actual: columns.len(),
        });
    }

    for (value, column) in columns.iter().zip(&query.columns) {
        if let Some(value) = value {
            kb.append(KnowledgeBase::key(&query.name, column), value.clone());
        }
    }
    Ok(())
}

/// Ingest every row of `query`
///
/// All rows are checked first, so a malformed row leaves `kb` untouched.
pub fn add_rows(
    rows: &[Row],
    query: &Query,
    kb: &mut KnowledgeBase,
) -> Result<usize, InsightError> {
    if let Some(bad) = rows.iter().find(|row| row.len() != query.columns.len()) {
        return Err(InsightError::ColumnCountMismatch {
            query: query.name.clone(),
            expected: query.columns.len(),
            actual: bad.len(),
        });
    }
    for row in rows {
        add_row(row, query, kb)?;
    }
    Ok(rows.len())
}

/// Allocate `n` empty destination slots for scanning one row
pub fn create_columns(n: usize) -> Row {
    vec![None; n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_query() -> Query {
        Query {
            name: "q_version".to_string(),
            sql: "SELECT VERSION, USAGE FROM M_DATABASE".to_string(),
            columns: vec!["VERSION".to_string(), "USAGE".to_string()],
        }
    }

    #[test]
    fn test_rows_accumulate_in_order() {
        let query = version_query();
        let mut kb = KnowledgeBase::new();

        add_row(
            &[Some("2.00.059".into()), Some("PRODUCTION".into())],
            &query,
            &mut kb,
        )
        .unwrap();
        add_row(&[Some("2.00.070".into()), Some("TEST".into())], &query, &mut kb).unwrap();

        assert_eq!(
            kb.get("q_version:VERSION").unwrap(),
            &["2.00.059".to_string(), "2.00.070".to_string()]
        );
        assert_eq!(
            kb.get("q_version:USAGE").unwrap(),
            &["PRODUCTION".to_string(), "TEST".to_string()]
        );
        assert_eq!(kb.len(), 2);
    }

    #[test]
    fn test_null_columns_are_skipped() {
        let query = version_query();
        let mut kb = KnowledgeBase::new();

        add_row(&[None, Some("PRODUCTION".into())], &query, &mut kb).unwrap();

        assert!(!kb.contains_key("q_version:VERSION"));
        assert_eq!(kb.get("q_version:USAGE").unwrap().len(), 1);
    }

    #[test]
    fn test_column_count_mismatch() {
        let query = version_query();
        let mut kb = KnowledgeBase::new();
        add_row(&[Some("2.00.059".into()), None], &query, &mut kb).unwrap();

        let err = add_row(&[Some("2.00.070".into())], &query, &mut kb).unwrap_err();
        assert_eq!(
            err,
            InsightError::ColumnCountMismatch {
                query: "q_version".to_string(),
                expected: 2,
                actual: 1,
            }
        );
        // Nothing from the rejected row was written
        assert_eq!(kb.get("q_version:VERSION").unwrap(), &["2.00.059".to_string()]);
    }

    #[test]
    fn test_add_rows_rejects_whole_result() {
        let query = version_query();
        let mut kb = KnowledgeBase::new();
        let rows = vec![
            vec![Some("a".to_string()), Some("b".to_string())],
            vec![Some("c".to_string())],
            vec![Some("d".to_string()), Some("e".to_string())],
        ];

        assert!(add_rows(&rows, &query, &mut kb).is_err());
        assert!(kb.is_empty());

        assert_eq!(add_rows(&rows[..1], &query, &mut kb).unwrap(), 1);
        assert_eq!(kb.get("q_version:USAGE").unwrap(), &["b".to_string()]);
    }

    #[test]
    fn test_create_columns() {
        let mut columns = create_columns(3);
        assert_eq!(columns, vec![None, None, None]);

        columns[1] = Some("x".to_string());
        assert_eq!(columns[0], None);
        assert!(create_columns(0).is_empty());
    }
}
