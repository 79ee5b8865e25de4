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

use crate::domain::ruleengine::{Query, Row};
use crate::domain::QueryError;
use async_trait::async_trait;

/// Secondary port - Query execution abstraction
///
/// Runs a rule's SQL against HANA and hands back rows aligned to the
/// query's declared columns.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a query
    ///
    /// # Arguments
    /// * `query` - Query to run; `query.sql` is sent as-is
    ///
    /// # Returns
    /// * `Ok(Vec<Row>)` - Result rows, one nullable string per column
    /// * `Err(QueryError)` - Query could not be executed
    async fn execute(&self, query: &Query) -> Result<Vec<Row>, QueryError>;

    /// List client binaries or settings this executor is missing
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` - Missing dependencies (empty if ready)
    /// * `Err(QueryError)` - Error checking dependencies
    async fn get_missing_dependencies(&self) -> Result<Vec<String>, QueryError>;
}
