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

use crate::domain::ruleengine::Rule;
use crate::domain::RuleError;
use async_trait::async_trait;
use std::path::Path;

/// Secondary port - Rule definition source
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Load every rule found under `dir`
    ///
    /// # Arguments
    /// * `dir` - Directory of `.json` / `.toml` rule files
    ///
    /// # Returns
    /// * `Ok(Vec<Rule>)` - Rules in file name order
    /// * `Err(RuleError)` - A file could not be read or decoded
    async fn load_rules(&self, dir: &Path) -> Result<Vec<Rule>, RuleError>;
}
