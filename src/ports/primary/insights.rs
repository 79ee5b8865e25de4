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

use crate::domain::{
    InsightsConfig, InsightsRun, PublishConfig, PublishError, ReportError, RuleError,
};
use async_trait::async_trait;

/// Primary port - Main interface offered by the HANA Insights domain
///
/// This is what external systems (CLI, library consumers) use to run
/// evaluation cycles and export their results.
#[async_trait]
pub trait InsightsService: Send + Sync {
    /// Run one evaluation cycle: load rules, query HANA, evaluate
    ///
    /// With `config.strict`, rules that fail validation are dropped before
    /// evaluation. The run's diagnostics then only report missing keys and
    /// non-numeric operands; malformed nodes are reported by
    /// [`InsightsService::validate_rules`].
    ///
    /// # Arguments
    /// * `config` - Rule source and evaluation options
    ///
    /// # Returns
    /// * `Ok(InsightsRun)` - Recommendation outcomes for every rule
    /// * `Err(ReportError)` - Rules could not be loaded
    async fn run_insights(&self, config: &InsightsConfig) -> Result<InsightsRun, ReportError>;

    /// Publish an evaluation cycle's results
    ///
    /// # Arguments
    /// * `run` - The evaluation results to publish
    /// * `config` - Publishing configuration (endpoint, auth, labels)
    ///
    /// # Returns
    /// * `Ok(())` - Results successfully published
    /// * `Err(PublishError)` - Error occurred during publishing
    async fn publish_insights(
        &self,
        run: &InsightsRun,
        config: &PublishConfig,
    ) -> Result<(), PublishError>;

    /// Validate the configured rule set without running any query
    ///
    /// # Returns
    /// * `Ok(Vec<RuleError>)` - Every validation problem (empty if none)
    /// * `Err(ReportError)` - Rules could not be loaded
    async fn validate_rules(&self, config: &InsightsConfig) -> Result<Vec<RuleError>, ReportError>;

    /// Validate system dependencies and return missing requirements
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` - List of missing dependencies (empty if all present)
    /// * `Err(ReportError)` - Error occurred during validation
    async fn validate_dependencies(&self) -> Result<Vec<String>, ReportError>;
}
