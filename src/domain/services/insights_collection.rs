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

use crate::domain::ruleengine::{
    add_rows, default_rules, evaluate_rules, validate_rule_set, KnowledgeBase, Rule,
};
use crate::domain::{
    InsightsConfig, InsightsRun, PublishConfig, PublishError, ReportError, RuleError,
};
use crate::ports::{InsightPublisher, InsightsService, QueryExecutor, RuleRepository};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Domain service that runs HANA Insights evaluation cycles
///
/// One cycle loads the rule set, executes every query once, builds a single
/// knowledge base shared by all rules, and evaluates each rule against it.
pub struct InsightsCollectionService {
    /// Source of rule definitions
    rule_repository: Arc<dyn RuleRepository>,
    /// HANA query client
    query_executor: Arc<dyn QueryExecutor>,
    /// Telemetry export
    publisher: Arc<dyn InsightPublisher>,
}

impl InsightsCollectionService {
    /// Create a new insights collection service
    ///
    /// # Arguments
    /// * `rule_repository` - Loads rules from a directory
    /// * `query_executor` - Runs rule queries against HANA
    /// * `publisher` - Exports evaluation results
    pub fn new(
        rule_repository: Arc<dyn RuleRepository>,
        query_executor: Arc<dyn QueryExecutor>,
        publisher: Arc<dyn InsightPublisher>,
    ) -> Self {
        Self {
            rule_repository,
            query_executor,
            publisher,
        }
    }

    async fn load_rules(&self, config: &InsightsConfig) -> Result<Vec<Rule>, ReportError> {
        let rules = match &config.rules_dir {
            Some(dir) => {
                debug!("Loading rules from {}", dir.display());
                self.rule_repository.load_rules(dir).await?
            }
            None => default_rules()?,
        };
        Ok(rules)
    }

    /// Execute every distinct query and fold the rows into one knowledge base
    ///
    /// A failed query or malformed result is logged and skipped.
    pub async fn collect_knowledge_base(&self, rules: &[Rule]) -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        let mut executed = HashSet::new();

        for query in rules.iter().flat_map(|rule| &rule.queries) {
            if !executed.insert(query.name.as_str()) {
                debug!("Query {} already executed this cycle", query.name);
                continue;
            }
            match self.query_executor.execute(query).await {
                Ok(rows) => match add_rows(&rows, query, &mut kb) {
                    Ok(count) => debug!("Query {} returned {count} rows", query.name),
                    Err(e) => error!("Discarding result of query {}: {e}", query.name),
                },
                Err(e) => warn!("Query {} failed: {e}", query.name),
            }
        }
        kb
    }
}

/// Drop rules that fail validation when `strict`, otherwise only log them
fn select_rules(rules: Vec<Rule>, strict: bool) -> Vec<Rule> {
    let errors = validate_rule_set(&rules);
    if errors.is_empty() {
        return rules;
    }

    let mut invalid = HashSet::new();
    for err in &errors {
        warn!("Rule validation: {err}");
        if let Some(rule_id) = err.rule_id() {
            invalid.insert(rule_id.to_string());
        }
    }
    if !strict {
        return rules;
    }

    rules
        .into_iter()
        .filter(|rule| {
            let keep = !rule.id.trim().is_empty() && !invalid.contains(&rule.id);
            if !keep {
                warn!("Skipping invalid rule '{}'", rule.id);
            }
            keep
        })
        .collect()
}

async fn local_hostname() -> String {
    match tokio::fs::read_to_string("/proc/sys/kernel/hostname").await {
        Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
    }
}

#[async_trait]
impl InsightsService for InsightsCollectionService {
    async fn run_insights(&self, config: &InsightsConfig) -> Result<InsightsRun, ReportError> {
        let rules = select_rules(self.load_rules(config).await?, config.strict);
        let kb = self.collect_knowledge_base(&rules).await;

        let (insights, diagnostics) = evaluate_rules(&rules, &kb, config.strict);
        for diagnostic in &diagnostics {
            warn!(
                "{}/{}: {}",
                diagnostic.rule_id, diagnostic.recommendation_id, diagnostic.message
            );
        }
        info!(
            "Evaluated {} rules over {} knowledge base keys, {} recommendations triggered",
            rules.len(),
            kb.len(),
            insights.triggered_count()
        );

        Ok(InsightsRun::new(
            local_hostname().await,
            rules.len(),
            kb.len(),
            insights,
            diagnostics,
        ))
    }

    async fn publish_insights(
        &self,
        run: &InsightsRun,
        config: &PublishConfig,
    ) -> Result<(), PublishError> {
        self.publisher.publish(run, config).await
    }

    async fn validate_rules(&self, config: &InsightsConfig) -> Result<Vec<RuleError>, ReportError> {
        let rules = self.load_rules(config).await?;
        Ok(validate_rule_set(&rules))
    }

    async fn validate_dependencies(&self) -> Result<Vec<String>, ReportError> {
        self.query_executor
            .get_missing_dependencies()
            .await
            .map_err(|e| ReportError::Domain(e.into()))
    }
}
