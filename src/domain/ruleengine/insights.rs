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

//! Per-rule recommendation outcomes

use super::evaluator::{evaluate, evaluate_with_diagnostics};
use super::knowledgebase::KnowledgeBase;
use super::rules::Rule;
use crate::domain::InsightError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one recommendation's trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub recommendation_id: String,
    pub result: bool,
}

/// Flattened `(rule, recommendation, result)` triple for telemetry export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightSample {
    pub rule_id: String,
    pub recommendation_id: String,
    pub result: bool,
}

/// Why a recommendation's trigger was forced to `false`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub rule_id: String,
    pub recommendation_id: String,
    pub message: String,
}

/// Rule ID to recommendation outcomes, in declaration order per rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Insights {
    rules: BTreeMap<String, Vec<ValidationResult>>,
}

impl Insights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes recorded for `rule_id`
    pub fn get(&self, rule_id: &str) -> Option<&[ValidationResult]> {
        self.rules.get(rule_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ValidationResult])> {
        self.rules
            .iter()
            .map(|(id, results)| (id.as_str(), results.as_slice()))
    }

    /// Fold a partial result (e.g. from another task) into this one
    ///
    /// Results for a rule present in both are appended after the existing ones.
    pub fn merge(&mut self, other: Insights) {
        for (rule_id, results) in other.rules {
            self.rules.entry(rule_id).or_default().extend(results);
        }
    }

    /// Flatten into samples ordered by rule ID, then declaration order
    pub fn samples(&self) -> Vec<InsightSample> {
        self.iter()
            .flat_map(|(rule_id, results)| {
                results.iter().map(move |r| InsightSample {
                    rule_id: rule_id.to_string(),
                    recommendation_id: r.recommendation_id.clone(),
                    result: r.result,
                })
            })
            .collect()
    }

    /// Count of recommendations that fired
    pub fn triggered_count(&self) -> usize {
        self.rules.values().flatten().filter(|r| r.result).count()
    }

    fn push(&mut self, rule_id: &str, result: ValidationResult) {
        self.entry(rule_id).push(result);
    }

    fn entry(&mut self, rule_id: &str) -> &mut Vec<ValidationResult> {
        self.rules.entry(rule_id.to_string()).or_default()
    }
}

/// Evaluate every recommendation of `rule` and record the outcomes
///
/// A rule without recommendations still gets an (empty) entry.
pub fn build_insights(rule: &Rule, kb: &KnowledgeBase, insights: &mut Insights) {
    insights.entry(&rule.id);
    for recommendation in &rule.recommendations {
        let result = evaluate(recommendation.trigger.as_ref(), kb);
        insights.push(
            &rule.id,
            ValidationResult {
                recommendation_id: recommendation.id.clone(),
                result,
            },
        );
    }
}

/// [`build_insights`] that also reports every error forcing a `false`
pub fn build_insights_with_diagnostics(
    rule: &Rule,
    kb: &KnowledgeBase,
    insights: &mut Insights,
) -> Vec<Diagnostic> {
    insights.entry(&rule.id);
    let mut diagnostics = Vec::new();
    for recommendation in &rule.recommendations {
        let (result, errors) = evaluate_with_diagnostics(recommendation.trigger.as_ref(), kb);
        diagnostics.extend(errors.iter().map(|err: &InsightError| Diagnostic {
            rule_id: rule.id.clone(),
            recommendation_id: recommendation.id.clone(),
            message: err.to_string(),
        }));
        insights.push(
            &rule.id,
            ValidationResult {
                recommendation_id: recommendation.id.clone(),
                result,
            },
        );
    }
    diagnostics
}
