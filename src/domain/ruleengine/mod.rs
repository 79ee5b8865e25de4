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

//! HANA Insights rule engine
//!
//! Query results are folded into a [`KnowledgeBase`], each rule's trigger
//! trees are evaluated against it, and the outcomes are collected as
//! [`Insights`]. Everything here is synchronous and free of I/O; the
//! knowledge base is read-only during evaluation and can be shared between
//! threads.

pub mod evaluator;
pub mod insights;
pub mod knowledgebase;
pub mod rules;

pub use evaluator::{compare, evaluate, evaluate_with_diagnostics, substitute, try_compare};
pub use insights::{
    build_insights, build_insights_with_diagnostics, Diagnostic, InsightSample, Insights,
    ValidationResult,
};
pub use knowledgebase::{add_row, add_rows, create_columns, KnowledgeBase, Row};
pub use rules::{validate_rule_set, EvalNode, EvalOperation, Query, Recommendation, Rule};

use crate::domain::RuleError;
use serde::Deserialize;

const DEFAULT_RULES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/rules/hana_insights.json"
));

/// A rule file holds one rule, a list of rules, or a `rules` table array
#[derive(Deserialize)]
#[serde(untagged)]
pub enum RuleDocument {
    Many(Vec<Rule>),
    Wrapped { rules: Vec<Rule> },
    One(Rule),
}

impl RuleDocument {
    pub fn into_rules(self) -> Vec<Rule> {
        match self {
            RuleDocument::Many(rules) | RuleDocument::Wrapped { rules } => rules,
            RuleDocument::One(rule) => vec![rule],
        }
    }
}

/// Rules shipped with the agent
pub fn default_rules() -> Result<Vec<Rule>, RuleError> {
    serde_json::from_str::<RuleDocument>(DEFAULT_RULES)
        .map(RuleDocument::into_rules)
        .map_err(|e| RuleError::Parse {
            path: "<built-in>".to_string(),
            message: e.to_string(),
        })
}

/// Evaluate `rules` against one knowledge base
///
/// With `collect_diagnostics` the errors behind forced `false` results are
/// returned as well; the insights are the same either way.
pub fn evaluate_rules(
    rules: &[Rule],
    kb: &KnowledgeBase,
    collect_diagnostics: bool,
) -> (Insights, Vec<Diagnostic>) {
    let mut insights = Insights::new();
    let mut diagnostics = Vec::new();
    for rule in rules {
        if collect_diagnostics {
            diagnostics.extend(build_insights_with_diagnostics(rule, kb, &mut insights));
        } else {
            build_insights(rule, kb, &mut insights);
        }
    }
    (insights, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_valid() {
        let rules = default_rules().unwrap();
        assert!(rules.len() >= 3);
        let errors = validate_rule_set(&rules);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn test_default_rules_against_knowledge_base() {
        let rules = default_rules().unwrap();
        let mut kb = KnowledgeBase::new();
        let partitions = rules
            .iter()
            .flat_map(|rule| &rule.queries)
            .find(|query| query.name == "q_data_volume_partitions")
            .unwrap();
        add_row(&[Some("hana01".into()), Some("1".into())], partitions, &mut kb).unwrap();

        let (insights, diagnostics) = evaluate_rules(&rules, &kb, true);
        let persistence = insights.get("SAP_HANA_INSIGHTS_PERSISTENCE").unwrap();
        assert_eq!(persistence[0].recommendation_id, "rec_partition_data_volume");
        assert!(persistence[0].result);
        assert!(!persistence[1].result);

        // The other queries returned no rows
        assert!(diagnostics
            .iter()
            .all(|d| d.message.starts_with("knowledge base key not found")));
        assert_eq!(insights.triggered_count(), 1);
    }

    #[test]
    fn test_single_rule_document() {
        let doc: RuleDocument = serde_json::from_str(r#"{"id": "solo"}"#).unwrap();
        let rules = doc.into_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "solo");
    }

    #[test]
    fn test_toml_rule_document() {
        let doc: RuleDocument = toml::from_str(
            r#"
            [[rules]]
            id = "toml_rule"

            [[rules.queries]]
            name = "q_hosts"
            sql = "SELECT HOST FROM M_HOST_INFORMATION"
            columns = ["HOST"]

            [[rules.recommendations]]
            id = "rec_single_host"
            trigger = { operation = "EQ", lhs = "size(q_hosts:HOST)", rhs = "1" }
            "#,
        )
        .unwrap();
        let rules = doc.into_rules();
        assert_eq!(rules[0].id, "toml_rule");
        assert_eq!(
            rules[0].recommendations[0].trigger.as_ref().unwrap().operation,
            EvalOperation::Eq
        );
    }
}
