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

//! Rule definitions: queries, recommendations and trigger trees

use super::evaluator::size_macro_key;
use crate::domain::RuleError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Operation carried by an [`EvalNode`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EvalOperation {
    #[default]
    Undefined,
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Any name outside the defined set, kept so it can be reported
    Unrecognized(String),
}

impl EvalOperation {
    /// True for the operand comparisons (EQ, NEQ, LT, LTE, GT, GTE)
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            EvalOperation::Eq
                | EvalOperation::Neq
                | EvalOperation::Lt
                | EvalOperation::Lte
                | EvalOperation::Gt
                | EvalOperation::Gte
        )
    }

    /// True for the combinators (AND, OR)
    pub fn is_logical(&self) -> bool {
        matches!(self, EvalOperation::And | EvalOperation::Or)
    }

    pub fn as_str(&self) -> &str {
        match self {
            EvalOperation::Undefined => "UNDEFINED",
            EvalOperation::Or => "OR",
            EvalOperation::And => "AND",
            EvalOperation::Eq => "EQ",
            EvalOperation::Neq => "NEQ",
            EvalOperation::Lt => "LT",
            EvalOperation::Lte => "LTE",
            EvalOperation::Gt => "GT",
            EvalOperation::Gte => "GTE",
            EvalOperation::Unrecognized(name) => name,
        }
    }
}

impl From<String> for EvalOperation {
    fn from(name: String) -> Self {
        match name.to_uppercase().as_str() {
            "UNDEFINED" | "" => EvalOperation::Undefined,
            "OR" => EvalOperation::Or,
            "AND" => EvalOperation::And,
            "EQ" => EvalOperation::Eq,
            "NEQ" => EvalOperation::Neq,
            "LT" => EvalOperation::Lt,
            "LTE" => EvalOperation::Lte,
            "GT" => EvalOperation::Gt,
            "GTE" => EvalOperation::Gte,
            _ => EvalOperation::Unrecognized(name),
        }
    }
}

impl From<EvalOperation> for String {
    fn from(op: EvalOperation) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for EvalOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of a boolean expression tree
///
/// Comparison leaves use `lhs`/`rhs`; AND/OR nodes use `child_evals`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalNode {
    #[serde(default)]
    pub operation: EvalOperation,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lhs: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rhs: String,
    #[serde(default, alias = "child_evals", skip_serializing_if = "Vec::is_empty")]
    pub child_evals: Vec<EvalNode>,
}

impl EvalNode {
    /// Build a comparison leaf
    pub fn compare(operation: EvalOperation, lhs: &str, rhs: &str) -> Self {
        Self {
            operation,
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
            child_evals: Vec::new(),
        }
    }

    /// Build an AND node over `children`
    pub fn and(children: Vec<EvalNode>) -> Self {
        Self {
            operation: EvalOperation::And,
            child_evals: children,
            ..Self::default()
        }
    }

    /// Build an OR node over `children`
    pub fn or(children: Vec<EvalNode>) -> Self {
        Self {
            operation: EvalOperation::Or,
            child_evals: children,
            ..Self::default()
        }
    }

    /// Check the node shape invariants for this node and its subtree
    ///
    /// Returns a description of the first violation found.
    pub fn check_shape(&self) -> Result<(), String> {
        match &self.operation {
            op if op.is_comparison() => {
                if !self.child_evals.is_empty() {
                    return Err(format!("{op} comparison must not have child evaluations"));
                }
                if self.lhs.is_empty() || self.rhs.is_empty() {
                    return Err(format!("{op} comparison needs both lhs and rhs"));
                }
                Ok(())
            }
            op if op.is_logical() => {
                if !self.lhs.is_empty() || !self.rhs.is_empty() {
                    return Err(format!("{op} node must not have operands"));
                }
                if self.child_evals.is_empty() {
                    return Err(format!("{op} node has no child evaluations"));
                }
                self.child_evals.iter().try_for_each(EvalNode::check_shape)
            }
            EvalOperation::Undefined => Err("operation is undefined".to_string()),
            op => Err(format!("unrecognized operation '{op}'")),
        }
    }

    /// Collect every key referenced through `size(...)` in this subtree
    pub fn referenced_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys(&self, keys: &mut Vec<String>) {
        for operand in [&self.lhs, &self.rhs] {
            if let Some(key) = size_macro_key(operand) {
                keys.push(key.to_string());
            }
        }
        for child in &self.child_evals {
            child.collect_keys(keys);
        }
    }
}

/// A query whose result rows feed the knowledge base
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Query {
    pub name: String,
    #[serde(default)]
    pub sql: String,
    /// Declared column names, in result order
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Query {
    /// Knowledge base keys produced by this query
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.columns
            .iter()
            .map(move |column| format!("{}:{}", self.name, column))
    }
}

/// A recommendation fired by its trigger
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub trigger: Option<EvalNode>,
}

/// A HANA Insights rule
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub queries: Vec<Query>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

impl Rule {
    /// Structural validation of a single rule
    pub fn validate(&self) -> Vec<RuleError> {
        let mut errors = Vec::new();
        if self.id.trim().is_empty() {
            errors.push(RuleError::MissingId);
        }

        let mut seen = HashSet::new();
        for recommendation in &self.recommendations {
            if recommendation.id.is_empty() {
                errors.push(RuleError::InvalidNode {
                    rule: self.id.clone(),
                    recommendation: String::new(),
                    reason: "recommendation has an empty id".to_string(),
                });
            } else if !seen.insert(recommendation.id.as_str()) {
                errors.push(RuleError::DuplicateRecommendation {
                    rule: self.id.clone(),
                    recommendation: recommendation.id.clone(),
                });
            }
            if let Some(trigger) = &recommendation.trigger {
                if let Err(reason) = trigger.check_shape() {
                    errors.push(RuleError::InvalidNode {
                        rule: self.id.clone(),
                        recommendation: recommendation.id.clone(),
                        reason,
                    });
                }
            }
        }
        errors
    }
}

/// Validate a whole rule set
///
/// On top of [`Rule::validate`], rule ids and query names must be unique and
/// every `size(...)` reference must name a key some query in the set declares.
/// The knowledge base is shared across rules, so a rule may reference another
/// rule's queries.
pub fn validate_rule_set(rules: &[Rule]) -> Vec<RuleError> {
    let mut errors = Vec::new();
    let mut rule_ids = HashSet::new();
    let mut query_names = HashSet::new();
    let mut known_keys = HashSet::new();

    for rule in rules {
        errors.extend(rule.validate());
        if !rule.id.is_empty() && !rule_ids.insert(rule.id.as_str()) {
            errors.push(RuleError::DuplicateRule(rule.id.clone()));
        }
        for query in &rule.queries {
            if !query_names.insert(query.name.as_str()) {
                errors.push(RuleError::DuplicateQuery {
                    rule: rule.id.clone(),
                    query: query.name.clone(),
                });
            }
            known_keys.extend(query.keys());
        }
    }

    for rule in rules {
        for recommendation in &rule.recommendations {
            let Some(trigger) = &recommendation.trigger else {
                continue;
            };
            for key in trigger.referenced_keys() {
                if !known_keys.contains(&key) {
                    errors.push(RuleError::UnknownKey {
                        rule: rule.id.clone(),
                        recommendation: recommendation.id.clone(),
                        key,
                    });
                }
            }
        }
    }
    errors
}
