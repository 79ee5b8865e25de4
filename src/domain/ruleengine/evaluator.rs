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

//! Trigger tree evaluation against a knowledge base
//!
//! Every failure path yields `false`. Callers that want to know why a trigger
//! did not fire use [`evaluate_with_diagnostics`], which returns the same
//! boolean plus the errors met on the way.

use super::knowledgebase::KnowledgeBase;
use super::rules::{EvalNode, EvalOperation};
use crate::domain::InsightError;
use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

lazy_static! {
    static ref SIZE_MACRO_RE: Regex = Regex::new(r"^size\(([^()]*)\)$").unwrap();
}

/// Key inside a `size(<key>)` operand, or `None` for a literal
pub fn size_macro_key(operand: &str) -> Option<&str> {
    SIZE_MACRO_RE
        .captures(operand)
        .and_then(|captures| captures.get(1))
        .map(|key| key.as_str())
}

/// Resolve an operand against the knowledge base
///
/// `size(<key>)` becomes the number of values stored under `key`; anything
/// else is returned unchanged.
pub fn substitute<'a>(
    operand: &'a str,
    kb: &KnowledgeBase,
) -> Result<Cow<'a, str>, InsightError> {
    match size_macro_key(operand) {
        Some(key) => kb
            .get(key)
            .map(|values| Cow::Owned(values.len().to_string()))
            .ok_or_else(|| InsightError::KeyNotFound {
                key: key.to_string(),
            }),
        None => Ok(Cow::Borrowed(operand)),
    }
}

/// Compare two resolved operands
///
/// EQ/NEQ compare numerically when both sides parse as floats and bytewise
/// otherwise. Ordering operators need two floats and are `false` if either
/// side does not parse. Operands are not trimmed.
pub fn compare(lhs: &str, rhs: &str, operation: &EvalOperation) -> bool {
    try_compare(lhs, rhs, operation).unwrap_or(false)
}

/// [`compare`], reporting why a comparison could not be made
pub fn try_compare(
    lhs: &str,
    rhs: &str,
    operation: &EvalOperation,
) -> Result<bool, InsightError> {
    match operation {
        EvalOperation::Eq => Ok(operands_equal(lhs, rhs)),
        EvalOperation::Neq => Ok(!operands_equal(lhs, rhs)),
        EvalOperation::Lt | EvalOperation::Lte | EvalOperation::Gt | EvalOperation::Gte => {
            let l = parse_float(lhs)?;
            let r = parse_float(rhs)?;
            Ok(match operation {
                EvalOperation::Lt => l < r,
                EvalOperation::Lte => l <= r,
                EvalOperation::Gt => l > r,
                _ => l >= r,
            })
        }
        other => Err(InsightError::UnrecognizedOperation {
            operation: other.to_string(),
        }),
    }
}

fn operands_equal(lhs: &str, rhs: &str) -> bool {
    match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(l), Ok(r)) => l == r,
        _ => lhs == rhs,
    }
}

fn parse_float(operand: &str) -> Result<f64, InsightError> {
    operand
        .parse::<f64>()
        .map_err(|_| InsightError::ParseFailure {
            operand: operand.to_string(),
        })
}

/// Evaluate a trigger; an absent trigger does not fire
pub fn evaluate(node: Option<&EvalNode>, kb: &KnowledgeBase) -> bool {
    let mut evaluation = Evaluation::new(kb);
    let result = node.map_or(false, |node| evaluation.eval(node));
    for warning in &evaluation.diagnostics {
        log::debug!("trigger evaluated to false: {warning}");
    }
    result
}

/// Evaluate a trigger, also returning the errors that forced `false` results
///
/// The boolean is always identical to [`evaluate`]. Errors from branches
/// skipped by short-circuiting are never seen.
pub fn evaluate_with_diagnostics(
    node: Option<&EvalNode>,
    kb: &KnowledgeBase,
) -> (bool, Vec<InsightError>) {
    let mut evaluation = Evaluation::new(kb);
    let result = node.map_or(false, |node| evaluation.eval(node));
    (result, evaluation.diagnostics)
}

struct Evaluation<'a> {
    kb: &'a KnowledgeBase,
    diagnostics: Vec<InsightError>,
}

impl<'a> Evaluation<'a> {
    fn new(kb: &'a KnowledgeBase) -> Self {
        Self {
            kb,
            diagnostics: Vec::new(),
        }
    }

    fn eval(&mut self, node: &EvalNode) -> bool {
        match &node.operation {
            EvalOperation::And => {
                self.note_empty(node);
                // Vacuously true when there are no children
                node.child_evals.iter().all(|child| self.eval(child))
            }
            EvalOperation::Or => {
                self.note_empty(node);
                node.child_evals.iter().any(|child| self.eval(child))
            }
            op if op.is_comparison() => self.eval_comparison(node),
            other => {
                self.diagnostics.push(InsightError::UnrecognizedOperation {
                    operation: other.to_string(),
                });
                false
            }
        }
    }

    fn eval_comparison(&mut self, node: &EvalNode) -> bool {
        let resolved = substitute(&node.lhs, self.kb).and_then(|lhs| {
            let rhs = substitute(&node.rhs, self.kb)?;
            try_compare(&lhs, &rhs, &node.operation)
        });
        match resolved {
            Ok(result) => result,
            Err(err) => {
                self.diagnostics.push(err);
                false
            }
        }
    }

    fn note_empty(&mut self, node: &EvalNode) {
        if node.child_evals.is_empty() {
            self.diagnostics.push(InsightError::EmptyLogicalNode {
                operation: node.operation.to_string(),
            });
        }
    }
}
