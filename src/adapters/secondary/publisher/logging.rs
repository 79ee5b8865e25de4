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

//! Publisher that writes insights to the log

use crate::domain::{InsightsRun, PublishConfig, PublishError};
use crate::ports::InsightPublisher;
use async_trait::async_trait;
use log::info;

/// Logs one line per recommendation outcome
#[derive(Debug, Default)]
pub struct LogInsightPublisher;

impl LogInsightPublisher {
    pub fn new() -> Self {
        Self
    }
}

/// Render a run as `rule/recommendation=result` lines
pub fn render_samples(run: &InsightsRun) -> Vec<String> {
    run.samples()
        .into_iter()
        .map(|sample| {
            format!(
                "{}/{}={}",
                sample.rule_id, sample.recommendation_id, sample.result
            )
        })
        .collect()
}

#[async_trait]
impl InsightPublisher for LogInsightPublisher {
    async fn publish(&self, run: &InsightsRun, _config: &PublishConfig) -> Result<(), PublishError> {
        for line in render_samples(run) {
            info!("insight {line}");
        }
        Ok(())
    }

    async fn test_connectivity(&self, _config: &PublishConfig) -> Result<bool, PublishError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ruleengine::{
        build_insights, EvalNode, EvalOperation, Insights, KnowledgeBase, Recommendation, Rule,
    };

    #[tokio::test]
    async fn test_render_and_publish() {
        let rule = Rule {
            id: "r1".to_string(),
            recommendations: vec![
                Recommendation {
                    id: "rec_a".to_string(),
                    description: String::new(),
                    trigger: Some(EvalNode::compare(EvalOperation::Lt, "1", "2")),
                },
                Recommendation {
                    id: "rec_b".to_string(),
                    description: String::new(),
                    trigger: None,
                },
            ],
            ..Default::default()
        };
        let mut insights = Insights::new();
        build_insights(&rule, &KnowledgeBase::new(), &mut insights);
        let run = InsightsRun::new("hana01".to_string(), 1, 0, insights, vec![]);

        assert_eq!(render_samples(&run), vec!["r1/rec_a=true", "r1/rec_b=false"]);

        let publisher = LogInsightPublisher::new();
        assert!(publisher
            .publish(&run, &PublishConfig::default())
            .await
            .is_ok());
    }
}
