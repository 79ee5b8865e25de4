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

//! SAP HANA Insights agent library
//!
//! Evaluates HANA Insights rules: the results of each rule's queries are
//! collected into a knowledge base, every recommendation's trigger tree is
//! evaluated against it, and the outcomes are published as insights. Built
//! on a Ports and Adapters (Hexagonal) architecture.
//!
//! # Architecture
//!
//! - **Domain**: The rule engine, entities and the evaluation service
//! - **Ports**: Interfaces for external interactions
//! - **Adapters**: hdbsql, rule files, HTTP/file/log publishers
//!
//! # Usage
//!
//! ```rust,no_run
//! use sapagent::{AgentConfig, InsightsService};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AgentConfig::default();
//!     let service = sapagent::create_service(&config).await?;
//!
//!     let run = service.run_insights(&config.insights).await?;
//!     for sample in run.samples() {
//!         println!("{}/{} = {}", sample.rule_id, sample.recommendation_id, sample.result);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The rule engine can also be used on its own:
//!
//! ```rust
//! use sapagent::domain::ruleengine::{add_row, evaluate, EvalNode, EvalOperation, KnowledgeBase, Query};
//!
//! let query = Query {
//!     name: "q_hosts".to_string(),
//!     sql: String::new(),
//!     columns: vec!["HOST".to_string()],
//! };
//! let mut kb = KnowledgeBase::new();
//! add_row(&[Some("hana01".to_string())], &query, &mut kb).unwrap();
//!
//! let trigger = EvalNode::compare(EvalOperation::Eq, "size(q_hosts:HOST)", "1");
//! assert!(evaluate(Some(&trigger), &kb));
//! ```

pub mod adapters;
pub mod container;
pub mod domain;
pub mod ports;
pub mod schedule;

pub use adapters::{
    FileConfigurationProvider, FileInsightPublisher, FileInsightRepository, FileRuleRepository,
    HdbsqlQueryExecutor, HttpInsightPublisher, LogInsightPublisher, RecordedQueryExecutor,
    UnixCommandExecutor,
};
pub use container::{
    ContainerConfig, ContainerConfigBuilder, ServiceContainer, SimpleConfigurationProvider,
};
pub use domain::ruleengine::{Insights, KnowledgeBase, Rule};
pub use domain::{
    AgentConfig, HanaConnection, InsightsConfig, InsightsRun, OutputConfig, OutputFormat,
    PublishConfig, PublishError, ReportError,
};
pub use ports::{
    CommandExecutor, ConfigurationProvider, InsightPublisher, InsightRepository, InsightsService,
    QueryExecutor, RuleRepository,
};
pub use schedule::{run_periodic, shutdown_signal};

use std::error::Error;
use std::sync::Arc;

/// Create an insights service wired for `config`
///
/// # Arguments
/// * `config` - Agent configuration (connection, publishing, timeouts)
///
/// # Returns
/// * Configured insights service using hdbsql
pub async fn create_service(
    config: &AgentConfig,
) -> Result<Arc<dyn InsightsService>, Box<dyn Error>> {
    let container = ServiceContainer::new(ContainerConfig::from_agent_config(config));
    let provider = SimpleConfigurationProvider::new(config.clone());
    container.create_insights_service(&provider).await
}

/// Create an insights service with custom container configuration
///
/// # Arguments
/// * `container_config` - Container configuration for customizing behavior
/// * `provider` - Source of connection and publishing settings
pub async fn create_service_with_config(
    container_config: ContainerConfig,
    provider: &dyn ConfigurationProvider,
) -> Result<Arc<dyn InsightsService>, Box<dyn Error>> {
    let container = ServiceContainer::new(container_config);
    container.create_insights_service(provider).await
}

/// Check that the HANA client and credentials for `connection` are available
///
/// # Returns
/// * `Ok(missing)` - Missing dependencies, empty when ready
/// * `Err(Box<dyn Error>)` - Error occurred during validation
pub async fn validate_system(connection: &HanaConnection) -> Result<Vec<String>, Box<dyn Error>> {
    let container = ServiceContainer::with_defaults();
    container.validate_dependencies(connection.clone()).await
}
