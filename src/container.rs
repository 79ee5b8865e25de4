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

//! Dependency injection container for the insights service

use crate::adapters::{
    FileRuleRepository, HdbsqlQueryExecutor, HttpInsightPublisher, LogInsightPublisher,
    RecordedQueryExecutor, UnixCommandExecutor,
};
use crate::domain::{
    AgentConfig, DomainError, HanaConnection, InsightsCollectionService, InsightsConfig,
    OutputConfig, PublishConfig,
};
use crate::ports::{
    CommandExecutor, ConfigurationProvider, InsightPublisher, InsightsService, QueryExecutor,
    RuleRepository,
};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the dependency injection container
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Command execution timeout
    pub command_timeout: Duration,
    /// Command retry count
    pub retry_count: u32,
    /// HTTP timeout for publishing
    pub http_timeout: Duration,
    /// Skip TLS verification for HTTP publishing
    pub skip_tls_verify: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            retry_count: 2,
            http_timeout: Duration::from_secs(30),
            skip_tls_verify: false,
        }
    }
}

impl ContainerConfig {
    /// Container settings matching an agent configuration file
    pub fn from_agent_config(config: &AgentConfig) -> Self {
        ContainerConfigBuilder::new()
            .command_timeout(Duration::from_secs(config.insights.command_timeout))
            .retry_count(config.retry_count)
            .skip_tls_verify(config.publish.skip_tls_verify)
            .build()
    }
}

/// In-memory configuration provider
///
/// Serves an [`AgentConfig`] as given, without consulting files or the
/// environment.
pub struct SimpleConfigurationProvider {
    config: AgentConfig,
}

impl SimpleConfigurationProvider {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Provider for one connection with otherwise default settings
    pub fn with_connection(connection: HanaConnection) -> Self {
        Self::new(AgentConfig {
            hana: connection,
            ..Default::default()
        })
    }
}

#[async_trait::async_trait]
impl ConfigurationProvider for SimpleConfigurationProvider {
    async fn get_insights_config(&self) -> Result<InsightsConfig, DomainError> {
        Ok(self.config.insights.clone())
    }

    async fn get_connection(&self) -> Result<HanaConnection, DomainError> {
        Ok(self.config.hana.clone())
    }

    async fn get_publish_config(&self) -> Result<Option<PublishConfig>, DomainError> {
        let publish = &self.config.publish;
        Ok((!publish.endpoint.is_empty()).then(|| publish.clone()))
    }

    async fn get_output_config(&self) -> Result<OutputConfig, DomainError> {
        Ok(self.config.output.clone())
    }
}

/// Dependency injection container
pub struct ServiceContainer {
    config: ContainerConfig,
}

impl ServiceContainer {
    /// Create a new service container with configuration
    pub fn new(config: ContainerConfig) -> Self {
        Self { config }
    }

    /// Create a service container with default configuration
    pub fn with_defaults() -> Self {
        Self::new(ContainerConfig::default())
    }

    /// Create the command executor
    pub fn create_command_executor(&self) -> Arc<dyn CommandExecutor> {
        Arc::new(UnixCommandExecutor::new(
            self.config.command_timeout,
            self.config.retry_count,
        ))
    }

    /// Create the hdbsql-backed query executor
    pub fn create_query_executor(&self, connection: HanaConnection) -> Arc<dyn QueryExecutor> {
        Arc::new(HdbsqlQueryExecutor::new(
            connection,
            self.create_command_executor(),
            self.config.command_timeout,
        ))
    }

    /// Create the rule repository
    pub fn create_rule_repository(&self) -> Arc<dyn RuleRepository> {
        Arc::new(FileRuleRepository::new())
    }

    /// Create the publisher: HTTP when an endpoint is set, the log otherwise
    pub fn create_publisher(
        &self,
        publish: Option<&PublishConfig>,
    ) -> Result<Arc<dyn InsightPublisher>, Box<dyn Error>> {
        match publish {
            Some(config) if !config.endpoint.is_empty() => Ok(Arc::new(HttpInsightPublisher::new(
                self.config.http_timeout,
                self.config.skip_tls_verify,
            )?)),
            _ => Ok(Arc::new(LogInsightPublisher::new())),
        }
    }

    /// Check that the publish endpoint answers before the first cycle
    pub async fn check_publish_endpoint(
        &self,
        publish: &PublishConfig,
    ) -> Result<bool, Box<dyn Error>> {
        let publisher = self.create_publisher(Some(publish))?;
        Ok(publisher.test_connectivity(publish).await?)
    }

    /// Create the insights service from a configuration provider
    pub async fn create_insights_service(
        &self,
        provider: &dyn ConfigurationProvider,
    ) -> Result<Arc<dyn InsightsService>, Box<dyn Error>> {
        let connection = provider.get_connection().await?;
        let publish = provider.get_publish_config().await?;
        self.create_insights_service_with(self.create_query_executor(connection), publish.as_ref())
    }

    /// Create an offline insights service that replays recorded results
    pub fn create_offline_service(
        &self,
        recording: RecordedQueryExecutor,
    ) -> Result<Arc<dyn InsightsService>, Box<dyn Error>> {
        self.create_insights_service_with(Arc::new(recording), None)
    }

    fn create_insights_service_with(
        &self,
        query_executor: Arc<dyn QueryExecutor>,
        publish: Option<&PublishConfig>,
    ) -> Result<Arc<dyn InsightsService>, Box<dyn Error>> {
        let service = InsightsCollectionService::new(
            self.create_rule_repository(),
            query_executor,
            self.create_publisher(publish)?,
        );
        Ok(Arc::new(service))
    }

    /// Validate that the HANA client and credentials are available
    pub async fn validate_dependencies(
        &self,
        connection: HanaConnection,
    ) -> Result<Vec<String>, Box<dyn Error>> {
        let missing = self
            .create_query_executor(connection)
            .get_missing_dependencies()
            .await
            .map_err(|e| format!("Failed to check dependencies: {e}"))?;
        Ok(missing)
    }
}

/// Builder pattern for container configuration
pub struct ContainerConfigBuilder {
    config: ContainerConfig,
}

impl ContainerConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
        }
    }

    /// Set command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set retry count
    pub fn retry_count(mut self, count: u32) -> Self {
        self.config.retry_count = count;
        self
    }

    /// Set HTTP timeout
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    /// Skip TLS verification
    pub fn skip_tls_verify(mut self, skip: bool) -> Self {
        self.config.skip_tls_verify = skip;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ContainerConfig {
        self.config
    }
}

impl Default for ContainerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
