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

//! Configuration loaded from a TOML file

use crate::domain::{
    AgentConfig, DomainError, HanaConnection, InsightsConfig, OutputConfig, PublishConfig,
};
use crate::ports::ConfigurationProvider;
use async_trait::async_trait;
use log::debug;
use std::path::Path;

/// Provides an [`AgentConfig`] read from a TOML file
///
/// Secrets never live in the file; the publish token is read from the
/// variable named by `auth_token_env` when the file is loaded.
pub struct FileConfigurationProvider {
    config: AgentConfig,
}

impl FileConfigurationProvider {
    /// Wrap an already parsed configuration
    pub fn new(mut config: AgentConfig) -> Self {
        config.publish.auth_token = config.publish.resolve_token();
        Self { config }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, DomainError> {
        let config: AgentConfig = toml::from_str(contents)
            .map_err(|e| DomainError::InvalidConfiguration(e.to_string()))?;
        Ok(Self::new(config))
    }

    /// Read and parse a configuration file
    pub async fn load(path: &Path) -> Result<Self, DomainError> {
        debug!("Loading configuration from {}", path.display());
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::InvalidConfiguration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    /// The full configuration
    pub fn agent_config(&self) -> &AgentConfig {
        &self.config
    }
}

#[async_trait]
impl ConfigurationProvider for FileConfigurationProvider {
    async fn get_insights_config(&self) -> Result<InsightsConfig, DomainError> {
        Ok(self.config.insights.clone())
    }

    async fn get_connection(&self) -> Result<HanaConnection, DomainError> {
        let connection = &self.config.hana;
        if connection.host.is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "hana.host must not be empty".to_string(),
            ));
        }
        Ok(connection.clone())
    }

    async fn get_publish_config(&self) -> Result<Option<PublishConfig>, DomainError> {
        let publish = &self.config.publish;
        Ok((!publish.endpoint.is_empty()).then(|| publish.clone()))
    }

    async fn get_output_config(&self) -> Result<OutputConfig, DomainError> {
        Ok(self.config.output.clone())
    }
}
