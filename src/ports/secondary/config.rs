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

use crate::domain::{DomainError, HanaConnection, InsightsConfig, OutputConfig, PublishConfig};
use async_trait::async_trait;

/// Secondary port - Configuration provider abstraction
///
/// This interface abstracts how configuration is loaded and managed,
/// allowing for different sources (CLI args, files, environment, etc.)
#[async_trait]
pub trait ConfigurationProvider: Send + Sync {
    /// Get evaluation cycle configuration
    ///
    /// # Returns
    /// * `Ok(InsightsConfig)` - Insights configuration
    /// * `Err(DomainError)` - Error loading configuration
    async fn get_insights_config(&self) -> Result<InsightsConfig, DomainError>;

    /// Get HANA connection settings
    ///
    /// # Returns
    /// * `Ok(HanaConnection)` - Connection settings
    /// * `Err(DomainError)` - Error loading configuration
    async fn get_connection(&self) -> Result<HanaConnection, DomainError>;

    /// Get publishing configuration if enabled
    ///
    /// # Returns
    /// * `Ok(Option<PublishConfig>)` - Publishing config if an endpoint is set
    /// * `Err(DomainError)` - Error loading configuration
    async fn get_publish_config(&self) -> Result<Option<PublishConfig>, DomainError>;

    /// Get local output settings
    ///
    /// # Returns
    /// * `Ok(OutputConfig)` - Output format and directory
    /// * `Err(DomainError)` - Error loading configuration
    async fn get_output_config(&self) -> Result<OutputConfig, DomainError>;
}
