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

use crate::domain::{InsightsRun, PublishConfig, PublishError};
use async_trait::async_trait;
use std::path::Path;

/// Secondary port - Insight publishing abstraction
///
/// This interface abstracts how evaluation results are exported,
/// allowing for different implementations (HTTP, file system, log, etc.)
#[async_trait]
pub trait InsightPublisher: Send + Sync {
    /// Publish an evaluation cycle's results
    ///
    /// # Arguments
    /// * `run` - The evaluation results to publish
    /// * `config` - Publishing configuration
    ///
    /// # Returns
    /// * `Ok(())` - Results successfully published
    /// * `Err(PublishError)` - Error occurred during publishing
    async fn publish(&self, run: &InsightsRun, config: &PublishConfig) -> Result<(), PublishError>;

    /// Test connectivity to the publishing endpoint
    ///
    /// # Arguments
    /// * `config` - Publishing configuration
    ///
    /// # Returns
    /// * `Ok(bool)` - true if endpoint is reachable
    /// * `Err(PublishError)` - Error testing connectivity
    async fn test_connectivity(&self, config: &PublishConfig) -> Result<bool, PublishError>;
}

/// Secondary port - File repository abstraction
///
/// This interface abstracts file-based storage of evaluation runs
#[async_trait]
pub trait InsightRepository: Send + Sync {
    /// Save a run to a file in JSON format
    async fn save_json(&self, run: &InsightsRun, path: &Path) -> Result<(), PublishError>;

    /// Save a run to a file in TOML format
    async fn save_toml(&self, run: &InsightsRun, path: &Path) -> Result<(), PublishError>;

    /// Load a run from a JSON file
    async fn load_json(&self, path: &Path) -> Result<InsightsRun, PublishError>;

    /// Load a run from a TOML file
    async fn load_toml(&self, path: &Path) -> Result<InsightsRun, PublishError>;
}
