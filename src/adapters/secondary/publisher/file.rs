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

//! File-based publisher for saving insights runs to local files

use crate::domain::{InsightsRun, OutputConfig, OutputFormat, PublishConfig, PublishError};
use crate::ports::{InsightPublisher, InsightRepository};
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File system repository for storing insights runs
pub struct FileInsightRepository;

impl FileInsightRepository {
    /// Create a new file system repository
    pub fn new() -> Self {
        Self
    }

    async fn write(path: &Path, contents: String) -> Result<(), PublishError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PublishError::FileFailed(format!("Failed to create directory: {e}")))?;
        }

        fs::write(path, contents).await.map_err(|e| {
            PublishError::FileFailed(format!("Failed to write {}: {e}", path.display()))
        })
    }

    async fn read(path: &Path) -> Result<String, PublishError> {
        fs::read_to_string(path).await.map_err(|e| {
            PublishError::FileFailed(format!("Failed to read {}: {e}", path.display()))
        })
    }
}

impl Default for FileInsightRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InsightRepository for FileInsightRepository {
    async fn save_json(&self, run: &InsightsRun, path: &Path) -> Result<(), PublishError> {
        let json_string = serde_json::to_string_pretty(run).map_err(|e| {
            PublishError::SerializationFailed(format!("JSON serialization failed: {e}"))
        })?;
        Self::write(path, json_string).await
    }

    async fn save_toml(&self, run: &InsightsRun, path: &Path) -> Result<(), PublishError> {
        let toml_string = toml::to_string_pretty(run).map_err(|e| {
            PublishError::SerializationFailed(format!("TOML serialization failed: {e}"))
        })?;
        Self::write(path, toml_string).await
    }

    async fn load_json(&self, path: &Path) -> Result<InsightsRun, PublishError> {
        let json_string = Self::read(path).await?;
        serde_json::from_str(&json_string).map_err(|e| {
            PublishError::SerializationFailed(format!("JSON deserialization failed: {e}"))
        })
    }

    async fn load_toml(&self, path: &Path) -> Result<InsightsRun, PublishError> {
        let toml_string = Self::read(path).await?;
        toml::from_str(&toml_string).map_err(|e| {
            PublishError::SerializationFailed(format!("TOML deserialization failed: {e}"))
        })
    }
}

/// Publisher that saves every run into an output directory
pub struct FileInsightPublisher {
    repository: FileInsightRepository,
    directory: PathBuf,
    format: OutputFormat,
}

impl FileInsightPublisher {
    /// Create a new file publisher writing into `directory`
    pub fn new(directory: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            repository: FileInsightRepository::new(),
            directory: directory.into(),
            format,
        }
    }

    /// Create from output settings, if a directory is configured
    pub fn from_output_config(config: &OutputConfig) -> Option<Self> {
        config
            .directory
            .as_ref()
            .map(|dir| Self::new(dir, config.format))
    }

    /// Path a run is saved to: `<hostname>_insights_<generated_at>.<ext>`
    pub fn path_for(&self, run: &InsightsRun) -> PathBuf {
        let hostname: String = run
            .hostname
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.directory.join(format!(
            "{hostname}_insights_{}.{}",
            run.generated_at,
            self.format.extension()
        ))
    }
}

#[async_trait]
impl InsightPublisher for FileInsightPublisher {
    async fn publish(&self, run: &InsightsRun, _config: &PublishConfig) -> Result<(), PublishError> {
        let path = self.path_for(run);
        match self.format {
            OutputFormat::Json => self.repository.save_json(run, &path).await?,
            OutputFormat::Toml => self.repository.save_toml(run, &path).await?,
        }
        info!("Insights saved to {}", path.display());
        Ok(())
    }

    async fn test_connectivity(&self, _config: &PublishConfig) -> Result<bool, PublishError> {
        match fs::create_dir_all(&self.directory).await {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ruleengine::{
        build_insights, Diagnostic, EvalNode, EvalOperation, Insights, KnowledgeBase,
        Recommendation, Rule,
    };
    use assert_fs::prelude::*;
    use predicates::prelude::*;
    use tempfile::tempdir;

    fn create_test_run() -> InsightsRun {
        let rules = [
            Rule {
                id: "SAP_HANA_INSIGHTS_BACKUP".to_string(),
                recommendations: vec![Recommendation {
                    id: "rec_investigate_failed_backups".to_string(),
                    description: String::new(),
                    trigger: Some(EvalNode::compare(EvalOperation::Gte, "2", "1")),
                }],
                ..Default::default()
            },
            Rule {
                id: "SAP_HANA_INSIGHTS_EMPTY".to_string(),
                ..Default::default()
            },
        ];
        let mut insights = Insights::new();
        for rule in &rules {
            build_insights(rule, &KnowledgeBase::new(), &mut insights);
        }
        let diagnostics = vec![Diagnostic {
            rule_id: "SAP_HANA_INSIGHTS_BACKUP".to_string(),
            recommendation_id: "rec_other".to_string(),
            message: "knowledge base key not found: q:ID".to_string(),
        }];
        InsightsRun::new("hana01.example.com".to_string(), 2, 3, insights, diagnostics)
    }

    #[tokio::test]
    async fn test_save_load_json() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("run.json");

        let repository = FileInsightRepository::new();
        let saved = create_test_run();

        repository.save_json(&saved, &file_path).await.unwrap();
        let loaded = repository.load_json(&file_path).await.unwrap();

        assert_eq!(saved, loaded);
    }

    #[tokio::test]
    async fn test_save_load_toml() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("run.toml");

        let repository = FileInsightRepository::new();
        let saved = create_test_run();

        repository.save_toml(&saved, &file_path).await.unwrap();
        let loaded = repository.load_toml(&file_path).await.unwrap();

        assert_eq!(saved.hostname, loaded.hostname);
        assert_eq!(saved.insights, loaded.insights);
        assert_eq!(saved.diagnostics, loaded.diagnostics);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = tempdir().unwrap();
        let result = FileInsightRepository::new()
            .load_json(&temp_dir.path().join("absent.json"))
            .await;
        assert!(matches!(result, Err(PublishError::FileFailed(_))));
    }

    #[tokio::test]
    async fn test_publisher_creates_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output_dir = temp.child("nested").child("runs");

        let publisher = FileInsightPublisher::new(output_dir.path(), OutputFormat::Json);
        let run = create_test_run();
        publisher
            .publish(&run, &PublishConfig::default())
            .await
            .unwrap();

        let file_name = format!("hana01_example_com_insights_{}.json", run.generated_at);
        output_dir
            .child(file_name)
            .assert(predicate::str::contains("rec_investigate_failed_backups"));
    }

    #[test]
    fn test_from_output_config_requires_directory() {
        assert!(FileInsightPublisher::from_output_config(&OutputConfig::default()).is_none());

        let config = OutputConfig {
            format: OutputFormat::Toml,
            directory: Some(PathBuf::from("/var/lib/sapagent")),
        };
        let publisher = FileInsightPublisher::from_output_config(&config).unwrap();
        assert!(publisher
            .path_for(&create_test_run())
            .to_string_lossy()
            .ends_with(".toml"));
    }
}
