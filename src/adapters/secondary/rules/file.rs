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

//! Rule definitions loaded from a directory of JSON and TOML files

use crate::domain::ruleengine::{Rule, RuleDocument};
use crate::domain::RuleError;
use crate::ports::RuleRepository;
use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Reads every `*.json` and `*.toml` file in a directory, in file name order
#[derive(Debug, Default)]
pub struct FileRuleRepository;

impl FileRuleRepository {
    pub fn new() -> Self {
        Self
    }

    /// Decode one rule file based on its extension
    pub async fn load_file(&self, path: &Path) -> Result<Vec<Rule>, RuleError> {
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).await.map_err(|e| RuleError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;

        let document: RuleDocument = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&contents).map_err(|e| e.to_string()),
            _ => serde_json::from_str(&contents).map_err(|e| e.to_string()),
        }
        .map_err(|message| RuleError::Parse {
            path: display,
            message,
        })?;

        Ok(document.into_rules())
    }

    async fn rule_files(dir: &Path) -> Result<Vec<PathBuf>, RuleError> {
        let io_error = |e: std::io::Error| RuleError::Io {
            path: dir.display().to_string(),
            message: e.to_string(),
        };

        let mut entries = fs::read_dir(dir).await.map_err(io_error)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            let is_rule_file = matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("json") | Some("toml")
            );
            if is_rule_file && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl RuleRepository for FileRuleRepository {
    async fn load_rules(&self, dir: &Path) -> Result<Vec<Rule>, RuleError> {
        let mut rules = Vec::new();
        for path in Self::rule_files(dir).await? {
            let loaded = self.load_file(&path).await?;
            debug!("Loaded {} rules from {}", loaded.len(), path.display());
            rules.extend(loaded);
        }
        info!("Loaded {} rules from {}", rules.len(), dir.display());
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const JSON_RULES: &str = r#"[
        {"id": "b_rule", "recommendations": [{"id": "rec", "trigger": {"operation": "EQ", "lhs": "1", "rhs": "1"}}]},
        {"id": "c_rule"}
    ]"#;

    const TOML_RULE: &str = r#"
        id = "a_rule"

        [[queries]]
        name = "q_hosts"
        columns = ["HOST"]
    "#;

    #[tokio::test]
    async fn test_load_rules_in_file_name_order() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("20_more.json"), JSON_RULES).unwrap();
        std::fs::write(dir.path().join("10_hosts.toml"), TOML_RULE).unwrap();
        std::fs::write(dir.path().join("README.md"), "not a rule").unwrap();

        let rules = FileRuleRepository::new()
            .load_rules(dir.path())
            .await
            .unwrap();

        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a_rule", "b_rule", "c_rule"]);
        assert_eq!(rules[0].queries[0].columns, vec!["HOST"]);
    }

    #[tokio::test]
    async fn test_parse_error_names_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let err = FileRuleRepository::new()
            .load_rules(dir.path())
            .await
            .unwrap_err();
        match err {
            RuleError::Parse { path, .. } => assert!(path.ends_with("broken.json")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let err = FileRuleRepository::new()
            .load_rules(&dir.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, RuleError::Io { .. }));
    }
}
