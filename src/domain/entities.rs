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

use super::ruleengine::{Diagnostic, InsightSample, Insights};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Result of one evaluation cycle (root aggregate)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsightsRun {
    /// Seconds since the Unix epoch when the cycle finished
    pub generated_at: u64,
    /// Host the agent ran on
    pub hostname: String,
    /// Number of rules evaluated
    pub rules_evaluated: usize,
    /// Number of knowledge base keys collected
    pub knowledge_base_keys: usize,
    /// Recommendation outcomes per rule
    pub insights: Insights,
    /// Errors behind forced `false` results (strict mode only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl InsightsRun {
    pub fn new(
        hostname: String,
        rules_evaluated: usize,
        knowledge_base_keys: usize,
        insights: Insights,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let generated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            generated_at,
            hostname,
            rules_evaluated,
            knowledge_base_keys,
            insights,
            diagnostics,
        }
    }

    /// Flattened samples for telemetry export
    pub fn samples(&self) -> Vec<InsightSample> {
        self.insights.samples()
    }
}

/// HANA connection settings for the query client
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HanaConnection {
    /// Database host
    pub host: String,
    /// SQL port (3<instance>15 for the system DB, 3<instance>41+ for tenants)
    pub port: u16,
    /// Tenant database name
    pub database: Option<String>,
    /// Database user (ignored when a userstore key is set)
    pub user: Option<String>,
    /// Environment variable holding the password
    pub password_env: Option<String>,
    /// hdbuserstore key to authenticate with
    pub userstore_key: Option<String>,
    /// Path to the hdbsql client
    pub hdbsql_path: String,
}

impl Default for HanaConnection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 30015,
            database: None,
            user: None,
            password_env: None,
            userstore_key: None,
            hdbsql_path: "hdbsql".to_string(),
        }
    }
}

/// Configuration for an evaluation cycle
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct InsightsConfig {
    /// Directory of rule files; built-in rules are used when unset
    pub rules_dir: Option<PathBuf>,
    /// Skip invalid rules and collect evaluation diagnostics
    pub strict: bool,
    /// Seconds between cycles in run mode
    pub interval_secs: u64,
    /// Timeout for commands in seconds
    pub command_timeout: u64,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            rules_dir: None,
            strict: false,
            interval_secs: 3600,
            command_timeout: 30,
        }
    }
}

/// Configuration for publishing insights
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PublishConfig {
    /// Endpoint URL
    pub endpoint: String,
    /// Authentication token
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    /// Environment variable holding the authentication token
    pub auth_token_env: Option<String>,
    /// Skip TLS verification
    pub skip_tls_verify: bool,
    /// Additional labels/metadata
    pub labels: HashMap<String, String>,
}

impl PublishConfig {
    /// Bearer token, taken from `auth_token_env` when not set directly
    pub fn resolve_token(&self) -> Option<String> {
        self.auth_token.clone().or_else(|| {
            self.auth_token_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
                .filter(|token| !token.is_empty())
        })
    }
}

/// Output format options
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format
    #[default]
    Json,
    /// TOML format
    Toml,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Toml => "toml",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "toml" => Ok(OutputFormat::Toml),
            _ => Err("Output format must be either 'toml' or 'json'".to_string()),
        }
    }
}

/// Local output settings
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// File format for saved runs
    pub format: OutputFormat,
    /// Directory to save runs into; runs are only logged when unset
    pub directory: Option<PathBuf>,
}

/// Complete agent configuration file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Command retry count
    pub retry_count: u32,
    pub hana: HanaConnection,
    pub insights: InsightsConfig,
    pub publish: PublishConfig,
    pub output: OutputConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            retry_count: 2,
            hana: HanaConnection::default(),
            insights: InsightsConfig::default(),
            publish: PublishConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_defaults_from_partial_toml() {
        let config: AgentConfig = toml::from_str(
            r#"
            retry_count = 0

            [hana]
            host = "hana01"
            userstore_key = "INSIGHTS"

            [insights]
            strict = true

            [output]
            format = "toml"
            "#,
        )
        .unwrap();

        assert_eq!(config.hana.host, "hana01");
        assert_eq!(config.hana.port, 30015);
        assert_eq!(config.hana.userstore_key.as_deref(), Some("INSIGHTS"));
        assert!(config.insights.strict);
        assert_eq!(config.insights.interval_secs, 3600);
        assert_eq!(config.output.format, OutputFormat::Toml);
        assert_eq!(config.retry_count, 0);
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("toml".parse::<OutputFormat>().unwrap(), OutputFormat::Toml);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_auth_token_is_not_serialized() {
        let config = PublishConfig {
            endpoint: "https://insights.example.com".to_string(),
            auth_token: Some("secret".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_resolve_token_prefers_explicit_token() {
        std::env::set_var("SAPAGENT_TEST_PUBLISH_TOKEN", "from-env");
        let mut config = PublishConfig {
            auth_token_env: Some("SAPAGENT_TEST_PUBLISH_TOKEN".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_token().as_deref(), Some("from-env"));

        config.auth_token = Some("explicit".to_string());
        assert_eq!(config.resolve_token().as_deref(), Some("explicit"));

        config.auth_token = None;
        config.auth_token_env = Some("SAPAGENT_TEST_UNSET_TOKEN".to_string());
        assert!(config.resolve_token().is_none());
    }
}
