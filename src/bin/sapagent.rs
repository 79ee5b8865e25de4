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

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use sapagent::{
    run_periodic, shutdown_signal, AgentConfig, ConfigurationProvider, ContainerConfig,
    FileConfigurationProvider, FileInsightPublisher, InsightPublisher, InsightsConfig,
    InsightsRun, InsightsService, OutputFormat, PublishConfig, RecordedQueryExecutor,
    ServiceContainer,
};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sapagent", version, about = "Evaluate SAP HANA Insights rules")]
struct Cli {
    /// Agent configuration file (TOML)
    #[arg(long, global = true, env = "SAPAGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query HANA and evaluate the rules every `interval_secs`
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Evaluate rules against recorded query results
    Evaluate {
        /// JSON file mapping query names to result rows
        #[arg(long)]
        results: PathBuf,

        /// Rules directory (defaults to the configured or built-in rules)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Collect diagnostics and skip invalid rules
        #[arg(long)]
        strict: bool,

        /// Output format (toml or json)
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },
    /// Check rule definitions without running any query
    ValidateRules {
        /// Rules directory (defaults to the configured or built-in rules)
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Print the effective configuration
    PrintConfig,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

async fn load_config(cli: &Cli) -> Result<AgentConfig, Box<dyn Error>> {
    Ok(match &cli.config {
        Some(path) => FileConfigurationProvider::load(path)
            .await?
            .agent_config()
            .clone(),
        None => AgentConfig::default(),
    })
}

fn insights_config(config: &AgentConfig, rules: Option<PathBuf>, strict: bool) -> InsightsConfig {
    let mut insights = config.insights.clone();
    if rules.is_some() {
        insights.rules_dir = rules;
    }
    insights.strict |= strict;
    insights
}

fn render(run: &InsightsRun, format: OutputFormat) -> Result<String, Box<dyn Error>> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(run)?,
        OutputFormat::Toml => toml::to_string_pretty(run)?,
    })
}

async fn run_cycle(
    service: &dyn InsightsService,
    insights: &InsightsConfig,
    publish: &PublishConfig,
    file_publisher: Option<&FileInsightPublisher>,
) -> Result<(), Box<dyn Error>> {
    let run = service.run_insights(insights).await?;
    service.publish_insights(&run, publish).await?;
    if let Some(publisher) = file_publisher {
        publisher.publish(&run, publish).await?;
    }
    Ok(())
}

async fn run(config: AgentConfig, once: bool) -> Result<(), Box<dyn Error>> {
    let container = ServiceContainer::new(ContainerConfig::from_agent_config(&config));
    let provider = FileConfigurationProvider::new(config);

    let missing = container
        .validate_dependencies(provider.get_connection().await?)
        .await?;
    if !missing.is_empty() {
        warn!("Missing dependencies: {}", missing.join(", "));
    }

    let publish = provider.get_publish_config().await?;
    if let Some(publish) = &publish {
        if !container.check_publish_endpoint(publish).await? {
            warn!("Publish endpoint {} is not reachable", publish.endpoint);
        }
    }
    let publish = publish.unwrap_or_default();

    let service = container.create_insights_service(&provider).await?;
    let insights = provider.get_insights_config().await?;
    let file_publisher =
        FileInsightPublisher::from_output_config(&provider.get_output_config().await?);

    let service = service.as_ref();
    let insights = &insights;
    let publish = &publish;
    let file_publisher = file_publisher.as_ref();

    if once {
        return run_cycle(service, insights, publish, file_publisher).await;
    }

    let period = Duration::from_secs(insights.interval_secs.max(1));
    info!("Evaluating insights every {}s", period.as_secs());
    run_periodic(period, shutdown_signal(), move || async move {
        if let Err(e) = run_cycle(service, insights, publish, file_publisher).await {
            error!("Insights cycle failed: {e}");
        }
    })
    .await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(&cli).await?;

    match cli.command {
        Command::Run { once } => run(config, once).await,
        Command::Evaluate {
            results,
            rules,
            strict,
            format,
        } => {
            let container = ServiceContainer::new(ContainerConfig::from_agent_config(&config));
            let recording = RecordedQueryExecutor::from_file(&results).await?;
            let service = container.create_offline_service(recording)?;

            let run = service
                .run_insights(&insights_config(&config, rules, strict))
                .await?;
            println!("{}", render(&run, format)?);
            Ok(())
        }
        Command::ValidateRules { rules } => {
            let container = ServiceContainer::new(ContainerConfig::from_agent_config(&config));
            let service = container.create_offline_service(RecordedQueryExecutor::default())?;

            let errors = service
                .validate_rules(&insights_config(&config, rules, false))
                .await?;
            if errors.is_empty() {
                println!("All rules are valid");
                return Ok(());
            }
            for err in &errors {
                println!("{err}");
            }
            Err(format!("{} rule validation errors", errors.len()).into())
        }
        Command::PrintConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
