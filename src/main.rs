mod cli;
mod ui;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use caseflow::config::EngineConfig;
use caseflow::control;
use caseflow::pipeline_config::{self, PipelineConfigDraft};
use caseflow::services::Services;
use caseflow::state_machine::{Stage, WorkItem};
use cli::{Cli, Command, ConfigCommand};

/// `run --seed` input: an optional config to publish plus cases to create.
#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    pipeline_config: Option<PipelineConfigDraft>,
    #[serde(default)]
    cases: Vec<SeedCase>,
}

#[derive(Debug, Deserialize)]
struct SeedCase {
    title: String,
    /// Document to upload, relative to the seed file.
    #[serde(default)]
    file: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "caseflow=debug" } else { "caseflow=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = EngineConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let services = Services::from_config(&config);

    match cli.command {
        Command::Run { seed } => run(&services, seed.as_deref()).await,
        Command::Stages => {
            ui::print_stages(&control::stage_info());
            Ok(())
        }
        Command::Queue => {
            ui::print_queue(&control::queue_depths(services.records.as_ref()).await?);
            Ok(())
        }
        Command::Trigger { stage } => {
            let stage: Stage = stage.parse().map_err(|e: String| anyhow!(e))?;
            let engine = services.engine()?;
            ui::print_trigger(&engine.trigger_stage_check(stage).await?);
            Ok(())
        }
        Command::Advance { id } => {
            let result = control::force_advance(services.records.as_ref(), &id).await?;
            ui::print_force_advance(&id, &result);
            Ok(())
        }
        Command::Config(command) => config_command(&services, command).await,
    }
}

async fn run(services: &Services, seed: Option<&Path>) -> Result<()> {
    let lifecycle = services.lifecycle()?;
    let monitor = ui::EngineMonitor::start();

    if let Some(path) = seed {
        let created = load_seed(services, path).await?;
        monitor.note(&format!("seeded {created} cases from {}", path.display()));
    }

    let engine = lifecycle.engine().clone();
    let records = services.records.clone();
    let until_ctrl_c = async {
        let mut ticker = tokio::time::interval(Duration::from_millis(500));
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        tracing::error!(error = %e, "failed to listen for Ctrl-C");
                    }
                    break;
                }
                _ = ticker.tick() => {
                    let depths = control::queue_depths(records.as_ref()).await.ok();
                    monitor.update(&engine.status(), depths.as_ref());
                }
            }
        }
    };

    lifecycle.run_until(until_ctrl_c).await;
    monitor.finish(true);
    Ok(())
}

async fn load_seed(services: &Services, path: &Path) -> Result<usize> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let seed: SeedFile = serde_json::from_str(&contents)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    if let Some(draft) = seed.pipeline_config {
        pipeline_config::publish(services.configs.as_ref(), draft).await?;
    }

    let mut created = 0;
    for case in seed.cases {
        match case.file {
            Some(file) => {
                let full = base.join(&file);
                let content = tokio::fs::read(&full)
                    .await
                    .with_context(|| format!("reading {}", full.display()))?;
                let file_name = file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("document");
                services.intake(&case.title, file_name, content).await?;
            }
            None => {
                services.records.create(WorkItem::new(case.title)).await?;
            }
        }
        created += 1;
    }
    Ok(created)
}

async fn config_command(services: &Services, command: ConfigCommand) -> Result<()> {
    let configs = services.configs.as_ref();
    match command {
        ConfigCommand::Show => match configs.latest().await? {
            Some(config) => ui::print_config(&config),
            None => println!("No pipeline config published yet."),
        },
        ConfigCommand::History { limit } => ui::print_history(&configs.history(limit).await?),
        ConfigCommand::Publish { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let draft: PipelineConfigDraft = serde_json::from_str(&contents)?;
            let config = pipeline_config::publish(configs, draft).await?;
            ui::print_config(&config);
        }
        ConfigCommand::Reset => {
            let removed = configs.delete_all().await?;
            println!("Removed {removed} pipeline config versions.");
        }
    }
    Ok(())
}
