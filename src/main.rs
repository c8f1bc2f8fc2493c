use anyhow::Context;
use clap::{Parser, Subcommand};
use drug_realign::batch::{self, BatchMode, BatchReport};
use drug_realign::checkpoint::CheckpointStore;
use drug_realign::config::Config;
use drug_realign::pipeline::{Pipeline, PipelineSettings, RunSpec};
use drug_realign::run_config::RunConfig;
use drug_realign::supervisor::Supervisor;
use drug_realign::tools::toolbox_from_config;
use log::{error, info};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Repurposing run for one PDB entry.
    Run {
        #[arg(long)]
        pdb_id: Option<String>,
    },
    /// Run described by a YAML run configuration.
    Custom { config_file: PathBuf },
    Batch {
        #[arg(long, value_enum, default_value_t = BatchMode::Normal)]
        mode: BatchMode,
        #[arg(long, default_value = "./batch_input/DrugReAlign/input.csv")]
        csv: PathBuf,
        #[arg(long, default_value = "./batch_input/DrugReAlign-Custom Data")]
        config_folder: PathBuf,
        #[arg(long, default_value_t = 12)]
        threads: usize,
    },
}

fn prompt_pdb_id() -> anyhow::Result<String> {
    print!("Please enter the PDB ID: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read PDB ID from stdin")?;
    let id = line.trim().to_uppercase();
    if id.is_empty() {
        anyhow::bail!("No PDB ID given");
    }
    Ok(id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("Starting drug-realign...");

    if !args.work_dir.exists() {
        std::fs::create_dir_all(&args.work_dir).context("Failed to create working directory")?;
    }
    let work_dir = std::fs::canonicalize(&args.work_dir).context(format!(
        "Failed to canonicalize work dir: {:?}",
        args.work_dir
    ))?;
    info!(
        "Work dir provided: {:?} -> canonical: {:?}",
        args.work_dir, work_dir
    );

    let config = Config::load(args.config.as_ref())?;
    config.validate()?;
    info!("Configuration loaded.");

    let tools = toolbox_from_config(&config)?;
    let pipeline = Arc::new(Pipeline::new(
        CheckpointStore::new(&work_dir),
        tools,
        PipelineSettings::from_config(&config),
    ));
    let supervisor = Supervisor::new(
        config.max_run_attempts,
        Duration::from_secs(config.restart_backoff_secs),
    );

    match args.command {
        Commands::Run { pdb_id } => {
            let id = match pdb_id {
                Some(id) => id.trim().to_uppercase(),
                None => prompt_pdb_id()?,
            };
            let report = supervisor.run(pipeline, RunSpec::direct(&id)).await?;
            info!("Ranked candidates written to {:?}", report.table);
        }
        Commands::Custom { config_file } => {
            let base_dir = config_file
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let spec = RunConfig::load(&config_file)?.into_run_spec(&base_dir)?;
            let report = supervisor.run(pipeline, spec).await?;
            info!("Ranked candidates written to {:?}", report.table);
        }
        Commands::Batch {
            mode,
            csv,
            config_folder,
            threads,
        } => {
            let mut report = BatchReport::default();
            let specs = match mode {
                BatchMode::Normal => batch::read_identifiers(&csv)?
                    .iter()
                    .map(|id| RunSpec::direct(&id.to_uppercase()))
                    .collect(),
                BatchMode::Custom => {
                    let mut specs = Vec::new();
                    for file in batch::list_config_files(&config_folder)? {
                        match RunConfig::load(&file).and_then(|c| c.into_run_spec(&config_folder)) {
                            Ok(spec) => specs.push(spec),
                            Err(e) => report.record_failure(file.display().to_string(), e),
                        }
                    }
                    specs
                }
            };
            let report = batch::run_all(pipeline, supervisor, specs, threads, report).await;
            if !report.failed.is_empty() {
                error!("{} runs failed", report.failed.len());
            }
        }
    }

    Ok(())
}
