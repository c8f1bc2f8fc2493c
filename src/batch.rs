use crate::pipeline::{Pipeline, RunSpec};
use crate::supervisor::Supervisor;
use anyhow::{Context, Result};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const CONFIG_EXTENSIONS: [&str; 3] = ["config", "yaml", "yml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BatchMode {
    /// One direct run per identifier in a CSV file.
    Normal,
    /// One configured run per file in a folder.
    Custom,
}

/// Identifiers from the first column of a header-less CSV.
pub fn read_identifiers(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(format!("Failed to open identifier table {:?}", path))?;
    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record.context(format!("Malformed row in {:?}", path))?;
        if let Some(id) = record.get(0).map(str::trim).filter(|id| !id.is_empty()) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

/// Run configuration files directly inside `dir`, sorted by path.
pub fn list_config_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Config folder not found: {:?}", dir);
    }
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files = Vec::new();
    for ext in CONFIG_EXTENSIONS {
        let pattern = format!("{}/*.{}", base, ext);
        for entry in glob::glob(&pattern).context("Invalid config glob")? {
            files.push(entry?);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn record_failure(&mut self, label: impl Into<String>, reason: impl ToString) {
        let label = label.into();
        let reason = reason.to_string();
        error!("{} failed: {}", label, reason);
        self.failed.push((label, reason));
    }
}

/// Supervises each run separately, at most `threads` at a time.
/// A failed run never stops its siblings.
pub async fn run_all(
    pipeline: Arc<Pipeline>,
    supervisor: Supervisor,
    specs: Vec<RunSpec>,
    threads: usize,
    mut report: BatchReport,
) -> BatchReport {
    let started = Instant::now();
    let permits = Arc::new(Semaphore::new(threads.max(1)));
    let supervisor = Arc::new(supervisor);
    let mut set = JoinSet::new();

    info!("Starting batch of {} runs on {} threads", specs.len(), threads.max(1));
    for spec in specs {
        let permits = Arc::clone(&permits);
        let pipeline = Arc::clone(&pipeline);
        let supervisor = Arc::clone(&supervisor);
        set.spawn(async move {
            let key = spec.key.clone();
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => supervisor.run(pipeline, spec).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            (key, outcome)
        });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((key, Ok(run))) => {
                info!("{} finished, {} favorable candidates", key, run.favorable());
                report.succeeded.push(key);
            }
            Ok((key, Err(reason))) => report.record_failure(key, reason),
            Err(e) => report.record_failure("batch task", e),
        }
    }

    report.elapsed += started.elapsed();
    info!(
        "Batch done: {} succeeded, {} failed, elapsed {:.1}s",
        report.succeeded.len(),
        report.failed.len(),
        report.elapsed.as_secs_f64()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_first_column_without_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.csv");
        fs::write(&path, "1C8K\n 2HYY ,kinase\n\n3ERT\n").unwrap();
        assert_eq!(read_identifiers(&path).unwrap(), ["1C8K", "2HYY", "3ERT"]);
    }

    #[test]
    fn lists_only_run_configs() {
        let dir = tempdir().unwrap();
        for name in ["b.yaml", "a.config", "c.yml", "notes.txt", "d.json"] {
            fs::write(dir.path().join(name), "mode: manual_upload\n").unwrap();
        }
        let names: Vec<String> = list_config_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a.config", "b.yaml", "c.yml"]);
    }

    #[test]
    fn missing_folder_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(list_config_files(&dir.path().join("absent")).is_err());
    }
}
