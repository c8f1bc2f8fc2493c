//! YAML run descriptions for uploaded structures and sequence queries.

use crate::error::{PipelineError, Result};
use crate::pipeline::{RunMode, RunSpec};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub mode: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub manual_upload: Option<ManualUploadSection>,
    #[serde(default)]
    pub sequence_search: Option<SequenceSearchSection>,
}

#[derive(Debug, Deserialize)]
pub struct ManualUploadSection {
    pub pdb_file_path: PathBuf,
    #[serde(default)]
    pub use_summary: bool,
    #[serde(default)]
    pub summary_info: Option<Mapping>,
}

#[derive(Debug, Deserialize)]
pub struct SequenceSearchSection {
    pub query_sequence: String,
    #[serde(default)]
    pub use_summary: bool,
    #[serde(default)]
    pub summary_info: Option<Mapping>,
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// `key: value` pairs in file order, joined by a newline and a space.
pub fn render_summary(info: &Mapping) -> String {
    info.iter()
        .map(|(k, v)| format!("{}: {}", scalar(k), scalar(v)))
        .collect::<Vec<_>>()
        .join("\n ")
}

fn user_summary(use_summary: bool, info: Option<&Mapping>) -> Result<Option<String>> {
    if !use_summary {
        return Ok(None);
    }
    info.map(|m| Some(render_summary(m))).ok_or_else(|| {
        PipelineError::Config("use_summary is set but summary_info is missing".to_string())
    })
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_yaml::from_str(&text)
            .map_err(|e| PipelineError::Config(format!("invalid run config {:?}: {}", path, e)))
    }

    /// Resolves the run key and mode. Relative structure paths are taken
    /// relative to `base_dir`.
    pub fn into_run_spec(self, base_dir: &Path) -> Result<RunSpec> {
        match self.mode.as_str() {
            "manual_upload" => {
                let section = self.manual_upload.ok_or_else(|| {
                    PipelineError::Config("mode manual_upload needs a manual_upload section".into())
                })?;
                let structure_path = if section.pdb_file_path.is_absolute() {
                    section.pdb_file_path.clone()
                } else {
                    base_dir.join(&section.pdb_file_path)
                };
                let key = match self.name {
                    Some(name) => name,
                    None => structure_path
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .ok_or_else(|| {
                            PipelineError::Config(format!(
                                "cannot derive a run key from {:?}",
                                structure_path
                            ))
                        })?,
                };
                let summary = user_summary(section.use_summary, section.summary_info.as_ref())?;
                Ok(RunSpec {
                    key,
                    mode: RunMode::ManualUpload {
                        structure_path,
                        summary,
                    },
                })
            }
            "sequence_search" => {
                let section = self.sequence_search.ok_or_else(|| {
                    PipelineError::Config(
                        "mode sequence_search needs a sequence_search section".into(),
                    )
                })?;
                let sequence: String = section
                    .query_sequence
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                if sequence.is_empty() {
                    return Err(PipelineError::Config("query_sequence is empty".into()));
                }
                let key = self
                    .name
                    .unwrap_or_else(|| sequence.chars().take(4).collect());
                let summary = user_summary(section.use_summary, section.summary_info.as_ref())?;
                Ok(RunSpec {
                    key,
                    mode: RunMode::SequenceSearch { sequence, summary },
                })
            }
            other => Err(PipelineError::Config(format!("Unknown mode: {other}"))),
        }
    }
}
