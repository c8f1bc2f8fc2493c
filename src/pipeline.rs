//! One run, from structure retrieval to the ranked candidate table.

use crate::answer::{validate_answer, Verdict};
use crate::candidates::{candidates_from_csv, candidates_to_csv, scored_from_csv, scored_to_csv, Candidate};
use crate::capabilities::Toolbox;
use crate::checkpoint::{Artifact, CheckpointStore};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::scoring::score_candidates;
use crate::stages::Stages;
use crate::structure;
use crate::supervisor::{backoff_delay, MAX_BACKOFF};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    Direct {
        structure_id: String,
    },
    ManualUpload {
        structure_path: PathBuf,
        summary: Option<String>,
    },
    SequenceSearch {
        sequence: String,
        summary: Option<String>,
    },
}

impl RunMode {
    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Direct { .. } => "direct",
            RunMode::ManualUpload { .. } => "manual upload",
            RunMode::SequenceSearch { .. } => "sequence search",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    pub key: String,
    pub mode: RunMode,
}

impl RunSpec {
    pub fn direct(structure_id: &str) -> Self {
        Self {
            key: structure_id.to_string(),
            mode: RunMode::Direct {
                structure_id: structure_id.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub template_path: PathBuf,
    pub max_answer_attempts: u32,
    pub answer_backoff: Duration,
    pub docking_exhaustiveness: u32,
    pub reference_exhaustiveness: u32,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            template_path: PathBuf::from(&config.template_path),
            max_answer_attempts: config.max_answer_attempts.max(1),
            answer_backoff: Duration::from_secs(config.restart_backoff_secs),
            docking_exhaustiveness: config.docking_exhaustiveness,
            reference_exhaustiveness: config.reference_exhaustiveness,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub key: String,
    pub table: PathBuf,
    pub candidates: Vec<Candidate>,
}

impl RunReport {
    pub fn favorable(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| c.outcome.is_favorable())
            .count()
    }
}

pub struct Pipeline {
    stages: Stages,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(store: CheckpointStore, tools: Toolbox, settings: PipelineSettings) -> Self {
        Self {
            stages: Stages::new(store, tools),
            settings,
        }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.stages.store
    }

    pub async fn run(&self, spec: &RunSpec) -> Result<RunReport> {
        let key = spec.key.as_str();
        let store = self.store();
        let final_path = store.path(key, Artifact::FinalTable);
        if final_path.exists() {
            info!("[{}] already complete: {:?}", key, final_path);
            let text = store.read_to_string(&final_path).await?;
            let candidates =
                scored_from_csv(&text).map_err(|e| PipelineError::stage("read ranked table", key, e))?;
            return Ok(RunReport {
                key: key.to_string(),
                table: final_path,
                candidates,
            });
        }

        info!("[{}] starting {} run", key, spec.mode.label());
        let structure = match &spec.mode {
            RunMode::Direct { structure_id } => self.prepare_direct(key, structure_id).await?,
            RunMode::ManualUpload {
                structure_path,
                summary,
            } => {
                self.prepare_upload(key, structure_path, summary.as_deref())
                    .await?
            }
            RunMode::SequenceSearch { sequence, summary } => {
                self.prepare_search(key, sequence, summary.as_deref())
                    .await?
            }
        };

        self.stages
            .ensure_prompt(key, &self.settings.template_path)
            .await?;
        let candidates = self.accepted_candidates(key).await?;
        let scored = score_candidates(
            &self.stages,
            key,
            &structure,
            candidates,
            self.settings.docking_exhaustiveness,
        )
        .await?;

        let table = scored_to_csv(&scored).map_err(|e| PipelineError::stage("write ranked table", key, e))?;
        let table = store.write_atomic(&final_path, table).await?;
        let report = RunReport {
            key: key.to_string(),
            table: table.into_path(),
            candidates: scored,
        };
        info!(
            "[{}] done: {} of {} candidates bind favorably, table at {:?}",
            key,
            report.favorable(),
            report.candidates.len(),
            report.table
        );
        Ok(report)
    }

    async fn prepare_direct(&self, key: &str, id: &str) -> Result<PathBuf> {
        let structure = self.stages.ensure_structure(key, id).await?;
        self.stages.ensure_sequence_download(key, id).await?;
        self.stages.ensure_summary_fetched(key, id).await?;
        self.stages
            .ensure_interactions(key, structure.path())
            .await?;
        Ok(structure.into_path())
    }

    async fn prepare_upload(&self, key: &str, structure_path: &Path, summary: Option<&str>) -> Result<PathBuf> {
        if !structure_path.is_file() {
            return Err(PipelineError::Config(format!(
                "uploaded structure {:?} does not exist",
                structure_path
            )));
        }
        self.stages
            .ensure_sequence_from_structure(key, structure_path)
            .await?;

        match summary {
            Some(text) => {
                self.stages.ensure_summary_text(key, text).await?;
            }
            None if !self.store().exists(key, Artifact::Summary) => {
                match self.similar_structure(key, structure_path).await? {
                    Some(id) => {
                        self.stages.ensure_summary_fetched(key, &id).await?;
                    }
                    None => warn!("[{}] no summary available", key),
                }
            }
            None => {}
        }

        if !self.store().exists(key, Artifact::Interactions) {
            let complex = self.interaction_target(key, structure_path).await?;
            self.stages.ensure_interactions(key, &complex).await?;
        }
        Ok(structure_path.to_path_buf())
    }

    async fn prepare_search(&self, key: &str, sequence: &str, summary: Option<&str>) -> Result<PathBuf> {
        self.stages.ensure_sequence_text(key, sequence).await?;
        let id = self
            .stages
            .ensure_search_hit(key, sequence)
            .await?
            .ok_or_else(|| PipelineError::NoStructure(key.to_string()))?;
        let structure = self.stages.ensure_structure(key, &id).await?;
        match summary {
            Some(text) => self.stages.ensure_summary_text(key, text).await?,
            None => self.stages.ensure_summary_fetched(key, &id).await?,
        };
        self.stages
            .ensure_interactions(key, structure.path())
            .await?;
        Ok(structure.into_path())
    }

    /// Most similar database entry to the first chain of `structure_path`.
    async fn similar_structure(&self, key: &str, structure_path: &Path) -> Result<Option<String>> {
        let pdb = self.store().read_to_string(structure_path).await?;
        let Some((_, sequence)) = structure::chain_sequences(&pdb).into_iter().next() else {
            warn!("[{}] no chain sequence to search with", key);
            return Ok(None);
        };
        self.stages.ensure_search_hit(key, &sequence).await
    }

    /// Structure to extract interactions from. An uploaded structure without
    /// a ligand borrows one from its most similar entry, docked into place.
    async fn interaction_target(&self, key: &str, structure_path: &Path) -> Result<PathBuf> {
        let pdb = self.store().read_to_string(structure_path).await?;
        if structure::has_ligand(&pdb) {
            return Ok(structure_path.to_path_buf());
        }
        if let Some(complex) = self.store().lookup(key, Artifact::ReferenceComplex) {
            return Ok(complex.into_path());
        }

        info!("[{}] uploaded structure has no ligand, borrowing one from a similar entry", key);
        let Some(id) = self.similar_structure(key, structure_path).await? else {
            return Ok(structure_path.to_path_buf());
        };
        let similar = self.stages.ensure_structure(key, &id).await?;
        let Some(ligand_pdb) = self
            .stages
            .ensure_reference_ligand(key, similar.path())
            .await?
        else {
            return Ok(structure_path.to_path_buf());
        };
        let ligand = self
            .stages
            .ensure_reference_ligand_pdbqt(key, ligand_pdb.path())
            .await?;
        let receptor = self.stages.ensure_receptor(key, structure_path).await?;

        let docked = self.store().path(key, Artifact::ReferenceDocking);
        let outcome = self
            .stages
            .dock(
                key,
                receptor.path(),
                ligand.path(),
                docked.clone(),
                self.settings.reference_exhaustiveness,
            )
            .await?;
        if !outcome.is_favorable() {
            warn!("[{}] reference ligand does not bind favorably: {}", key, outcome);
            return Ok(structure_path.to_path_buf());
        }
        let complex = self
            .stages
            .ensure_complex(
                key,
                receptor.path(),
                &docked,
                self.store().path(key, Artifact::ReferenceComplex),
            )
            .await?;
        Ok(complex.into_path())
    }

    /// Validated candidate list, re-querying the model while its answers are
    /// rejected.
    async fn accepted_candidates(&self, key: &str) -> Result<Vec<Candidate>> {
        let store = self.store();
        if let Some(table) = store.lookup(key, Artifact::CandidateTable) {
            let text = store.read_to_string(table.path()).await?;
            return candidates_from_csv(&text).map_err(|e| PipelineError::stage("read candidate table", key, e));
        }

        let max = self.settings.max_answer_attempts;
        let mut last_reason = String::new();
        for attempt in 1..=max {
            let answer = self.stages.ensure_answer(key).await?;
            let text = store.read_to_string(answer.path()).await?;
            match validate_answer(answer.path(), &text) {
                Verdict::Accepted(candidates) => {
                    info!("[{}] answer accepted with {} candidates", key, candidates.len());
                    let table = candidates_to_csv(&candidates)
                        .map_err(|e| PipelineError::stage("write candidate table", key, e))?;
                    store
                        .write_atomic(&store.path(key, Artifact::CandidateTable), table)
                        .await?;
                    return Ok(candidates);
                }
                Verdict::Rejected { path, reason } => {
                    let rejection = PipelineError::AnswerRejected {
                        key: key.to_string(),
                        path,
                        reason: reason.clone(),
                    };
                    warn!("{} (attempt {}/{})", rejection, attempt, max);
                    self.stages.discard_answer(key).await?;
                    last_reason = reason;
                    if attempt < max {
                        tokio::time::sleep(backoff_delay(self.settings.answer_backoff, attempt, MAX_BACKOFF)).await;
                    }
                }
            }
        }
        Err(PipelineError::AnswerAttemptsExhausted {
            key: key.to_string(),
            attempts: max,
            reason: last_reason,
        })
    }
}
