use crate::candidates::{Candidate, DockingOutcome};
use crate::checkpoint::Artifact;
use crate::error::{PipelineError, Result};
use crate::stages::Stages;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Scores `candidates` against the structure in order: resolve each name,
/// convert it, prepare the receptor once, dock, then combine and visualize
/// the favorable poses. Per-candidate failures are recorded in the outcome.
pub async fn score_candidates(
    stages: &Stages,
    key: &str,
    structure: &Path,
    mut candidates: Vec<Candidate>,
    exhaustiveness: u32,
) -> Result<Vec<Candidate>> {
    let mut ligands = Vec::with_capacity(candidates.len());
    for candidate in candidates.iter_mut() {
        let ligand = prepare_ligand(stages, key, candidate).await?;
        if ligand.is_none() {
            info!("[{}] {} skipped: {}", key, candidate.name, candidate.outcome);
        }
        ligands.push(ligand);
    }

    let receptor = stages.ensure_receptor(key, structure).await?;

    for (candidate, ligand) in candidates.iter_mut().zip(ligands) {
        let Some(ligand) = ligand else { continue };
        let stem = candidate.file_stem();
        let out = stages.store.path(key, Artifact::Docking(&stem));
        candidate.outcome = stages
            .dock(key, receptor.path(), &ligand, out.clone(), exhaustiveness)
            .await?;
        info!("[{}] {}: {}", key, candidate.name, candidate.outcome);

        if candidate.outcome.is_favorable() {
            post_process(stages, key, &stem, receptor.path(), &out).await;
        }
    }
    Ok(candidates)
}

/// Ligand file for a candidate, or `None` with the reason in its outcome.
/// Retryable lookup failures abort the run.
async fn prepare_ligand(
    stages: &Stages,
    key: &str,
    candidate: &mut Candidate,
) -> Result<Option<PathBuf>> {
    // Names are looked up with path separators replaced, as they are stored.
    let stem = candidate.file_stem();
    if stem.is_empty() {
        candidate.outcome = DockingOutcome::Skipped("empty name".to_string());
        return Ok(None);
    }
    if let Some(existing) = stages.store.lookup(key, Artifact::CandidateLigand(&stem)) {
        return Ok(Some(existing.into_path()));
    }

    let smiles = match stages.tools.compounds.smiles_for_name(&stem).await {
        Ok(Some(smiles)) => smiles,
        Ok(None) => {
            candidate.outcome = DockingOutcome::Skipped("name did not resolve to a structure".to_string());
            return Ok(None);
        }
        Err(e) => {
            let err = PipelineError::from_tool("compound lookup", key, e);
            if !err.is_fatal() {
                return Err(err);
            }
            warn!("[{}] compound lookup for {} failed: {}", key, candidate.name, err);
            candidate.outcome = DockingOutcome::Skipped(format!("lookup failed: {err}"));
            return Ok(None);
        }
    };

    match stages.ensure_ligand_from_smiles(key, &stem, &smiles).await {
        Ok(ligand) => Ok(Some(ligand.into_path())),
        Err(e) => {
            warn!("[{}] conversion of {} failed: {}", key, candidate.name, e);
            candidate.outcome = DockingOutcome::Skipped(format!("conversion failed: {e}"));
            Ok(None)
        }
    }
}

/// Complex assembly and rendering. Failures leave the artifacts missing so a
/// later run retries them.
async fn post_process(stages: &Stages, key: &str, stem: &str, receptor: &Path, docked: &Path) {
    let out = stages.store.path(key, Artifact::Combined(stem));
    let complex = match stages.ensure_complex(key, receptor, docked, out).await {
        Ok(complex) => complex,
        Err(e) => {
            warn!("[{}] could not combine {}: {}", key, stem, e);
            return;
        }
    };
    if let Err(e) = stages.ensure_visualization(key, stem, complex.path()).await {
        warn!("[{}] visualization of {} failed: {}", key, stem, e);
    }
}
