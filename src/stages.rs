use crate::candidates::DockingOutcome;
use crate::capabilities::{DockingRequest, Toolbox};
use crate::checkpoint::{Artifact, ArtifactRef, ArtifactStatus, CheckpointStore};
use crate::error::{PipelineError, Result};
use crate::prompt::{flatten, PromptTemplate};
use crate::structure;
use log::{debug, info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};

pub struct Stages {
    pub store: CheckpointStore,
    pub tools: Toolbox,
}

impl Stages {
    pub fn new(store: CheckpointStore, tools: Toolbox) -> Self {
        Self { store, tools }
    }

    /// Clears what a crashed attempt left staged for `path`.
    async fn clear_leftovers(&self, stage: &str, key: &str, path: &Path) -> Result<()> {
        if self.store.status(path) != ArtifactStatus::InProgress {
            return Ok(());
        }
        let removed = self.store.sweep(path).await?;
        if removed > 0 {
            info!(
                "[{}] {}: resuming after crashed attempt, removed {} staging files",
                key, stage, removed
            );
        }
        Ok(())
    }

    async fn ensure_text<F, Fut>(&self, stage: &'static str, key: &str, path: PathBuf, produce: F) -> Result<ArtifactRef>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<String>>,
    {
        if path.exists() {
            debug!("[{}] {}: checkpoint present at {:?}", key, stage, path);
            return Ok(path.into());
        }
        self.clear_leftovers(stage, key, &path).await?;
        info!("[{}] {}", key, stage);
        let text = produce()
            .await
            .map_err(|e| PipelineError::from_tool(stage, key, e))?;
        self.store.write_atomic(&path, text).await
    }

    /// Like `ensure_text`, for collaborators that write the file themselves.
    async fn ensure_file<F, Fut>(&self, stage: &'static str, key: &str, path: PathBuf, produce: F) -> Result<ArtifactRef>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        if path.exists() {
            debug!("[{}] {}: checkpoint present at {:?}", key, stage, path);
            return Ok(path.into());
        }
        self.clear_leftovers(stage, key, &path).await?;
        info!("[{}] {}", key, stage);
        let staged = self.store.stage(&path).await?;
        if let Err(e) = produce(staged.to_path_buf()).await {
            self.store.discard(staged).await?;
            return Err(PipelineError::from_tool(stage, key, e));
        }
        self.store.commit(staged, &path).await
    }

    pub async fn ensure_structure(&self, key: &str, id: &str) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::Structure(id));
        self.ensure_text("download structure", key, path, || {
            self.tools.structures.download_structure(id)
        })
        .await
    }

    pub async fn ensure_sequence_download(&self, key: &str, id: &str) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::Sequence);
        self.ensure_text("download sequence", key, path, || {
            self.tools.structures.download_sequence(id)
        })
        .await
    }

    pub async fn ensure_sequence_from_structure(&self, key: &str, structure_path: &Path) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::Sequence);
        self.ensure_text("extract sequence", key, path, || async move {
            let pdb = tokio::fs::read_to_string(structure_path).await?;
            let chains = structure::chain_sequences(&pdb);
            if chains.is_empty() {
                warn!("[{}] no amino-acid chains in {:?}", key, structure_path);
            }
            Ok::<_, anyhow::Error>(structure::to_fasta(key, &chains))
        })
        .await
    }

    pub async fn ensure_sequence_text(&self, key: &str, sequence: &str) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::Sequence);
        self.ensure_text("write query sequence", key, path, || async move {
            Ok::<_, anyhow::Error>(format!(">{key}\n{sequence}\n"))
        })
        .await
    }

    /// Closest database entry for `sequence`. "Nothing similar" is a valid
    /// answer and leaves no artifact.
    pub async fn ensure_search_hit(&self, key: &str, sequence: &str) -> Result<Option<String>> {
        let path = self.store.path(key, Artifact::SearchHit);
        if path.exists() {
            let id = self.store.read_to_string(&path).await?;
            return Ok(Some(id.trim().to_string()));
        }
        info!("[{}] similarity search", key);
        let hit = self
            .tools
            .structures
            .search_by_sequence(sequence)
            .await
            .map_err(|e| PipelineError::from_tool("similarity search", key, e))?;
        match hit {
            Some(id) => {
                info!("[{}] most similar structure is {}", key, id);
                self.store.write_atomic(&path, &id).await?;
                Ok(Some(id))
            }
            None => {
                warn!("[{}] no similar structure found", key);
                Ok(None)
            }
        }
    }

    pub async fn ensure_summary_fetched(&self, key: &str, id: &str) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::Summary);
        self.ensure_text("fetch summary", key, path, || async move {
            Ok::<_, anyhow::Error>(self.tools.structures.fetch_summary(id).await?.render())
        })
        .await
    }

    pub async fn ensure_summary_text(&self, key: &str, summary: &str) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::Summary);
        self.ensure_text("write user summary", key, path, || async move {
            Ok::<_, anyhow::Error>(summary.to_string())
        })
        .await
    }

    pub async fn ensure_interactions(&self, key: &str, complex: &Path) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::Interactions);
        self.ensure_text("extract interactions", key, path, || {
            self.tools.interactions.interaction_report(complex)
        })
        .await
    }

    /// The template is only read when the prompt has to be built.
    pub async fn ensure_prompt(&self, key: &str, template_path: &Path) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::Prompt);
        if path.exists() {
            debug!("[{}] fill template: checkpoint present", key);
            return Ok(path.into());
        }
        let template = PromptTemplate::load(template_path)?;
        let summary = self.store.read_or_empty(&self.store.path(key, Artifact::Summary)).await?;
        let sequence = self.store.read_or_empty(&self.store.path(key, Artifact::Sequence)).await?;
        let interactions = self
            .store
            .read_or_empty(&self.store.path(key, Artifact::Interactions))
            .await?;
        info!("[{}] fill template", key);
        self.clear_leftovers("fill template", key, &path).await?;
        self.store
            .write_atomic(&path, template.fill(&summary, &sequence, &interactions))
            .await
    }

    pub async fn ensure_answer(&self, key: &str) -> Result<ArtifactRef> {
        let prompt_path = self.store.path(key, Artifact::Prompt);
        let path = self.store.path(key, Artifact::Answer);
        self.ensure_text("query language model", key, path, || async move {
            let prompt = tokio::fs::read_to_string(&prompt_path).await?;
            self.tools.llm.complete(&flatten(&prompt)).await
        })
        .await
    }

    /// Moves a rejected answer out of the canonical path so the next call
    /// queries the model again.
    pub async fn discard_answer(&self, key: &str) -> Result<()> {
        let path = self.store.path(key, Artifact::Answer);
        let aside = self.store.path(key, Artifact::RejectedAnswer);
        tokio::fs::rename(&path, &aside)
            .await
            .map_err(|e| PipelineError::io(&path, e))
    }

    /// Polymer-only copy of the structure, converted to receptor format.
    pub async fn ensure_receptor(&self, key: &str, structure_path: &Path) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::Receptor);
        let clean_path = path.with_extension("pdb");
        if !path.exists() {
            self.clear_leftovers("prepare receptor", key, &clean_path).await?;
        }
        self.ensure_file("prepare receptor", key, path, |out| async move {
            let pdb = tokio::fs::read_to_string(structure_path).await?;
            let clean = self.store.stage(&clean_path).await?;
            tokio::fs::write(&clean, structure::receptor_only(&pdb)).await?;
            let converted = self.tools.chemistry.receptor_from_pdb(&clean, &out).await;
            tokio::fs::remove_file(&clean).await?;
            converted
        })
        .await
    }

    pub async fn ensure_ligand_from_smiles(&self, key: &str, name: &str, smiles: &str) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::CandidateLigand(name));
        self.ensure_file("convert candidate", key, path, |out| async move {
            self.tools.chemistry.ligand_from_smiles(smiles, &out).await
        })
        .await
    }

    /// First ligand of `source_structure`, isolated as its own PDB file.
    pub async fn ensure_reference_ligand(&self, key: &str, source_structure: &Path) -> Result<Option<ArtifactRef>> {
        if let Some(existing) = self.store.lookup(key, Artifact::ReferenceLigand) {
            return Ok(Some(existing));
        }
        let pdb = self.store.read_to_string(source_structure).await?;
        let Some(ligand) = structure::first_ligand(&pdb) else {
            warn!("[{}] no ligand in {:?}", key, source_structure);
            return Ok(None);
        };
        info!(
            "[{}] isolated reference ligand {} {} {}",
            key, ligand.resname, ligand.chain, ligand.resid
        );
        let path = self.store.path(key, Artifact::ReferenceLigand);
        self.store.write_atomic(&path, ligand.to_pdb()).await.map(Some)
    }

    pub async fn ensure_reference_ligand_pdbqt(&self, key: &str, ligand_pdb: &Path) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::ReferenceLigandPdbqt);
        self.ensure_file("convert reference ligand", key, path, |out| async move {
            self.tools.chemistry.ligand_from_pdb(ligand_pdb, &out).await
        })
        .await
    }

    /// Docks `ligand` into `receptor`, or re-reads the energy of an earlier
    /// result at `out`. Engine failures become `DockingOutcome::Failed`.
    pub async fn dock(&self, key: &str, receptor: &Path, ligand: &Path, out: PathBuf, exhaustiveness: u32) -> Result<DockingOutcome> {
        if out.exists() {
            let poses = self.store.read_to_string(&out).await?;
            return Ok(match structure::first_vina_energy(&poses) {
                Some(energy) => DockingOutcome::Energy(energy),
                None => DockingOutcome::Failed(format!("no energy record in {:?}", out)),
            });
        }
        let receptor_text = self.store.read_to_string(receptor).await?;
        let docking_box = structure::docking_box(&receptor_text).ok_or_else(|| {
            PipelineError::stage(
                "docking",
                key,
                anyhow::anyhow!("receptor {:?} has no coordinates", receptor),
            )
        })?;
        self.clear_leftovers("docking", key, &out).await?;
        let staged = self.store.stage(&out).await?;
        let req = DockingRequest {
            receptor,
            ligand,
            out: &staged,
            docking_box,
            exhaustiveness,
        };
        match self.tools.docking.dock(&req).await {
            Ok(energy) => {
                self.store.commit(staged, &out).await?;
                Ok(DockingOutcome::Energy(energy))
            }
            Err(e) => {
                warn!("[{}] docking of {:?} failed: {:#}", key, ligand, e);
                self.store.discard(staged).await?;
                Ok(DockingOutcome::Failed(format!("{e:#}")))
            }
        }
    }

    pub async fn ensure_complex(&self, key: &str, receptor: &Path, docked: &Path, out: PathBuf) -> Result<ArtifactRef> {
        self.ensure_text("combine complex", key, out, || async move {
            let receptor_text = tokio::fs::read_to_string(receptor).await?;
            let docked_text = tokio::fs::read_to_string(docked).await?;
            Ok::<_, anyhow::Error>(structure::combine_complex(&receptor_text, &docked_text))
        })
        .await
    }

    pub async fn ensure_visualization(&self, key: &str, name: &str, complex: &Path) -> Result<ArtifactRef> {
        let path = self.store.path(key, Artifact::Visualization(name));
        self.ensure_file("visualize", key, path, |out| async move {
            self.tools.interactions.visualize(complex, &out).await
        })
        .await
    }
}
