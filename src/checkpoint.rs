use crate::error::{PipelineError, Result};
use log::debug;
use std::collections::HashSet;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};
use tokio::fs;
use uuid::Uuid;

const STAGING_PREFIX: &str = ".partial-";

/// Staging paths held by a live writer in this process. `sweep` leaves
/// these alone; runs sharing a candidate ligand may stage it side by side.
static LIVE_STAGING: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn live_staging() -> MutexGuard<'static, HashSet<PathBuf>> {
    LIVE_STAGING
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    Missing,
    InProgress,
    Complete,
}

/// Names one persisted stage output. Borrowed strings are structure ids or
/// sanitized candidate names.
#[derive(Debug, Clone, Copy)]
pub enum Artifact<'a> {
    Structure(&'a str),
    Sequence,
    SearchHit,
    Summary,
    ReferenceLigand,
    ReferenceLigandPdbqt,
    ReferenceDocking,
    ReferenceComplex,
    Interactions,
    Prompt,
    Answer,
    RejectedAnswer,
    CandidateTable,
    CandidateLigand(&'a str),
    Receptor,
    Docking(&'a str),
    Combined(&'a str),
    Visualization(&'a str),
    FinalTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef(PathBuf);

impl ArtifactRef {
    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn into_path(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ArtifactRef {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for ArtifactRef {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

/// A reserved staging path. Dropping it releases the reservation, so the
/// leftovers of a panicked writer become sweepable again.
#[derive(Debug)]
pub struct Staged(PathBuf);

impl Staged {
    fn reserve(path: PathBuf) -> Self {
        live_staging().insert(path.clone());
        Self(path)
    }
}

impl Deref for Staged {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for Staged {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        live_staging().remove(&self.0);
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, key: &str, artifact: Artifact<'_>) -> PathBuf {
        let data = self.root.join("data");
        let result = self.root.join("result");
        match artifact {
            Artifact::Structure(id) => data.join("pdb").join(format!("{id}.pdb")),
            Artifact::Sequence => data.join("fasta").join(format!("{key}.fasta")),
            Artifact::SearchHit => data.join("search").join(format!("{key}.txt")),
            Artifact::Summary => data.join("summary").join(format!("{key}.txt")),
            Artifact::ReferenceLigand => data.join("temp").join(format!("{key}_ligand.pdb")),
            Artifact::ReferenceLigandPdbqt => {
                data.join("drug_pdbqt").join(format!("{key}_ligand.pdbqt"))
            }
            Artifact::ReferenceDocking => data
                .join("dock_result")
                .join(format!("{key}_{key}_ligand.pdbqt")),
            Artifact::ReferenceComplex => data.join("complex").join(format!("{key}.pdb")),
            Artifact::Interactions => data
                .join("spatial_information")
                .join(format!("{key}.txt")),
            Artifact::Prompt => data.join("question").join(format!("{key}.txt")),
            Artifact::Answer => data.join("answer").join(format!("{key}.txt")),
            Artifact::RejectedAnswer => data.join("answer").join(format!("{key}.rejected.txt")),
            Artifact::CandidateTable => data.join("answer").join(format!("{key}.csv")),
            Artifact::CandidateLigand(name) => data.join("drug_pdbqt").join(format!("{name}.pdbqt")),
            Artifact::Receptor => data.join("rec_pdbqt").join(format!("{key}.pdbqt")),
            Artifact::Docking(name) => data
                .join("dock_result")
                .join(format!("{key}_{name}.pdbqt")),
            Artifact::Combined(name) => data
                .join("combined_result")
                .join(format!("{key}_{name}.pdb")),
            Artifact::Visualization(name) => result.join("visualize").join(format!("{key}_{name}")),
            Artifact::FinalTable => result.join("csv").join(format!("{key}.csv")),
        }
    }

    pub fn exists(&self, key: &str, artifact: Artifact<'_>) -> bool {
        self.path(key, artifact).exists()
    }

    /// Returns the artifact reference when the canonical path is already present.
    pub fn lookup(&self, key: &str, artifact: Artifact<'_>) -> Option<ArtifactRef> {
        let path = self.path(key, artifact);
        path.exists().then(|| ArtifactRef(path))
    }

    pub fn status(&self, path: &Path) -> ArtifactStatus {
        if path.exists() {
            ArtifactStatus::Complete
        } else if !staging_files(path).is_empty() {
            ArtifactStatus::InProgress
        } else {
            ArtifactStatus::Missing
        }
    }

    /// Reserves a staging path next to `path`. The staging name keeps the
    /// final file name as its suffix so tools that sniff extensions still work.
    pub async fn stage(&self, path: &Path) -> Result<Staged> {
        let parent = parent_of(path);
        fs::create_dir_all(&parent)
            .await
            .map_err(|e| PipelineError::io(&parent, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let staged = parent.join(format!("{STAGING_PREFIX}{}-{file_name}", Uuid::new_v4().simple()));
        Ok(Staged::reserve(staged))
    }

    pub async fn commit(&self, staged: Staged, path: &Path) -> Result<ArtifactRef> {
        fs::rename(&staged, path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        debug!("Checkpoint written: {:?}", path);
        Ok(ArtifactRef(path.to_path_buf()))
    }

    /// Removes whatever a failed writer left at its own staging path.
    pub async fn discard(&self, staged: Staged) -> Result<()> {
        remove_any(&staged).await
    }

    pub async fn write_atomic(&self, path: &Path, contents: impl AsRef<[u8]>) -> Result<ArtifactRef> {
        let staged = self.stage(path).await?;
        fs::write(&staged, contents)
            .await
            .map_err(|e| PipelineError::io(staged.to_path_buf(), e))?;
        self.commit(staged, path).await
    }

    /// Removes staging leftovers of a crashed attempt for `path`. Paths still
    /// reserved by a live writer are kept.
    pub async fn sweep(&self, path: &Path) -> Result<usize> {
        let stale: Vec<PathBuf> = {
            let live = live_staging();
            staging_files(path)
                .into_iter()
                .filter(|p| !live.contains(p))
                .collect()
        };
        for leftover in &stale {
            remove_any(leftover).await?;
            debug!("Removed stale staging file {:?}", leftover);
        }
        Ok(stale.len())
    }

    pub async fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::io(path, e))
    }

    /// Reads an artifact, treating a missing file as empty.
    pub async fn read_or_empty(&self, path: &Path) -> Result<String> {
        match fs::read_to_string(path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(PipelineError::io(path, e)),
        }
    }
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn remove_any(path: &Path) -> Result<()> {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match removed {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(PipelineError::io(path, e)),
        _ => Ok(()),
    }
}

fn staging_files(path: &Path) -> Vec<PathBuf> {
    let Some(file_name) = path.file_name() else {
        return Vec::new();
    };
    let dir = parent_of(path);
    let pattern = format!(
        "{}/{}*-{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        STAGING_PREFIX,
        glob::Pattern::escape(&file_name.to_string_lossy())
    );
    let options = glob::MatchOptions {
        require_literal_leading_dot: false,
        ..Default::default()
    };
    match glob::glob_with(&pattern, options) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(_) => Vec::new(),
    }
}
