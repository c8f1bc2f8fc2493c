use crate::structure::DockingBox;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Ordered `label: value` pairs describing a structure entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureSummary {
    pub fields: Vec<(String, String)>,
}

impl StructureSummary {
    pub fn render(&self) -> String {
        self.fields
            .iter()
            .map(|(label, value)| format!("{label}: {value}\n"))
            .collect()
    }
}

#[async_trait]
pub trait StructureRepository: Send + Sync {
    /// Raw PDB-format text for `id`.
    async fn download_structure(&self, id: &str) -> Result<String>;
    /// FASTA text for every entity of `id`.
    async fn download_sequence(&self, id: &str) -> Result<String>;
    async fn fetch_summary(&self, id: &str) -> Result<StructureSummary>;
    /// Closest entry by sequence similarity; `None` when nothing qualifies.
    async fn search_by_sequence(&self, sequence: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait CompoundLookup: Send + Sync {
    /// SMILES for a compound name; `None` when the name does not resolve.
    async fn smiles_for_name(&self, name: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait ChemistryConverter: Send + Sync {
    async fn ligand_from_smiles(&self, smiles: &str, out: &Path) -> Result<()>;
    async fn ligand_from_pdb(&self, pdb: &Path, out: &Path) -> Result<()>;
    /// `pdb` is already stripped of hetero records.
    async fn receptor_from_pdb(&self, pdb: &Path, out: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct DockingRequest<'a> {
    pub receptor: &'a Path,
    pub ligand: &'a Path,
    pub out: &'a Path,
    pub docking_box: DockingBox,
    pub exhaustiveness: u32,
}

#[async_trait]
pub trait DockingEngine: Send + Sync {
    /// Docks and writes poses to `req.out`; returns the best binding energy.
    async fn dock(&self, req: &DockingRequest<'_>) -> Result<f64>;
}

#[async_trait]
pub trait InteractionAnalyzer: Send + Sync {
    /// Condensed protein-ligand contact report for a complex.
    async fn interaction_report(&self, complex: &Path) -> Result<String>;
    /// Writes visualization files for a complex into `out_dir`.
    async fn visualize(&self, complex: &Path, out_dir: &Path) -> Result<()>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct Toolbox {
    pub structures: Arc<dyn StructureRepository>,
    pub compounds: Arc<dyn CompoundLookup>,
    pub chemistry: Arc<dyn ChemistryConverter>,
    pub docking: Arc<dyn DockingEngine>,
    pub interactions: Arc<dyn InteractionAnalyzer>,
    pub llm: Arc<dyn LanguageModel>,
}
