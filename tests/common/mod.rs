//! Counting fakes for every external collaborator.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use drug_realign::capabilities::{
    ChemistryConverter, CompoundLookup, DockingEngine, DockingRequest, InteractionAnalyzer,
    LanguageModel, StructureRepository, StructureSummary, Toolbox,
};
use drug_realign::checkpoint::CheckpointStore;
use drug_realign::error::PipelineError;
use drug_realign::pipeline::{Pipeline, PipelineSettings};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const HOLO_PDB: &str = "\
HEADER    TRANSFERASE
ATOM      1  N   MET A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  MET A   1      11.639   6.071  -5.147  1.00  0.00           C
ATOM      3  CA  LYS A   2      10.201   4.800  -3.000  1.00  0.00           C
ATOM      4  CA  GLY A   3       8.000   3.000  -1.500  1.00  0.00           C
TER
HETATM    5  O   HOH A 101       1.000   1.000   1.000  1.00  0.00           O
HETATM    6  C1  ATP A 201       5.000   5.000   5.000  1.00  0.00           C
HETATM    7  C2  ATP A 201       6.000   5.500   4.000  1.00  0.00           C
END
";

pub const APO_PDB: &str = "\
HEADER    UPLOADED
ATOM      1  N   MET A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  MET A   1      11.639   6.071  -5.147  1.00  0.00           C
ATOM      3  CA  LYS A   2      10.201   4.800  -3.000  1.00  0.00           C
ATOM      4  CA  GLY A   3       8.000   3.000  -1.500  1.00  0.00           C
TER
HETATM    5  O   HOH A 101       1.000   1.000   1.000  1.00  0.00           O
END
";

pub const TEMPLATE: &str = "Summary: __fill sum info__\nSequence: __fill seq info__\nContacts: __fill pdb info__\nAnswer in JSON.";

pub fn answer_with(names: &[&str]) -> String {
    let drugs: Vec<serde_json::Value> = names
        .iter()
        .enumerate()
        .map(|(i, name)| serde_json::json!({"ranking": i + 1, "name": name, "explanation": "fits the pocket"}))
        .collect();
    format!(
        "Here are my suggestions:\n{}\nHope this helps.",
        serde_json::json!({ "drugs": drugs })
    )
}

pub const FIVE_DRUGS: [&str; 5] = ["Imatinib", "Dasatinib", "Nilotinib", "Bosutinib", "Ponatinib"];

#[derive(Default)]
pub struct Calls {
    pub structure: AtomicUsize,
    pub sequence: AtomicUsize,
    pub summary: AtomicUsize,
    pub search: AtomicUsize,
    pub smiles: AtomicUsize,
    pub conversions: AtomicUsize,
    pub receptors: AtomicUsize,
    pub docking: AtomicUsize,
    pub reports: AtomicUsize,
    pub visualizations: AtomicUsize,
    pub llm: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        [
            &self.structure,
            &self.sequence,
            &self.summary,
            &self.search,
            &self.smiles,
            &self.conversions,
            &self.receptors,
            &self.docking,
            &self.reports,
            &self.visualizations,
            &self.llm,
        ]
        .iter()
        .map(|c| Calls::get(c))
        .sum()
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

pub struct FakeStructures {
    pub calls: Arc<Calls>,
    pub entries: HashMap<String, String>,
    pub search_hit: Option<String>,
}

#[async_trait]
impl StructureRepository for FakeStructures {
    async fn download_structure(&self, id: &str) -> Result<String> {
        bump(&self.calls.structure);
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no entry {id}"))
    }

    async fn download_sequence(&self, id: &str) -> Result<String> {
        bump(&self.calls.sequence);
        Ok(format!(">{id}_1|Chain A|KINASE\nMKG\n"))
    }

    async fn fetch_summary(&self, id: &str) -> Result<StructureSummary> {
        bump(&self.calls.summary);
        Ok(StructureSummary {
            fields: vec![
                ("PDB ID".to_string(), id.to_string()),
                ("Title".to_string(), "Test kinase".to_string()),
            ],
        })
    }

    async fn search_by_sequence(&self, _sequence: &str) -> Result<Option<String>> {
        bump(&self.calls.search);
        Ok(self.search_hit.clone())
    }
}

/// `outages` counts how many lookups of a name answer 503 before it resolves.
pub struct FakeCompounds {
    pub calls: Arc<Calls>,
    pub unknown: Vec<String>,
    pub outages: Mutex<HashMap<String, usize>>,
    pub looked_up: Mutex<Vec<String>>,
}

#[async_trait]
impl CompoundLookup for FakeCompounds {
    async fn smiles_for_name(&self, name: &str) -> Result<Option<String>> {
        bump(&self.calls.smiles);
        self.looked_up.lock().unwrap().push(name.to_string());
        if let Some(left) = self.outages.lock().unwrap().get_mut(name).filter(|n| **n > 0) {
            *left -= 1;
            return Err(PipelineError::Status {
                service: "pubchem",
                status: 503,
                url: format!("https://pubchem.example/{name}"),
            }
            .into());
        }
        if self.unknown.iter().any(|u| u == name) {
            return Ok(None);
        }
        Ok(Some(format!("C{}", name.len())))
    }
}

pub struct FakeChemistry {
    pub calls: Arc<Calls>,
    pub delay: Duration,
}

const LIGAND_PDBQT: &str = "\
ATOM      1  C   UNL     1       1.000   2.000   3.000  0.00  0.00    +0.000 C
ATOM      2  O   UNL     1       1.500   2.000   3.000  0.00  0.00    -0.300 OA
";

#[async_trait]
impl ChemistryConverter for FakeChemistry {
    async fn ligand_from_smiles(&self, _smiles: &str, out: &Path) -> Result<()> {
        bump(&self.calls.conversions);
        tokio::fs::write(out, LIGAND_PDBQT).await?;
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn ligand_from_pdb(&self, _pdb: &Path, out: &Path) -> Result<()> {
        bump(&self.calls.conversions);
        tokio::fs::write(out, LIGAND_PDBQT).await?;
        Ok(())
    }

    async fn receptor_from_pdb(&self, pdb: &Path, out: &Path) -> Result<()> {
        bump(&self.calls.receptors);
        let clean = tokio::fs::read_to_string(pdb).await?;
        anyhow::ensure!(!clean.contains("HETATM"), "receptor input still has hetero records");
        tokio::fs::write(out, clean).await?;
        Ok(())
    }
}

/// Energies by ligand file stem; stems not listed dock at -6.0, `None`
/// makes the engine fail.
pub struct FakeDocking {
    pub calls: Arc<Calls>,
    pub energies: HashMap<String, Option<f64>>,
}

#[async_trait]
impl DockingEngine for FakeDocking {
    async fn dock(&self, req: &DockingRequest<'_>) -> Result<f64> {
        bump(&self.calls.docking);
        let stem = req
            .ligand
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let energy = match self.energies.get(&stem) {
            Some(Some(energy)) => *energy,
            Some(None) => anyhow::bail!("Command failed with status: exit status: 1"),
            None => -6.0,
        };
        let poses = format!(
            "MODEL 1\nREMARK VINA RESULT:    {energy:.1}      0.000      0.000\n{LIGAND_PDBQT}ENDMDL\n"
        );
        tokio::fs::write(req.out, poses).await?;
        Ok(energy)
    }
}

pub struct FakeInteractions {
    pub calls: Arc<Calls>,
    pub analyzed: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl InteractionAnalyzer for FakeInteractions {
    async fn interaction_report(&self, complex: &Path) -> Result<String> {
        bump(&self.calls.reports);
        self.analyzed.lock().unwrap().push(complex.to_path_buf());
        Ok("\"\"\"hbond\"\"\":\nRESNR RESTYPE\n 45 LYS\n".to_string())
    }

    async fn visualize(&self, _complex: &Path, out_dir: &Path) -> Result<()> {
        bump(&self.calls.visualizations);
        tokio::fs::create_dir_all(out_dir).await?;
        tokio::fs::write(out_dir.join("complex.pse"), b"pse").await?;
        Ok(())
    }
}

/// Replays scripted answers; the last one repeats.
pub struct FakeLlm {
    pub calls: Arc<Calls>,
    pub answers: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageModel for FakeLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        bump(&self.calls.llm);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut answers = self.answers.lock().unwrap();
        let answer = if answers.len() > 1 {
            answers.pop_front()
        } else {
            answers.front().cloned()
        };
        answer.ok_or_else(|| anyhow::anyhow!("no scripted answer"))
    }
}

pub struct Harness {
    pub calls: Arc<Calls>,
    pub compounds: Arc<FakeCompounds>,
    pub tools: Toolbox,
    pub interactions: Arc<FakeInteractions>,
    pub llm: Arc<FakeLlm>,
    pub pipeline: Arc<Pipeline>,
}

pub struct Scenario {
    pub entries: HashMap<String, String>,
    pub search_hit: Option<String>,
    pub unknown_names: Vec<String>,
    pub lookup_outages: HashMap<String, usize>,
    pub conversion_delay: Duration,
    pub energies: HashMap<String, Option<f64>>,
    pub answers: Vec<String>,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            entries: HashMap::from([("1C8K".to_string(), HOLO_PDB.to_string())]),
            search_hit: None,
            unknown_names: Vec::new(),
            lookup_outages: HashMap::new(),
            conversion_delay: Duration::ZERO,
            energies: HashMap::new(),
            answers: vec![answer_with(&FIVE_DRUGS)],
        }
    }
}

impl Scenario {
    pub fn build(self, work_dir: &Path) -> Harness {
        let template = work_dir.join("template.txt");
        std::fs::write(&template, TEMPLATE).unwrap();

        let calls = Arc::new(Calls::default());
        let interactions = Arc::new(FakeInteractions {
            calls: calls.clone(),
            analyzed: Mutex::new(Vec::new()),
        });
        let llm = Arc::new(FakeLlm {
            calls: calls.clone(),
            answers: Mutex::new(self.answers.into()),
            prompts: Mutex::new(Vec::new()),
        });
        let compounds = Arc::new(FakeCompounds {
            calls: calls.clone(),
            unknown: self.unknown_names,
            outages: Mutex::new(self.lookup_outages),
            looked_up: Mutex::new(Vec::new()),
        });
        let tools = Toolbox {
            structures: Arc::new(FakeStructures {
                calls: calls.clone(),
                entries: self.entries,
                search_hit: self.search_hit,
            }),
            compounds: compounds.clone(),
            chemistry: Arc::new(FakeChemistry {
                calls: calls.clone(),
                delay: self.conversion_delay,
            }),
            docking: Arc::new(FakeDocking {
                calls: calls.clone(),
                energies: self.energies,
            }),
            interactions: interactions.clone(),
            llm: llm.clone(),
        };
        let settings = PipelineSettings {
            template_path: template,
            max_answer_attempts: 3,
            answer_backoff: Duration::from_millis(1),
            docking_exhaustiveness: 1,
            reference_exhaustiveness: 8,
        };
        let pipeline = Arc::new(Pipeline::new(
            CheckpointStore::new(work_dir),
            tools.clone(),
            settings,
        ));
        Harness {
            calls,
            compounds,
            tools,
            interactions,
            llm,
            pipeline,
        }
    }
}
